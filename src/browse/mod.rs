pub mod file;
pub mod filter;
pub mod roots;
pub mod tree;

use std::path::{Component, Path};

/// Renders `full` relative to `root` with `/` separators, or `None` when
/// `full` is not below `root`. Never yields an absolute path.
pub fn slash_relative(root: &Path, full: &Path) -> Option<String> {
    let rel = full.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
