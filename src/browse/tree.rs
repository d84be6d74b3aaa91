use crate::browse::{filter::EntryFilter, slash_relative};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::FileType;
use std::path::Path;
use tokio::fs;

/// One entry of a browsable tree. `path` is relative to the logical root,
/// `/`-separated, and empty only for the synthetic root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Dir {
        name: String,
        #[serde(rename = "path")]
        relative_path: String,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        #[serde(rename = "path")]
        relative_path: String,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Dir { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    pub fn relative_path(&self) -> &str {
        match self {
            TreeNode::Dir { relative_path, .. } | TreeNode::File { relative_path, .. } => relative_path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Dir { .. })
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Dir { children, .. } => children,
            TreeNode::File { .. } => &[],
        }
    }
}

/// Sibling order: case-insensitive first, lowercase before uppercase on ties.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| b.cmp(a))
}

pub struct TreeBuilder {
    filter: EntryFilter,
    max_depth: usize,
}

impl TreeBuilder {
    pub fn new(filter: EntryFilter, max_depth: usize) -> Self {
        Self { filter, max_depth }
    }

    /// Walks `root` and wraps the result in the synthetic root node.
    pub async fn list(&self, root: &Path, display_name: &str) -> TreeNode {
        let root = match fs::canonicalize(root).await {
            Ok(p) => dunce::simplified(&p).to_path_buf(),
            Err(_) => root.to_path_buf(),
        };
        let children = self.build(&root, &root, 0).await;
        TreeNode::Dir { name: display_name.to_string(), relative_path: String::new(), children }
    }

    /// Lists `current` (which must lie under `root`) and descends into
    /// subdirectories until `max_depth`. Directories come first, then files,
    /// each group ordered by [`compare_names`]. A directory that cannot be
    /// enumerated contributes no children.
    ///
    /// Directory symlinks are not followed, so the walk cannot cycle.
    pub fn build<'a>(&'a self, root: &'a Path, current: &'a Path, depth: usize) -> BoxFuture<'a, Vec<TreeNode>> {
        async move {
            if depth >= self.max_depth {
                return Vec::new();
            }
            let (mut dirs, mut files) = match self.partition(root, current).await {
                Ok(groups) => groups,
                Err(err) => {
                    tracing::debug!(depth, error = %err, "skipping unreadable directory");
                    return Vec::new();
                }
            };
            dirs.sort_by(|a, b| compare_names(a, b));
            files.sort_by(|a, b| compare_names(a, b));

            let mut nodes = Vec::with_capacity(dirs.len() + files.len());
            for name in dirs {
                let full = current.join(&name);
                let Some(relative_path) = slash_relative(root, &full) else { continue };
                let children = self.build(root, &full, depth + 1).await;
                nodes.push(TreeNode::Dir { name, relative_path, children });
            }
            for name in files {
                let full = current.join(&name);
                let Some(relative_path) = slash_relative(root, &full) else { continue };
                nodes.push(TreeNode::File { name, relative_path });
            }
            nodes
        }
        .boxed()
    }

    async fn partition(&self, root: &Path, dir: &Path) -> std::io::Result<(Vec<String>, Vec<String>)> {
        let mut reader = fs::read_dir(dir).await?;
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            // names that are not UTF-8 cannot round-trip through JSON
            let Ok(name) = entry.file_name().into_string() else { continue };
            let Ok(file_type) = entry.file_type().await else { continue };
            if file_type.is_dir() {
                if self.filter.include_dir(&name) {
                    dirs.push(name);
                }
            } else if self.filter.include_file(&name) && is_listable_file(root, &entry.path(), file_type).await {
                files.push(name);
            }
        }
        Ok((dirs, files))
    }
}

/// Regular files, and symlinks to regular files that stay under `root`.
async fn is_listable_file(root: &Path, path: &Path, file_type: FileType) -> bool {
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }
    let Ok(target) = fs::canonicalize(path).await else { return false };
    if !dunce::simplified(&target).starts_with(root) {
        return false;
    }
    fs::metadata(&target).await.map(|m| m.is_file()).unwrap_or(false)
}
