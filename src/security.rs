use crate::errors::{AppError, AppResult};
use axum::http::HeaderMap;
use std::path::{Component, Path, PathBuf};

/// Resolves a client-supplied `relative` path against the trusted `root`.
///
/// The join is normalized lexically first, so `..` can never climb out of
/// `root` even when the target does not exist. Existing targets are then
/// canonicalized and checked again, which catches symlinks pointing outside.
/// Missing targets are anchored at their deepest existing ancestor, so a
/// name behind an escaping directory link is rejected whether or not it
/// exists yet.
/// Containment is tested with `Path::starts_with`, i.e. per component, so
/// `/srv/docs-evil` is not inside `/srv/docs`.
pub fn resolve_within_root(root: &Path, relative: &str) -> AppResult<PathBuf> {
    if relative.is_empty() {
        return Err(AppError::EmptyPath);
    }
    let canon_root = dunce::canonicalize(root).unwrap_or_else(|_| normalize_lexically(root));
    let lexical = normalize_lexically(&canon_root.join(relative));
    if !lexical.starts_with(&canon_root) {
        return Err(AppError::PathEscape);
    }
    match dunce::canonicalize(&lexical) {
        Ok(canon) if canon.starts_with(&canon_root) => Ok(canon),
        Ok(_) => Err(AppError::PathEscape),
        Err(_) => confine_missing(&canon_root, &lexical),
    }
}

/// Canonicalizes the deepest existing ancestor of `lexical` and re-attaches
/// the missing tail. If the entry directly below that ancestor is a link,
/// it is dangling or looping and its target cannot be checked.
fn confine_missing(canon_root: &Path, lexical: &Path) -> AppResult<PathBuf> {
    let mut tail = Vec::new();
    let mut cursor = lexical;
    while let Some(parent) = cursor.parent() {
        if let Some(name) = cursor.file_name() {
            tail.push(name.to_os_string());
        }
        if !parent.starts_with(canon_root) {
            break;
        }
        if let Ok(anchor) = dunce::canonicalize(parent) {
            if !anchor.starts_with(canon_root) {
                return Err(AppError::PathEscape);
            }
            if let Some(first) = tail.last() {
                let is_link = std::fs::symlink_metadata(anchor.join(first))
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if is_link {
                    return Err(AppError::PathEscape);
                }
            }
            let mut out = anchor;
            out.extend(tail.iter().rev());
            return Ok(out);
        }
        cursor = parent;
    }
    // the root itself is missing; the caller's stat reports it
    Ok(lexical.to_path_buf())
}

/// Folds `.` and `..` without touching the filesystem. `..` at the
/// filesystem root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

pub fn content_length_ok(headers: &HeaderMap, max_kb: usize) -> Result<(), AppError> {
    if let Some(len) = headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if len > max_kb * 1024 {
            return Err(AppError::RequestTooLarge);
        }
    }
    Ok(())
}
