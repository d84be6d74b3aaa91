use crate::{
    browse::slash_relative,
    config::Files,
    errors::{AppError, AppResult},
    security::normalize_lexically,
};
use std::path::{Path, PathBuf};

/// A client-facing name for a directory under the configured base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalRoot {
    pub id: String,
    pub display_name: String,
    pub physical_path: PathBuf,
    pub base_anchor: PathBuf,
}

impl LogicalRoot {
    /// Location of this root relative to the base directory, `/`-separated.
    pub fn root_rel(&self) -> String {
        slash_relative(&self.base_anchor, &self.physical_path).unwrap_or_default()
    }
}

/// Fixed id → directory mapping, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct RootRegistry {
    // None when no base directory is configured
    roots: Option<Vec<LogicalRoot>>,
    default_id: String,
}

impl RootRegistry {
    pub fn from_config(files: &Files) -> Self {
        let roots = files.base_dir.as_deref().map(|base| {
            let base = anchor(base);
            files
                .roots
                .iter()
                .map(|spec| LogicalRoot {
                    id: spec.id.clone(),
                    display_name: spec.name.clone(),
                    physical_path: normalize_lexically(&base.join(&spec.subdir)),
                    base_anchor: base.clone(),
                })
                .collect()
        });
        Self { roots, default_id: files.default_root.clone() }
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn all(&self) -> AppResult<&[LogicalRoot]> {
        self.roots.as_deref().ok_or(AppError::Unconfigured)
    }

    pub fn resolve(&self, id: &str) -> AppResult<&LogicalRoot> {
        self.all()?
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::UnknownRoot(id.to_string()))
    }
}

fn anchor(base: &Path) -> PathBuf {
    dunce::canonicalize(base).unwrap_or_else(|_| normalize_lexically(base))
}
