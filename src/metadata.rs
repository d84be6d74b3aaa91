use crate::{
    config::Files,
    errors::{AppError, AppResult},
    security::resolve_within_root,
};
use std::path::PathBuf;
use tokio::fs;

/// Per-page JSON index files (`<page>_index.json`) kept under the base
/// directory.
pub struct MetadataStore {
    dir: Option<PathBuf>,
}

impl MetadataStore {
    pub fn from_config(files: &Files) -> Self {
        Self { dir: files.base_dir.as_ref().map(|base| base.join(&files.metadata_subdir)) }
    }

    pub async fn load(&self, page: &str) -> AppResult<serde_json::Value> {
        let dir = self.dir.as_deref().ok_or(AppError::Unconfigured)?;
        if page.is_empty() {
            return Err(AppError::EmptyPath);
        }
        let file_name = format!("{page}_index.json");
        let target = resolve_within_root(dir, &file_name)?;
        let raw = fs::read_to_string(&target)
            .await
            .map_err(|_| AppError::IndexNotFound(file_name.clone()))?;
        serde_json::from_str(&raw).map_err(|_| AppError::InvalidIndex)
    }
}
