use crate::{
    errors::{AppError, AppResult},
    security::resolve_within_root,
};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::{fs, io::AsyncReadExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    #[serde(rename = "path")]
    pub relative_path: String,
    pub content: String,
}

pub struct FileReader {
    max_bytes: u64,
}

impl FileReader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Reads a whole UTF-8 file below `root`. The size is checked before any
    /// content is loaded, and the read itself is capped in case the file
    /// grows in between.
    pub async fn read(&self, root: &Path, relative: &str) -> AppResult<FileContent> {
        let target = resolve_within_root(root, relative)?;
        let meta = match fs::metadata(&target).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::NotFound),
            Err(_) => return Err(AppError::ReadFailure),
        };
        if meta.is_dir() {
            return Err(AppError::IsDirectory);
        }
        if !meta.is_file() {
            return Err(AppError::ReadFailure);
        }
        if meta.len() > self.max_bytes {
            return Err(AppError::TooLarge);
        }

        let file = fs::File::open(&target).await.map_err(|_| AppError::ReadFailure)?;
        let mut buf = Vec::with_capacity(meta.len() as usize);
        file.take(self.max_bytes + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(|_| AppError::ReadFailure)?;
        if buf.len() as u64 > self.max_bytes {
            return Err(AppError::TooLarge);
        }
        let content = String::from_utf8(buf).map_err(|_| AppError::ReadFailure)?;
        Ok(FileContent { relative_path: relative.to_string(), content })
    }
}
