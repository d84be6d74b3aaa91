use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("file browsing is not configured")]
    Unconfigured,
    #[error("unknown root: {0}")]
    UnknownRoot(String),
    #[error("path is required")]
    EmptyPath,
    #[error("invalid path")]
    PathEscape,
    #[error("file not found")]
    NotFound,
    #[error("path is a directory")]
    IsDirectory,
    #[error("file too large to preview")]
    TooLarge,
    #[error("failed to read file")]
    ReadFailure,
    #[error("metadata index not found: {0}")]
    IndexNotFound(String),
    #[error("metadata index is invalid JSON")]
    InvalidIndex,
    #[error("request too large")]
    RequestTooLarge,
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub code: &'static str,
    pub error: String,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unconfigured => "Unconfigured",
            AppError::UnknownRoot(_) => "UnknownRoot",
            AppError::EmptyPath => "EmptyPath",
            AppError::PathEscape => "PathEscape",
            AppError::NotFound => "NotFound",
            AppError::IsDirectory => "IsDirectory",
            AppError::TooLarge => "TooLarge",
            AppError::ReadFailure => "ReadFailure",
            AppError::IndexNotFound(_) => "IndexNotFound",
            AppError::InvalidIndex => "InvalidIndex",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::Upstream(_) => "Upstream",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unconfigured | AppError::ReadFailure | AppError::InvalidIndex => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::UnknownRoot(_) | AppError::NotFound | AppError::IndexNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::EmptyPath | AppError::PathEscape | AppError::IsDirectory => {
                StatusCode::BAD_REQUEST
            }
            AppError::TooLarge | AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody { ok: false, code: self.code(), error: self.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
