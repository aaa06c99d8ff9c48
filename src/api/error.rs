use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::tools::ToolError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upload rejected: {0}")]
    UploadParse(String),

    #[error("Failed to store upload: {0}")]
    UploadWrite(#[source] std::io::Error),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Rasterization failed: {0}")]
    Rasterization(#[source] ToolError),

    #[error("Archiving failed: {0}")]
    Archiving(#[source] ToolError),

    #[error("Download not found: {0}")]
    DownloadNotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UploadParse(_) => "UPLOAD_PARSE",
            AppError::UploadWrite(_) => "UPLOAD_WRITE",
            AppError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            AppError::Rasterization(_) => "RASTERIZATION_FAILED",
            AppError::Archiving(_) => "ARCHIVING_FAILED",
            AppError::DownloadNotFound(_) => "DOWNLOAD_NOT_FOUND",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Template(_) => "TEMPLATE",
            AppError::Internal(_) | AppError::Anyhow(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UploadParse(_) => StatusCode::BAD_REQUEST,
            AppError::SourceNotFound(_) | AppError::DownloadNotFound(_) => StatusCode::NOT_FOUND,
            // A rasterizer that cannot be started is a server fault, not a bad document
            AppError::Rasterization(ToolError::Spawn { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Rasterization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UploadWrite(_)
            | AppError::Archiving(_)
            | AppError::Template(_)
            | AppError::Internal(_)
            | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::UploadParse(msg)
            | AppError::SourceNotFound(msg)
            | AppError::DownloadNotFound(msg)
            | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::Rasterization(e @ ToolError::Spawn { .. }) => {
                tracing::error!("Rasterizer unavailable: {}", e);
                "Internal Server Error".to_string()
            }
            AppError::Rasterization(e) => {
                tracing::warn!("Rasterization failed: {}", e);
                "The document could not be rasterized".to_string()
            }
            AppError::UploadWrite(e) => {
                tracing::error!("Upload write error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::Archiving(e) => {
                tracing::error!("Archiving error: {}", e);
                "Internal Server Error".to_string()
            }
            AppError::Template(e) => {
                tracing::error!("Template error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                "Internal Server Error".to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
