use crate::api::error::AppError;
use crate::utils::validation::ArchiveRef;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Archive reference returned by /convert (`<job id>/<name>.tar.gz`)
    #[serde(rename = "fn")]
    pub file_name: Option<String>,
}

#[utoipa::path(
    get,
    path = "/download",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Archive stream", content_type = "application/gzip"),
        (status = 404, description = "No file name, or no such archive")
    ),
    tag = "convert"
)]
pub async fn download_archive(
    State(state): State<crate::AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let requested = query.file_name.unwrap_or_default();
    if requested.is_empty() {
        return Err(AppError::DownloadNotFound("No file name".to_string()));
    }

    let archive = ArchiveRef::parse(&requested).map_err(|e| {
        tracing::warn!("Rejected download reference: {}", e);
        AppError::DownloadNotFound("No such file".to_string())
    })?;

    let layout = state.converter.layout().clone();
    let path = layout.archive_path(&archive);

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::DownloadNotFound("No such file".to_string()));
        }
        Err(e) => return Err(AppError::Internal(format!("Failed to open archive: {}", e))),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to stat archive: {}", e)))?
        .len();

    tracing::info!("📦 Sending {} ({} bytes)", archive, size);

    let content_disposition = attachment_disposition(&archive.file_name);

    // The archive is removed only once the last chunk has been handed to the
    // connection; an aborted transfer leaves it to the retention sweep.
    let stream = async_stream::stream! {
        let mut chunks = ReaderStream::new(file);
        let mut failed = false;
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => yield Ok(bytes),
                Err(e) => {
                    tracing::error!("Read error while sending {}: {}", archive, e);
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }

        if !failed {
            match layout.remove_archive(&archive).await {
                Ok(()) => tracing::info!("🗑️  Delivered and removed {}", archive),
                Err(e) => tracing::error!("Failed to remove delivered archive {}: {}", archive, e),
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/gzip")
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
pub(crate) fn attachment_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() || ascii_filename.starts_with('.') {
        "pages.tar.gz"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}
