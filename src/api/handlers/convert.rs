use crate::api::error::AppError;
use crate::api::handlers::pages::ConvertTemplate;
use crate::services::upload::{multipart_error, store_upload};
use askama::Template;
use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    response::Html,
};
use futures::TryStreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::StreamReader;

/// Multipart field carrying the document
pub const UPLOAD_FIELD: &str = "uploadfile";

#[utoipa::path(
    post,
    path = "/convert",
    request_body(content = Multipart, description = "PDF in the `uploadfile` field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Result page with the download link", content_type = "text/html"),
        (status = 400, description = "Malformed form, missing field or not a PDF"),
        (status = 413, description = "Upload too large"),
        (status = 422, description = "The document could not be rasterized"),
        (status = 500, description = "Upload could not be stored or archive could not be built")
    ),
    tag = "convert"
)]
pub async fn convert(
    State(state): State<crate::AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::UploadParse(e.body_text()))?;
    let converter = &state.converter;

    // 1. Fresh workspace scoped to this request
    let workspace = converter.open_job()?;

    // 2. Store the upload
    let mut stored = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if state.log.verbose_requests {
            tracing::debug!(
                "Job {}: receiving '{}' ({:?})",
                workspace.job_id,
                original_name,
                field.content_type()
            );
        }

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let upload = store_upload(&workspace, &original_name, reader).await?;
        stored = Some((original_name, upload));
        break;
    }

    let (original_name, upload) = stored.ok_or_else(|| {
        AppError::UploadParse(format!("Missing form field '{}'", UPLOAD_FIELD))
    })?;

    // 3. Rasterize and archive; the workspace is released here
    let outcome = converter.convert(workspace, &upload.file_name).await?;

    // 4. Result page
    let download_href = format!(
        "/download?fn={}",
        utf8_percent_encode(&outcome.archive.to_string(), NON_ALPHANUMERIC)
    );
    let page = ConvertTemplate {
        original_name,
        archive_name: outcome.archive.file_name.clone(),
        download_href,
        page_count: outcome.page_count,
    };

    Ok(Html(page.render()?))
}
