use crate::api::error::AppError;
use crate::utils::hash::freshness_token;
use askama::Template;
use axum::{extract::State, response::Html};
use chrono::Utc;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate;

#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadTemplate {
    pub token: String,
    pub max_size_mb: usize,
}

#[derive(Template)]
#[template(path = "convert.html")]
pub struct ConvertTemplate {
    pub original_name: String,
    pub archive_name: String,
    pub download_href: String,
    pub page_count: usize,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", content_type = "text/html")),
    tag = "pages"
)]
pub async fn index() -> Result<Html<String>, AppError> {
    Ok(Html(IndexTemplate.render()?))
}

#[utoipa::path(
    get,
    path = "/upload",
    responses((status = 200, description = "Upload form", content_type = "text/html")),
    tag = "pages"
)]
pub async fn upload_form(State(state): State<crate::AppState>) -> Result<Html<String>, AppError> {
    let template = UploadTemplate {
        token: freshness_token(Utc::now().timestamp()),
        max_size_mb: state.config.max_file_size / 1024 / 1024,
    };
    Ok(Html(template.render()?))
}
