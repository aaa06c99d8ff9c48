pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::handlers::{convert, download, health, pages};
use crate::api::middleware::{request_id::request_id_middleware, request_log::request_log_middleware};
use crate::config::{ConverterConfig, LogConfig};
use crate::services::converter::ConversionService;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::pages::index,
        api::handlers::pages::upload_form,
        api::handlers::convert::convert,
        api::handlers::download::download_archive,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "pages", description = "HTML pages"),
        (name = "convert", description = "PDF conversion and archive download"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<ConversionService>,
    pub config: ConverterConfig,
    pub log: LogConfig,
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Room for multipart boundaries and the form's other fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(pages::index))
        .route("/upload", get(pages::upload_form))
        .route("/convert", post(convert::convert))
        .route("/download", get(download::download_archive))
        .route("/health", get(health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(from_fn_with_state(
            state.log.clone(),
            request_log_middleware,
        ))
        .layer(from_fn(request_id_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
