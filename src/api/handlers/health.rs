use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub work_dir: String,
    pub rasterizer: String,
    pub archiver: String,
    pub version: String,
}

fn availability(ok: bool) -> String {
    if ok { "available" } else { "unavailable" }.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let layout = state.converter.layout();
    let work_dir_status = if tokio::fs::metadata(layout.archives_root()).await.is_ok()
        && tokio::fs::metadata(layout.scratch_root()).await.is_ok()
    {
        "ready"
    } else {
        "missing"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        work_dir: work_dir_status.to_string(),
        rasterizer: availability(state.converter.rasterizer().health_check().await),
        archiver: availability(state.converter.archiver().health_check().await),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
