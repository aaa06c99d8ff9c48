use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::LogConfig;

/// Logs every request's outcome; with `verbose_requests` also its method,
/// path, query and headers before it is handled.
pub async fn request_log_middleware(
    State(log): State<LogConfig>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    if log.verbose_requests {
        debug!(
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            headers = ?req.headers(),
            "request_received"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "request_completed"
    );

    response
}
