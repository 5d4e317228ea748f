use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Names the file registry operation served by a route template.
/// Unrouted requests fall through to the static bundle.
pub fn operation_name(route: Option<&str>) -> &'static str {
    match route {
        Some("/upload") => "upload",
        Some("/files") => "list",
        Some("/download/:key") => "download",
        Some("/delete/:key") => "delete",
        Some("/health") => "health",
        Some(r) if r.starts_with("/swagger-ui") || r.starts_with("/api-docs") => "docs",
        Some(_) => "other",
        None => "static",
    }
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    // The route template keeps object keys out of the event
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());
    let operation = operation_name(route.as_deref());

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        target: "metrics",
        operation,
        method = %method,
        route = route.as_deref().unwrap_or("-"),
        status = status.as_u16(),
        failed = status.is_client_error() || status.is_server_error(),
        latency_ms = latency.as_millis() as u64,
        "request_completed"
    );

    response
}
