//! Access logging middleware.
//!
//! Logs every API request with method, path, response status, and the
//! owner when the caller middleware has identified one.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::models::Caller;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let owner = req
        .extensions()
        .get::<Caller>()
        .map(|c| c.owner_id.to_string())
        .unwrap_or_else(|| "-".into());
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        owner_id = %owner,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "API request"
    );
    response
}
