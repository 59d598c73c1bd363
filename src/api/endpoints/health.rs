//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub accepting_jobs: bool,
    pub jobs_in_flight: usize,
}

/// `GET /api/health`: liveness plus queue state. No caller required.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let queue = ctx.core.queue();
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        accepting_jobs: !queue.is_closed(),
        jobs_in_flight: queue.in_flight(),
    })
}
