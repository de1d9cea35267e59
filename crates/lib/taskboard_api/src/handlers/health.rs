//! Liveness endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: taskboard_core::version(),
    })
}
