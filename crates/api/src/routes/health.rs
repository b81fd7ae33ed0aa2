//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

/// Body of the liveness probe. Reports the running version so deploys
/// are easy to confirm from the outside.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health — liveness only; says nothing about the store.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
