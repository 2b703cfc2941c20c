//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Document store backend: "memory" or "postgres"
    #[schema(example = "postgres")]
    pub store: &'static str,
    /// Whether the document store answers
    pub store_available: bool,
    /// Service name
    pub service: &'static str,
}

/// GET /health - Health check endpoint
///
/// Returns JSON with service status, version, and document store availability.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_available = state.service.check_health().await;

    Json(HealthResponse {
        status: if store_available { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store: state.service.backend(),
        store_available,
        service: "aiiinotate-server",
    })
}
