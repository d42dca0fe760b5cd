// src/routes/health.rs
//! API health check endpoint for the link-audit service.
//!
//! Defines the `/health` route used by container orchestrators and CI to
//! verify that the service is up and that the mesh reference table loaded.
//! Follows the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler and its response type
//! - Exports to the gateway (`mod.rs`): a subrouter containing `/health`

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    mesh_reference_entries: usize,
}

/// Handle `GET /health`.
///
/// Never touches the readings source.
async fn health(State((reference, _config)): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mesh_reference_entries: reference.len(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
