// src/routes/health.rs
//! Liveness endpoint for the agrisense backend.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is up. Not to be confused with
//! `/api/health`, which reports *crop* health (see `predictions.rs`).
//! Follows the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    models_trained: bool,
}

/// Handle `GET /health`.
///
/// Never trains or queries a model; it only reports whether the lazy
/// models have been fitted yet.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models_trained: state.system.is_trained(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
