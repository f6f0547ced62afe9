//! Single-predictor endpoints, each keyed off the current reading.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/irrigation", get(irrigation))
        .route("/api/health", get(crop_health))
        .route("/api/yield", get(yield_forecast))
        .route("/api/anomalies", get(anomalies))
}

async fn irrigation(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    info!("GET /api/irrigation");
    let prediction = state.system.predict_irrigation(&state.snapshot())?;
    Ok(Json(json!({
        "timestamp": Utc::now(),
        "prediction": prediction,
    })))
}

async fn crop_health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    info!("GET /api/health");
    let health = state.system.predict_health(&state.snapshot())?;
    Ok(Json(json!({
        "timestamp": Utc::now(),
        "health": health,
    })))
}

async fn yield_forecast(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    info!("GET /api/yield");
    let prediction = state.system.predict_yield(&state.snapshot())?;
    Ok(Json(json!({
        "timestamp": Utc::now(),
        "prediction": prediction,
    })))
}

/// Note: every call records the current reading in the detector's history.
async fn anomalies(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    info!("GET /api/anomalies");
    let anomalies = state.system.detect_anomalies(&state.snapshot())?;
    Ok(Json(json!({
        "timestamp": Utc::now(),
        "count": anomalies.len(),
        "anomalies": anomalies,
    })))
}
