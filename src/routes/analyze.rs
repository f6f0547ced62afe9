//! Aggregate endpoints: full analysis, recommendations only, and simulation.

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::ApiError;
use crate::{AnalysisReport, AppState, ReadingPatch, ValidationError};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/analyze", get(analyze_current).post(analyze_custom))
        .route("/api/recommendations", get(recommendations))
        .route("/api/simulate", post(simulate))
}

async fn analyze_current(State(state): State<AppState>) -> Json<AnalysisReport> {
    // ---
    info!("GET /api/analyze - Starting analysis");
    let report = state.system.analyze(&state.snapshot());
    debug!(
        "GET /api/analyze - {} recommendations",
        report.recommendations.len()
    );
    Json(report)
}

/// Analyse the current reading overlaid with the body's fields. The overlay
/// is not stored. An empty body analyses the current reading as-is.
async fn analyze_custom(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisReport>, ApiError> {
    // ---
    info!("POST /api/analyze - Starting analysis");
    let current = state.snapshot();
    let reading = match ReadingPatch::from_body(&body) {
        Ok(patch) => patch.merge_over(&current),
        Err(ValidationError::EmptyPatch) => current,
        Err(e) => return Err(e.into()),
    };

    let report = state.system.analyze(&reading);
    debug!(
        "POST /api/analyze - {} recommendations",
        report.recommendations.len()
    );
    Ok(Json(report))
}

async fn recommendations(State(state): State<AppState>) -> Json<Value> {
    // ---
    info!("GET /api/recommendations");
    let report = state.system.analyze(&state.snapshot());
    Json(json!({
        "timestamp": Utc::now(),
        "recommendations": report.recommendations,
    }))
}

/// Replace the live channels with random plausible values, then analyse.
async fn simulate(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // ---
    info!("POST /api/simulate");

    let simulated = state.update(|reading| {
        let mut rng = rand::thread_rng();
        reading.moisture = rng.gen_range(30.0..60.0);
        reading.temperature = rng.gen_range(20.0..32.0);
        reading.humidity = rng.gen_range(40.0..80.0);
        reading.light = rng.gen_range(300.0..800.0);
        Ok::<_, ApiError>(())
    })?;

    let report = state.system.analyze(&simulated);
    Ok(Json(json!({
        "status": "simulation_complete",
        "new_sensor_data": simulated,
        "analysis": report,
    })))
}
