//! Current-reading endpoints: read it, or patch the live channels.

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::ApiError;
use crate::{AppState, ReadingPatch};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/sensors", get(current))
        .route("/api/sensors/update", post(update))
}

async fn current(State(state): State<AppState>) -> Json<Value> {
    // ---
    debug!("GET /api/sensors");
    Json(json!({
        "timestamp": Utc::now(),
        "data": state.snapshot(),
    }))
}

/// Overwrite moisture / temperature / humidity / light with whichever of
/// them the body carries. Other fields in the body are ignored.
async fn update(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    // ---
    info!("POST /api/sensors/update");

    let patch = ReadingPatch::from_body(&body)?;
    let updated = state.update(|reading| reading.apply_sensor_update(&patch))?;

    debug!("POST /api/sensors/update - now {:?}", updated);
    Ok(Json(json!({
        "status": "success",
        "updated_data": updated,
    })))
}
