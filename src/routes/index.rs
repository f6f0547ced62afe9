//! `GET /` – API description.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/", get(handler))
}

async fn handler() -> Json<Value> {
    // ---
    Json(json!({
        "name": "Smart Agriculture AI API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "endpoints": {
            "/api/sensors": "GET current sensor readings",
            "/api/sensors/update": "POST new sensor data",
            "/api/irrigation": "GET irrigation prediction",
            "/api/health": "GET crop health status",
            "/api/yield": "GET yield prediction",
            "/api/anomalies": "GET anomaly detection results",
            "/api/analyze": "GET or POST comprehensive analysis",
            "/api/recommendations": "GET prioritized recommendations",
            "/api/simulate": "POST simulated sensor readings",
            "/health": "GET service liveness"
        }
    }))
}
