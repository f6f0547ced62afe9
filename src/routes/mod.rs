use axum::Router;

use crate::AppState;

mod analyze;
mod error;
mod health;
mod index;
mod predictions;
mod sensors;

pub use error::ApiError;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(index::router())
        .merge(sensors::router())
        .merge(predictions::router())
        .merge(analyze::router())
        .merge(health::router())
        .with_state(state)
}
