//! HTTP error mapping shared by every route.
//!
//! Handlers return `Result<_, ApiError>`; validation problems become 400s,
//! model failures 500s, both with a `{"error": "..."}` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::ml::ModelError;
use crate::ValidationError;

// ---

#[derive(Debug)]
pub enum ApiError {
    BadRequest(ValidationError),
    Model(ModelError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e)
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        ApiError::Model(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match self {
            ApiError::BadRequest(e) => {
                warn!("Rejected request: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Model(e) => {
                error!("Model failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
