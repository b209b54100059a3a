//! Maps [`imgcache_core::Error`] onto HTTP responses (SPEC_FULL §7).
//!
//! Grounded on the teacher's `read_state` helper in `server/src/api.rs`,
//! which returns a `(StatusCode, Json<Value>)` tuple on failure; the axum
//! idiom for the same shape is an `IntoResponse` impl on a newtype wrapping
//! the domain error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use imgcache_core::Error as CoreError;
use serde_json::json;

/// Newtype so we can impl the foreign `IntoResponse` trait for the core
/// crate's error type without violating the orphan rule.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::IdNotFound { id } => (StatusCode::NOT_FOUND, format!("no image with id {id}")),
            CoreError::InvalidImage(e) => (StatusCode::BAD_REQUEST, format!("invalid image: {e}")),
            CoreError::InvalidParams(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
