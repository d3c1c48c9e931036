//! HTTP Response Conversion
//!
//! Maps an `Outcome` onto an HTTP response for endpoint layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::{Outcome, ValidationState};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

/// Validation problem body returned for `Invalid` outcomes
#[derive(Debug, Serialize)]
pub struct ValidationProblem<'a> {
    pub title: &'static str,
    pub status: u16,
    pub errors: &'a ValidationState,
}

impl<'a> ValidationProblem<'a> {
    pub fn new(errors: &'a ValidationState) -> Self {
        Self {
            title: "One or more validation errors occurred.",
            status: StatusCode::BAD_REQUEST.as_u16(),
            errors,
        }
    }
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        let (status, error_code, error) = match self {
            Outcome::Success(value) => {
                return match serde_json::to_value(&value) {
                    // Unit outcomes carry no body; a `None` value is still `null`
                    Ok(serde_json::Value::Null) if std::mem::size_of::<T>() == 0 => {
                        StatusCode::OK.into_response()
                    }
                    Ok(body) => (StatusCode::OK, Json(body)).into_response(),
                    Err(e) => {
                        tracing::error!("Failed to serialize outcome value: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                };
            }
            Outcome::Invalid(state) => {
                return (StatusCode::BAD_REQUEST, Json(ValidationProblem::new(&state)))
                    .into_response();
            }
            Outcome::DomainError(error) => (StatusCode::BAD_REQUEST, "domain_error", error),
            Outcome::NotFound => (StatusCode::NOT_FOUND, "not_found", "Not found".to_string()),
            Outcome::Cancelled => (
                StatusCode::BAD_REQUEST,
                "cancelled",
                "The request was cancelled.".to_string(),
            ),
            // Internal detail stays in the logs
            Outcome::InternalError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
