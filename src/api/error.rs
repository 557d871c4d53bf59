//! Error responses
//!
//! Every failure is answered with a JSON body of the form
//! `{"success": false, "error": "...", "timestamp": "..."}`.

use axum::{
    extract::rejection::JsonRejection,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;

use crate::error::AssessmentError;

#[derive(Debug)]
pub enum ApiError {
    /// Body missing, not JSON, or not a JSON object
    NoJson,
    /// Body refused before parsing (e.g. too large)
    Rejected(JsonRejection),
    /// Known path, unsupported method
    MethodNotAllowed(Method),
    Assessment { error: AssessmentError, debug: bool },
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    timestamp: String,
}

impl ErrorBody {
    fn new(error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::Rejected(rejection)
        } else {
            ApiError::NoJson
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NoJson => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("No JSON data provided", None),
            ),
            ApiError::Rejected(rejection) => (
                rejection.status(),
                ErrorBody::new(rejection.body_text(), None),
            ),
            ApiError::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorBody::new(
                    "Method not allowed",
                    Some(format!(
                        "The method {} is not allowed for the requested URL.",
                        method
                    )),
                ),
            ),
            ApiError::Assessment { error: e, debug } if !e.is_client_error() => {
                error!(error = %e, "Internal server error");
                let message = if debug {
                    e.to_string()
                } else {
                    "An unexpected error occurred".to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error", Some(message)),
                )
            }
            ApiError::Assessment { error: e, .. } => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(e.to_string(), None))
            }
        };

        (status, Json(body)).into_response()
    }
}
