use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

/// Errors surfaced by HTTP handlers.
///
/// Authentication failures all collapse into [`ApiError::Unauthorized`] with
/// one fixed message. A resource owned by someone else is reported as
/// [`ApiError::NotFound`], same as a missing one.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not validate user")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Maps a duplicate-key store error to a conflict; anything else stays a
    /// store failure.
    pub fn conflict_on_duplicate(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => Self::Conflict(format!("{field} already registered")),
            other => Self::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "request body rejected");
        match rejection {
            // Wrong type, unknown variant or missing field.
            JsonRejection::JsonDataError(e) => Self::validation("body", e.body_text()),
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Could not validate user." }),
            ),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "detail": format!("{what} not found.") }),
            ),
            Self::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "detail": message, "field": field }),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "detail": message })),
            Self::Conflict(message) => (StatusCode::CONFLICT, json!({ "detail": message })),
            Self::Store(err) => {
                error!(error = %err, "store error");
                internal()
            }
            Self::Internal(err) => {
                error!(error = %err, "internal error");
                internal()
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Path ids are positive; anything else is a validation error rather than a
/// lookup.
pub fn ensure_positive_id(field: &'static str, id: i64) -> Result<i64, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(field, "must be greater than 0"));
    }
    Ok(id)
}

fn internal() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "detail": "Internal server error" }),
    )
}
