//! JSON response envelope and error mapping.
//!
//! Every response is JSON. Success bodies carry `{"status":"success"}`
//! plus endpoint-specific fields; failures carry
//! `{"status":"error","message"}` with a matching HTTP status code.
//! Authentication failures are deliberately generic.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatehouse_core::Error;
use serde_json::{Value, json};

/// Result alias for route handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// An error response: HTTP status plus the wire message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Generic 401: never leaks which part of the credentials was wrong.
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Authentication required".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({"status": "error", "message": self.message});
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidCardFormat(_)
            | Error::InvalidReaderId(_)
            | Error::Validation { .. }
            | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => return ApiError::unauthorized(),
            Error::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Storage(_) | Error::Hardware(_) | Error::Remote(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<gatehouse_storage::StorageError> for ApiError {
    fn from(err: gatehouse_storage::StorageError) -> Self {
        gatehouse_core::Error::from(err).into()
    }
}

/// Bare `{"status":"success"}`.
pub fn success() -> Json<Value> {
    Json(json!({"status": "success"}))
}

/// `{"status":"success"}` merged with extra fields.
pub fn success_with(extra: Value) -> Json<Value> {
    let mut body = json!({"status": "success"});
    if let (Some(obj), Some(more)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in more {
            obj.insert(k.clone(), v.clone());
        }
    }
    Json(body)
}
