//! API error types and helpers.
//!
//! # Purpose
//! Centralizes HTTP error response construction so every handler maps the
//! catalog taxonomy onto the same wire shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::api::types::ErrorResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_bad_request(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<armada_catalog::Error> for ApiError {
    fn from(err: armada_catalog::Error) -> Self {
        use armada_catalog::Error;
        match &err {
            Error::NotFound(msg) => api_error(StatusCode::NOT_FOUND, "not_found", msg),
            Error::Unauthorized(msg) => api_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Error::AlreadyExists(msg) => api_error(StatusCode::CONFLICT, "already_exists", msg),
            Error::BadRequest(msg) => api_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            Error::LeaseUnavailable => api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "lease_unavailable",
                "monitor lease unavailable",
            ),
            Error::ConnectionFailure(msg) => {
                api_error(StatusCode::BAD_GATEWAY, "connection_failure", msg)
            }
            Error::Internal(inner) => {
                tracing::error!(error = ?inner, "internal error");
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal error",
                )
            }
        }
    }
}

impl From<armada_authz::Error> for ApiError {
    fn from(err: armada_authz::Error) -> Self {
        api_error(StatusCode::BAD_REQUEST, "bad_request", &err.to_string())
    }
}
