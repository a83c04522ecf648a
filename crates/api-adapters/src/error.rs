//! # ApiError
//!
//! Translates service and auth failures into HTTP responses.
//! Internal failures are logged here and reach the client as an opaque 500.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{AppError, AuthError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::App(AppError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::App(AppError::NotFound(..)) => StatusCode::NOT_FOUND,
            ApiError::App(AppError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::App(AppError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::App(AppError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::App(AppError::Internal(detail)) => {
                tracing::error!(error = %detail, "request failed with internal error");
                let body = ErrorBody { error: "internal", message: "internal server error".into() };
                (status, Json(body)).into_response()
            }
            ApiError::App(err) => {
                tracing::debug!(kind = err.kind(), error = %err, "request rejected");
                let body = ErrorBody { error: err.kind(), message: err.to_string() };
                (status, Json(body)).into_response()
            }
            ApiError::Auth(err) => {
                let body = ErrorBody { error: "unauthorized", message: err.to_string() };
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
            }
        }
    }
}
