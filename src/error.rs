/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - PatError を統一的に変換 (invalid-argument / not-found / conflict / internal)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::pat::PatError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                message.to_string(),
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{resource} not found."),
            ),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<PatError> for AppError {
    fn from(e: PatError) -> Self {
        match e {
            PatError::InvalidExpiration => {
                AppError::bad_request("INVALID_EXPIRATION", "expiration date must be in the future")
            }
            PatError::MachineUserNotFound => AppError::not_found("machine user"),
            PatError::PatNotFound => AppError::not_found("PAT"),
            // Only reaches callers when a creation conflict could not be recovered.
            PatError::Upstream(ref idp) if idp.is_conflict() => {
                AppError::conflict("ALREADY_EXISTS", "resource already exists")
            }
            PatError::Upstream(_) | PatError::Inconsistent(_) => {
                tracing::error!(error = %e, "PAT operation failed");
                AppError::Internal
            }
        }
    }
}
