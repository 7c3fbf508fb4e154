/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - StoreError / IdCodecError / AuthError をここで外部向けの契約に変換する (唯一の変換点)
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::StoreError;
use crate::services::auth::AuthError;
use crate::services::id_codec::IdCodecError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("request timed out")]
    RequestTimeout,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BadRequest", Some(message))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "NotFound",
                Some(format!("{resource} not found.")),
            ),
            AppError::RequestTimeout => (StatusCode::REQUEST_TIMEOUT, "RequestTimeout", None),
            AppError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge", None),
            AppError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", None)
            }
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", None),
        };

        let mut res = (status, Json(ErrorResponse { error, message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            // Owner mismatch looks exactly like a missing memo from the outside.
            StoreError::NotFound | StoreError::Forbidden => AppError::not_found("memo"),
            StoreError::Db(err) => {
                tracing::error!(error = %err, "memo store failure");
                AppError::Internal
            }
            StoreError::Unavailable => AppError::Internal,
        }
    }
}

impl From<IdCodecError> for AppError {
    fn from(e: IdCodecError) -> Self {
        match e {
            // Client supplied a malformed public id (e.g. /memos/{id})
            IdCodecError::DecodeInvalidFormat | IdCodecError::DecodeOutOfRange => {
                AppError::bad_request("invalid memo id")
            }
            // server-side config / programming errors
            other => {
                tracing::error!(error = %other, "id codec failure");
                AppError::Internal
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::KeysUnavailable => AppError::ServiceUnavailable,
            _ => AppError::Unauthorized,
        }
    }
}
