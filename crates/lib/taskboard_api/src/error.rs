//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use taskboard_core::auth::{AuthError, TokenError};
use taskboard_core::error::DomainError;
use taskboard_core::store::StoreError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A domain rule rejected the request.
    #[error("{message}")]
    Rule {
        status: StatusCode,
        code: &'static str,
        message: String,
    },

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Rule {
                status,
                code,
                message,
            } => (*status, *code, message.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        let message = e.to_string();
        let code = e.code();
        match e {
            DomainError::NotFound { .. } => AppError::NotFound(message),
            DomainError::Forbidden(m) => AppError::Forbidden(m),
            DomainError::Unauthenticated => AppError::Unauthorized(message),
            DomainError::NotProjectMember { .. } => AppError::Rule {
                status: StatusCode::FORBIDDEN,
                code,
                message,
            },
            DomainError::NestingLimitExceeded { .. }
            | DomainError::CannotManageOwnMembership { .. }
            | DomainError::OwnerRoleNotAssignable { .. } => AppError::Rule {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code,
                message,
            },
            DomainError::AlreadyMember { .. } => AppError::Conflict(message),
            DomainError::Conflict(m) => AppError::Conflict(m),
            DomainError::Validation(m) => AppError::Validation(m),
            DomainError::Store(e) => AppError::from(e),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(m) => AppError::Conflict(m),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(m) => AppError::Internal(m),
            _ => AppError::Unauthorized("Invalid or expired token".into()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::AccountDisabled => AppError::Unauthorized("Account disabled".into()),
            AuthError::Token(e) => AppError::from(e),
            AuthError::Key(m) | AuthError::Internal(m) => AppError::Internal(m),
        }
    }
}
