//! Authentication middleware: Bearer token extraction and validation.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use taskboard_core::auth::tokens::TOKEN_SCHEME;
use taskboard_core::auth::{Identity, TokenPurpose};

use crate::AppState;
use crate::error::AppError;

/// Identity of the caller, stored in request extensions for one request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

/// Axum middleware: extracts `Authorization: Bearer <token>`, validates it as
/// an access token, and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case(TOKEN_SCHEME))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let identity = state.tokens.validate_for(token, TokenPurpose::Access)?;

    request.extensions_mut().insert(AuthenticatedUser(identity));

    Ok(next.run(request).await)
}
