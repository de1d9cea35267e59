//! Authentication request handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use taskboard_core::models::UserSummary;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, MeResponse, PasswordResetConfirmRequest, PasswordResetRequest, RegisterRequest,
    SuccessResponse, TokenResponse, VerifyEmailQuery,
};
use crate::services::auth;

/// `POST /auth/login`: authenticate with username or e-mail + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(&state, &body.identifier, &body.password, body.remember_me).await?;
    Ok(Json(resp))
}

/// `POST /auth/register`: create an account pending e-mail verification.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    let user = auth::register(&state, &body.username, &body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /auth/verify-email?token=`: enable the account.
pub async fn verify_email_handler(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> AppResult<Json<SuccessResponse>> {
    Ok(Json(auth::verify_email(&state, &query.token).await?))
}

/// `POST /auth/password-reset/request`
pub async fn password_reset_request_handler(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> AppResult<Json<SuccessResponse>> {
    Ok(Json(auth::request_password_reset(&state, &body.email).await?))
}

/// `POST /auth/password-reset/confirm`
pub async fn password_reset_confirm_handler(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirmRequest>,
) -> AppResult<Json<SuccessResponse>> {
    Ok(Json(
        auth::confirm_password_reset(&state, &body.token, &body.new_password).await?,
    ))
}

/// `GET /auth/me`: the identity carried by the bearer token.
pub async fn me_handler(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> Json<MeResponse> {
    Json(MeResponse::from(&identity))
}
