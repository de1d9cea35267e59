//! Authentication service: login, registration, e-mail verification and
//! password reset, delegating to `taskboard_core::auth`.

use taskboard_core::auth::password::{self, MIN_PASSWORD_LEN};
use taskboard_core::auth::{AuthError, Identity, TokenPurpose};
use taskboard_core::models::{DEFAULT_USER_ROLE, NewUser, UserSummary};
use tracing::{debug, info};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{SuccessResponse, TokenResponse};

/// Authenticate with username or e-mail plus password.
pub async fn login(
    state: &AppState,
    identifier: &str,
    password: &str,
    remember_me: bool,
) -> AppResult<TokenResponse> {
    let user = state
        .store
        .find_user_by_login(identifier.trim())
        .await?
        .ok_or(AuthError::CredentialError)?;

    password::check_password(password, &user.password_hash)?;
    if !user.enabled {
        debug!(user_id = user.id, "Login refused: account not verified");
        return Err(AuthError::AccountDisabled.into());
    }

    let identity = Identity::for_user(user.id, user.roles.iter().cloned());
    let issued = state.tokens.issue_access_token(&identity, remember_me)?;
    info!(user_id = user.id, remember_me, "User logged in");
    Ok(issued.into())
}

/// Create a disabled account and mail its verification token.
pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> AppResult<UserSummary> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("A valid e-mail address is required".into()));
    }
    if !password::is_acceptable(password) {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = password::hash_password(password)?;
    let user = state
        .store
        .create_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            enabled: false,
            roles: vec![DEFAULT_USER_ROLE.to_string()],
        })
        .await?;

    let verification = state.tokens.issue_email_verification_token(&user.username)?;
    state
        .mailer
        .send_verification(&user.email, &user.username, &verification.token)
        .await;
    info!(user_id = user.id, "User registered");
    Ok(UserSummary::from(&user))
}

/// Enable the account named by an e-mail verification token.
pub async fn verify_email(state: &AppState, token: &str) -> AppResult<SuccessResponse> {
    let identity = state
        .tokens
        .validate_for(token, TokenPurpose::EmailVerification)?;
    let user = state
        .store
        .find_user_by_username(&identity.subject)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", identity.subject)))?;
    state.store.set_user_enabled(user.id, true).await?;
    info!(user_id = user.id, "E-mail verified");
    Ok(SuccessResponse::ok())
}

/// Mail a reset token if the address is known. Always reports success.
pub async fn request_password_reset(
    state: &AppState,
    email: &str,
) -> AppResult<SuccessResponse> {
    match state.store.find_user_by_email(email.trim()).await? {
        Some(user) => {
            let reset = state.tokens.issue_password_reset_token(&user.email)?;
            state
                .mailer
                .send_password_reset(&user.email, &reset.token)
                .await;
            info!(user_id = user.id, "Password reset requested");
        }
        None => debug!("Password reset requested for unknown address"),
    }
    Ok(SuccessResponse::ok())
}

/// Set a new password using a password reset token.
pub async fn confirm_password_reset(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> AppResult<SuccessResponse> {
    let identity = state
        .tokens
        .validate_for(token, TokenPurpose::PasswordReset)?;
    if !password::is_acceptable(new_password) {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let user = state
        .store
        .find_user_by_email(&identity.subject)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;
    let password_hash = password::hash_password(new_password)?;
    state.store.set_password_hash(user.id, &password_hash).await?;
    info!(user_id = user.id, "Password reset");
    Ok(SuccessResponse::ok())
}
