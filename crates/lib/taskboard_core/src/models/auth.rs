//! User records owned by the user-management collaborator.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Domain user.
///
/// `enabled` stays false until the e-mail address has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub enabled: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user, without the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub enabled: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            enabled: user.enabled,
        }
    }
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub enabled: bool,
    pub roles: Vec<String>,
}

/// Role every registered user receives.
pub const DEFAULT_USER_ROLE: &str = "USER";
