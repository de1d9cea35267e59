//! Authentication logic.
//!
//! Signed token issuance and validation, the authenticated `Identity`, and
//! password hashing that can be shared across `taskboard_api` and
//! `taskboard_realtime`.

pub mod identity;
pub mod keys;
pub mod password;
pub mod tokens;

use thiserror::Error;

pub use identity::Identity;
pub use keys::SigningKeys;
pub use tokens::{IssuedToken, TokenPurpose, TokenService};

/// Token validation and issuance failures.
///
/// Every variant means "unauthenticated" to a caller; the distinction only
/// exists for logging and for consumers that check token intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Malformed token: missing subject")]
    MalformedToken,

    #[error("Token issued for {actual}, expected {expected}")]
    WrongPurpose {
        expected: TokenPurpose,
        actual: TokenPurpose,
    },

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Account disabled")]
    AccountDisabled,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Signing key error: {0}")]
    Key(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
