//! Password hashing via bcrypt.
//!
//! Credential storage belongs to the user-management collaborator; this is
//! the boundary the login and reset flows call into.

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a stored hash; a mismatch is `CredentialError`.
pub fn check_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let matches = bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))?;
    if matches {
        Ok(())
    } else {
        Err(AuthError::CredentialError)
    }
}

/// Whether a candidate password meets the length policy.
pub fn is_acceptable(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_check() {
        let hash = hash_password("correct horse").unwrap();
        assert!(check_password("correct horse", &hash).is_ok());
        assert!(matches!(
            check_password("wrong horse", &hash),
            Err(AuthError::CredentialError)
        ));
    }

    #[test]
    fn length_policy() {
        assert!(!is_acceptable("short"));
        assert!(is_acceptable("long enough"));
    }
}
