//! Signed token issuance and validation.
//!
//! Tokens are EdDSA-signed JWTs carrying a subject, a purpose tag and, for
//! access tokens, the subject's authorities. Each purpose has a fixed
//! lifetime. Purpose is recorded, not cryptographically bound: a consumer
//! that cares about intent calls [`TokenService::validate_for`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Identity, SigningKeys, TokenError};

/// Access token lifetime: 1 hour.
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(1);

/// Access token lifetime when "remember me" is requested: 7 days.
pub const EXTENDED_ACCESS_TOKEN_TTL: Duration = Duration::days(7);

/// E-mail verification token lifetime: 24 hours.
pub const EMAIL_VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// Password reset token lifetime: 30 minutes.
pub const PASSWORD_RESET_TOKEN_TTL: Duration = Duration::minutes(30);

/// Prefix applied to every authority inside the token.
const AUTHORITY_PREFIX: &str = "ROLE_";

/// Authentication scheme reported to clients.
pub const TOKEN_SCHEME: &str = "Bearer";

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims embedded in every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    purpose: TokenPurpose,
    iat: i64,
    exp: i64,
    /// Space-separated authorities, each with [`AUTHORITY_PREFIX`].
    #[serde(rename = "scope", default, skip_serializing_if = "Option::is_none")]
    authorities: Option<String>,
}

/// A freshly signed token plus the metadata clients need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub purpose: TokenPurpose,
    pub scheme: &'static str,
    pub expires_in_secs: i64,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates tokens with a fixed signing key.
#[derive(Debug, Clone)]
pub struct TokenService {
    keys: SigningKeys,
    validation: Validation,
}

impl TokenService {
    pub fn new(keys: SigningKeys) -> Self {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.leeway = 0;
        validation.validate_exp = true;
        Self { keys, validation }
    }

    /// Issue an access token for `identity`, short or "remember me" lifetime.
    pub fn issue_access_token(
        &self,
        identity: &Identity,
        extended: bool,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_access_token_at(identity, extended, Utc::now())
    }

    pub(crate) fn issue_access_token_at(
        &self,
        identity: &Identity,
        extended: bool,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = if extended {
            EXTENDED_ACCESS_TOKEN_TTL
        } else {
            ACCESS_TOKEN_TTL
        };
        let authorities = identity
            .authorities
            .iter()
            .map(|a| format!("{AUTHORITY_PREFIX}{a}"))
            .collect::<Vec<_>>()
            .join(" ");
        self.issue(
            &identity.subject,
            TokenPurpose::Access,
            ttl,
            Some(authorities),
            issued_at,
        )
    }

    /// Issue an e-mail verification token whose subject is the username.
    pub fn issue_email_verification_token(
        &self,
        username: &str,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(
            username,
            TokenPurpose::EmailVerification,
            EMAIL_VERIFICATION_TOKEN_TTL,
            None,
            Utc::now(),
        )
    }

    /// Issue a password reset token whose subject is the e-mail address.
    pub fn issue_password_reset_token(&self, email: &str) -> Result<IssuedToken, TokenError> {
        self.issue(
            email,
            TokenPurpose::PasswordReset,
            PASSWORD_RESET_TOKEN_TTL,
            None,
            Utc::now(),
        )
    }

    pub(crate) fn issue(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
        authorities: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = issued_at + ttl;
        let claims = TokenClaims {
            sub: Some(subject.to_string()),
            purpose,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            authorities,
        };
        let token = encode(
            &Header::new(Algorithm::EdDSA),
            &claims,
            &self.keys.encoding,
        )
        .map_err(|e| TokenError::Signing(format!("jwt encode: {e}")))?;
        Ok(IssuedToken {
            token,
            purpose,
            scheme: TOKEN_SCHEME,
            expires_in_secs: ttl.num_seconds(),
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the identity the token carries.
    pub fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.keys.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                TokenError::InvalidToken
            })?
            .claims;

        let subject = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(TokenError::MalformedToken)?;

        let authorities: BTreeSet<String> = claims
            .authorities
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(|a| a.strip_prefix(AUTHORITY_PREFIX).unwrap_or(a).to_string())
            .collect();

        Ok(Identity {
            subject,
            authorities,
            purpose: claims.purpose,
        })
    }

    /// Validate and additionally require the token to carry `purpose`.
    pub fn validate_for(&self, token: &str, purpose: TokenPurpose) -> Result<Identity, TokenError> {
        let identity = self.validate(token)?;
        if identity.purpose != purpose {
            debug!(expected = %purpose, actual = %identity.purpose, "token purpose mismatch");
            return Err(TokenError::WrongPurpose {
                expected: purpose,
                actual: identity.purpose,
            });
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        let (keys, _) = SigningKeys::generate().unwrap();
        TokenService::new(keys)
    }

    #[test]
    fn access_token_round_trips_subject_and_authorities() {
        let tokens = service();
        let identity = Identity::for_user(7, ["USER", "ADMIN"]);

        let issued = tokens.issue_access_token(&identity, false).unwrap();
        assert_eq!(issued.purpose, TokenPurpose::Access);
        assert_eq!(issued.scheme, "Bearer");
        assert_eq!(issued.expires_in_secs, ACCESS_TOKEN_TTL.num_seconds());

        let validated = tokens.validate(&issued.token).unwrap();
        assert_eq!(validated, identity);
    }

    #[test]
    fn remember_me_uses_extended_window() {
        let tokens = service();
        let identity = Identity::for_user(7, ["USER"]);
        let issued = tokens.issue_access_token(&identity, true).unwrap();
        assert_eq!(
            issued.expires_in_secs,
            EXTENDED_ACCESS_TOKEN_TTL.num_seconds()
        );
    }

    #[test]
    fn every_purpose_validates_within_its_window() {
        let tokens = service();

        let verify = tokens.issue_email_verification_token("alice").unwrap();
        let identity = tokens.validate(&verify.token).unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.purpose, TokenPurpose::EmailVerification);
        assert!(identity.authorities.is_empty());

        let reset = tokens
            .issue_password_reset_token("alice@example.com")
            .unwrap();
        let identity = tokens.validate(&reset.token).unwrap();
        assert_eq!(identity.subject, "alice@example.com");
        assert_eq!(identity.purpose, TokenPurpose::PasswordReset);
    }

    #[test]
    fn expired_tokens_are_rejected_for_every_purpose() {
        let tokens = service();
        let cases = [
            (TokenPurpose::Access, ACCESS_TOKEN_TTL),
            (TokenPurpose::EmailVerification, EMAIL_VERIFICATION_TOKEN_TTL),
            (TokenPurpose::PasswordReset, PASSWORD_RESET_TOKEN_TTL),
        ];
        for (purpose, ttl) in cases {
            let issued_at = Utc::now() - ttl - Duration::seconds(5);
            let issued = tokens
                .issue("1", purpose, ttl, None, issued_at)
                .unwrap();
            assert_eq!(
                tokens.validate(&issued.token),
                Err(TokenError::InvalidToken),
                "{purpose} token should have expired"
            );
        }
    }

    #[test]
    fn token_near_end_of_window_is_still_valid() {
        let tokens = service();
        let identity = Identity::for_user(3, ["USER"]);
        let issued_at = Utc::now() - ACCESS_TOKEN_TTL + Duration::seconds(60);
        let issued = tokens
            .issue_access_token_at(&identity, false, issued_at)
            .unwrap();
        assert!(tokens.validate(&issued.token).is_ok());
    }

    #[test]
    fn token_signed_by_another_key_is_invalid() {
        let issuer = service();
        let verifier = service();
        let issued = issuer
            .issue_access_token(&Identity::for_user(1, ["USER"]), false)
            .unwrap();
        assert_eq!(
            verifier.validate(&issued.token),
            Err(TokenError::InvalidToken)
        );
    }

    #[test]
    fn tampered_token_is_invalid() {
        let tokens = service();
        let issued = tokens
            .issue_access_token(&Identity::for_user(1, ["USER"]), false)
            .unwrap();
        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert_eq!(tokens.validate(&tampered), Err(TokenError::InvalidToken));
        assert_eq!(tokens.validate("garbage"), Err(TokenError::InvalidToken));
    }

    #[test]
    fn missing_subject_is_malformed() {
        let tokens = service();
        let issued = tokens
            .issue("  ", TokenPurpose::Access, ACCESS_TOKEN_TTL, None, Utc::now())
            .unwrap();
        assert_eq!(
            tokens.validate(&issued.token),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn validate_for_checks_purpose() {
        let tokens = service();
        let reset = tokens.issue_password_reset_token("a@example.com").unwrap();
        assert!(matches!(
            tokens.validate_for(&reset.token, TokenPurpose::Access),
            Err(TokenError::WrongPurpose {
                expected: TokenPurpose::Access,
                actual: TokenPurpose::PasswordReset,
            })
        ));
        assert!(
            tokens
                .validate_for(&reset.token, TokenPurpose::PasswordReset)
                .is_ok()
        );
    }

    #[test]
    fn revalidating_the_same_token_is_stable() {
        let tokens = service();
        let issued = tokens
            .issue_access_token(&Identity::for_user(9, ["USER"]), false)
            .unwrap();
        let first = tokens.validate(&issued.token).unwrap();
        let second = tokens.validate(&issued.token).unwrap();
        assert_eq!(first, second);
    }
}
