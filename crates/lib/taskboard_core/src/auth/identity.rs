//! The authenticated subject of a request or messaging session.

use std::collections::BTreeSet;

use serde::Serialize;

use super::TokenPurpose;

/// Authenticated identity reconstructed from a validated token.
///
/// Never persisted. Lives for one REST request or one messaging session and
/// is passed explicitly to every check that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject: String,
    pub authorities: BTreeSet<String>,
    pub purpose: TokenPurpose,
}

impl Identity {
    /// Build an access identity for a user id and its role names.
    pub fn for_user<I, S>(user_id: i64, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: user_id.to_string(),
            authorities: roles.into_iter().map(Into::into).collect(),
            purpose: TokenPurpose::Access,
        }
    }

    /// Numeric user id carried in the subject, if it parses.
    pub fn user_id(&self) -> Option<i64> {
        self.subject.parse().ok()
    }

    pub fn has_authority(&self, role: &str) -> bool {
        self.authorities.contains(role)
    }
}
