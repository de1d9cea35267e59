//! # taskboard_core
//!
//! Core domain logic for Taskboard.
//!
//! Token issuance and validation, the permission rules shared by the REST
//! and messaging surfaces, the depth-bounded comment tree, and the storage
//! seams those pieces read from.

pub mod auth;
pub mod comments;
pub mod error;
pub mod events;
pub mod mailer;
pub mod migrate;
pub mod models;
pub mod permissions;
pub mod projects;
pub mod store;
pub mod tasks;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
