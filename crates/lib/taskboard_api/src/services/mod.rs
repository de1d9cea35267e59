//! Request-level services that combine core operations.

pub mod auth;
