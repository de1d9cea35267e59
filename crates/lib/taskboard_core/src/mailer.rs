//! Outbound e-mail seam.
//!
//! Delivery itself is a collaborator; the core only hands over the token
//! that a link in the message would carry.

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, email: &str, username: &str, token: &str);

    async fn send_password_reset(&self, email: &str, token: &str);
}

/// Mailer that only records what would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &str, username: &str, token: &str) {
        info!(%email, %username, token_len = token.len(), "Verification mail queued");
    }

    async fn send_password_reset(&self, email: &str, token: &str) {
        info!(%email, token_len = token.len(), "Password reset mail queued");
    }
}
