//! Per-session identity binding.
//!
//! A messaging session authenticates once, on its CONNECT frame. The bound
//! identity is then handed to authorization as an explicit
//! [`SecurityContext`] with every later frame; tokens are not re-validated.

use std::sync::Arc;

use taskboard_core::auth::tokens::TOKEN_SCHEME;
use taskboard_core::auth::{Identity, TokenPurpose, TokenService};
use tracing::{debug, info};

use crate::frame::{Command, Frame, Inbound};

/// Header carrying the bearer token on CONNECT.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Identity),
}

/// Identity in effect for one inbound frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    pub identity: Option<Identity>,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.identity.as_ref().and_then(Identity::user_id)
    }
}

pub struct SessionInterceptor {
    tokens: Arc<TokenService>,
    state: SessionState,
}

impl SessionInterceptor {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Authenticated(identity) => Some(identity),
            SessionState::Unauthenticated => None,
        }
    }

    /// Run before a frame is dispatched. CONNECT and STOMP frames may bind an
    /// identity; every frame gets the context currently bound.
    pub fn pre_send(&mut self, inbound: &Inbound) -> SecurityContext {
        if let Inbound::Frame(frame) = inbound
            && matches!(frame.command, Command::Connect | Command::Stomp)
        {
            self.authenticate(frame);
        }
        SecurityContext {
            identity: self.identity().cloned(),
        }
    }

    fn authenticate(&mut self, frame: &Frame) {
        if let SessionState::Authenticated(identity) = &self.state {
            debug!(subject = %identity.subject, "Session already authenticated, keeping identity");
            return;
        }
        let Some(token) = bearer_token(frame) else {
            debug!("CONNECT without bearer token, session stays unauthenticated");
            return;
        };
        match self.tokens.validate_for(token, TokenPurpose::Access) {
            Ok(identity) => {
                info!(subject = %identity.subject, "Messaging session authenticated");
                self.state = SessionState::Authenticated(identity);
            }
            Err(e) => {
                debug!(error = %e, "CONNECT token rejected, session stays unauthenticated");
            }
        }
    }

    /// Forget the bound identity.
    pub fn clear(&mut self) {
        self.state = SessionState::Unauthenticated;
    }
}

fn bearer_token(frame: &Frame) -> Option<&str> {
    let value = frame
        .header(AUTHORIZATION_HEADER)
        .or_else(|| frame.header("authorization"))?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(TOKEN_SCHEME) && !token.is_empty()).then_some(token)
}
