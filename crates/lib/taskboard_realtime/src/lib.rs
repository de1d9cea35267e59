//! # taskboard_realtime
//!
//! Live comment notifications over STOMP 1.2 on a WebSocket.
//!
//! A session authenticates once on CONNECT ([`interceptor`]), every inbound
//! frame passes the destination rule table ([`destination`]), and comment
//! events are fanned out to subscribed sessions by the [`broadcast`]
//! registry. [`realtime_router`] exposes the `/ws` endpoint.

pub mod broadcast;
pub mod destination;
pub mod frame;
pub mod interceptor;
pub mod session;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use taskboard_core::auth::TokenService;
use taskboard_core::permissions::PermissionEvaluator;

use broadcast::Broadcaster;
use destination::DestinationMatcher;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Shared state of all messaging sessions.
#[derive(Clone)]
pub struct RealtimeState {
    pub tokens: Arc<TokenService>,
    pub matcher: Arc<DestinationMatcher>,
    pub broadcaster: Arc<Broadcaster>,
}

impl RealtimeState {
    pub fn new(
        tokens: Arc<TokenService>,
        permissions: PermissionEvaluator,
        broadcaster: Arc<Broadcaster>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            tokens,
            matcher: Arc::new(DestinationMatcher::new(permissions)?),
            broadcaster,
        })
    }
}

/// Build an Axum router serving the STOMP WebSocket endpoint at `/ws`.
pub fn realtime_router(state: RealtimeState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
