//! One messaging session: frames in, frames out.
//!
//! The transport feeds inbound text to [`Session::handle_text`] and drains
//! the outbound receiver returned by [`Session::new`]. Dropping the session
//! removes all of its subscriptions.

use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, channel};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::RealtimeState;
use crate::broadcast::{Broadcaster, FrameSink, OUTBOUND_BUFFER, SessionId};
use crate::destination::DestinationMatcher;
use crate::frame::{Command, Frame, FrameError, Inbound, STOMP_VERSION};
use crate::interceptor::SessionInterceptor;

/// What the transport should do after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct Session {
    id: SessionId,
    interceptor: SessionInterceptor,
    matcher: Arc<DestinationMatcher>,
    broadcaster: Arc<Broadcaster>,
    outbound: FrameSink,
}

impl Session {
    pub fn new(state: &RealtimeState) -> (Self, Receiver<Frame>) {
        let (outbound, receiver) = channel(OUTBOUND_BUFFER);
        let session = Self {
            id: Uuid::new_v4(),
            interceptor: SessionInterceptor::new(state.tokens.clone()),
            matcher: state.matcher.clone(),
            broadcaster: state.broadcaster.clone(),
            outbound,
        };
        debug!(session_id = %session.id, "Messaging session opened");
        (session, receiver)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn interceptor(&self) -> &SessionInterceptor {
        &self.interceptor
    }

    /// Decode and handle one text message. A frame that cannot be decoded
    /// gets an ERROR frame and ends the session.
    pub async fn handle_text(&mut self, text: &str) -> Flow {
        match Frame::parse(text) {
            Ok(inbound) => self.handle(inbound).await,
            Err(e) => self.fail(&e),
        }
    }

    pub async fn handle(&mut self, inbound: Inbound) -> Flow {
        let ctx = self.interceptor.pre_send(&inbound);
        let decision = self.matcher.authorize(&inbound, &ctx).await;

        let Inbound::Frame(frame) = inbound else {
            return Flow::Continue;
        };
        if !decision.is_permit() {
            // Denials are silent towards the client.
            return Flow::Continue;
        }

        let flow = match frame.command {
            Command::Connect | Command::Stomp => {
                self.send(
                    Frame::new(Command::Connected)
                        .with_header("version", STOMP_VERSION)
                        .with_header("heart-beat", "0,0"),
                );
                Flow::Continue
            }
            Command::Subscribe => match self.subscribe(&frame) {
                Ok(()) => Flow::Continue,
                Err(e) => return self.fail(&e),
            },
            Command::Unsubscribe => match frame.require_header("id") {
                Ok(subscription_id) => {
                    self.broadcaster.unsubscribe(self.id, subscription_id);
                    Flow::Continue
                }
                Err(e) => return self.fail(&e),
            },
            Command::Disconnect => Flow::Close,
            _ => Flow::Continue,
        };

        if let Some(receipt) = frame.receipt() {
            self.send(Frame::new(Command::Receipt).with_header("receipt-id", receipt));
        }
        if flow == Flow::Close {
            info!(session_id = %self.id, "Messaging session disconnected");
            self.interceptor.clear();
        }
        flow
    }

    fn subscribe(&self, frame: &Frame) -> Result<(), FrameError> {
        let subscription_id = frame.require_header("id")?;
        let destination = frame.require_header("destination")?;
        if self
            .broadcaster
            .subscribe(destination, self.id, subscription_id, self.outbound.clone())
        {
            debug!(session_id = %self.id, %destination, %subscription_id, "Subscribed");
        } else {
            debug!(session_id = %self.id, %destination, "Already subscribed, ignoring");
        }
        Ok(())
    }

    fn fail(&mut self, error: &FrameError) -> Flow {
        warn!(session_id = %self.id, error = %error, "Malformed frame, closing session");
        self.send(Frame::error("malformed frame", error.to_string()));
        self.interceptor.clear();
        Flow::Close
    }

    fn send(&self, frame: Frame) {
        if let Err(e) = self.outbound.try_send(frame) {
            debug!(session_id = %self.id, error = %e, "Outbound frame dropped");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.broadcaster.remove_session(self.id);
        debug!(session_id = %self.id, "Messaging session closed");
    }
}
