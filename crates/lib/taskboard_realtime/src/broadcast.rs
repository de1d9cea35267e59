//! Event Broadcaster.
//!
//! In-process topic registry. Each connected session owns a bounded outbound
//! channel; publishing pushes a MESSAGE frame into the channel of every
//! session subscribed to the topic. Nothing is queued for sessions that are
//! not connected, and a session whose buffer is full is unsubscribed.

use std::collections::HashMap;

use dashmap::DashMap;
use taskboard_core::events::{CommentEvent, EventPublisher};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::frame::{Command, Frame};

pub type SessionId = Uuid;

/// Frames a session may have queued before it counts as stalled.
pub const OUTBOUND_BUFFER: usize = 256;

/// Outbound frame channel of one session.
pub type FrameSink = Sender<Frame>;

#[derive(Debug, Clone)]
struct Subscriber {
    subscription_id: String,
    sink: FrameSink,
}

/// Topic → subscribed sessions.
#[derive(Debug, Default)]
pub struct Broadcaster {
    topics: DashMap<String, HashMap<SessionId, Subscriber>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id` on `topic`. Returns false when the session was
    /// already subscribed; the first subscription id is kept.
    pub fn subscribe(
        &self,
        topic: &str,
        session_id: SessionId,
        subscription_id: &str,
        sink: FrameSink,
    ) -> bool {
        let mut subscribers = self.topics.entry(topic.to_string()).or_default();
        if subscribers.contains_key(&session_id) {
            return false;
        }
        subscribers.insert(
            session_id,
            Subscriber {
                subscription_id: subscription_id.to_string(),
                sink,
            },
        );
        true
    }

    /// Drop the subscription with `subscription_id` held by `session_id`.
    pub fn unsubscribe(&self, session_id: SessionId, subscription_id: &str) -> bool {
        let mut removed = false;
        for mut entry in self.topics.iter_mut() {
            let subscribers = entry.value_mut();
            if subscribers
                .get(&session_id)
                .is_some_and(|s| s.subscription_id == subscription_id)
            {
                subscribers.remove(&session_id);
                removed = true;
            }
        }
        self.prune_empty();
        removed
    }

    /// Drop every subscription of a session.
    pub fn remove_session(&self, session_id: SessionId) {
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().remove(&session_id);
        }
        self.prune_empty();
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |s| s.len())
    }

    /// Deliver a JSON body to every subscriber of `topic`. Sessions whose
    /// channel has closed or is full are removed. Returns the number of
    /// deliveries.
    pub fn publish_json(&self, topic: &str, body: &str) -> usize {
        let Some(mut subscribers) = self.topics.get_mut(topic) else {
            return 0;
        };
        let mut delivered = 0;
        subscribers.retain(|session_id, subscriber| {
            let frame = Frame::new(Command::Message)
                .with_header("subscription", subscriber.subscription_id.as_str())
                .with_header("message-id", Uuid::new_v4().to_string())
                .with_header("destination", topic)
                .with_header("content-type", "application/json")
                .with_body(body);
            match subscriber.sink.try_send(frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(%session_id, %topic, "Outbound buffer full, dropping subscription");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%session_id, %topic, "Pruning closed session");
                    false
                }
            }
        });
        let empty = subscribers.is_empty();
        drop(subscribers);
        if empty {
            self.topics.remove_if(topic, |_, s| s.is_empty());
        }
        delivered
    }

    fn prune_empty(&self) {
        self.topics.retain(|_, subscribers| !subscribers.is_empty());
    }
}

impl EventPublisher for Broadcaster {
    fn publish(&self, topic: &str, event: &CommentEvent) -> usize {
        match serde_json::to_string(event) {
            Ok(body) => self.publish_json(topic, &body),
            Err(e) => {
                error!(%topic, error = %e, "Failed to serialize comment event");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::channel;

    use super::*;

    const TOPIC: &str = "/topic/projects/1/tasks/2/comments";

    #[test]
    fn delivers_to_each_subscribed_session_once() {
        let broadcaster = Broadcaster::new();
        let (tx_a, mut rx_a) = channel(8);
        let (tx_b, mut rx_b) = channel(8);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(broadcaster.subscribe(TOPIC, a, "sub-a", tx_a.clone()));
        assert!(!broadcaster.subscribe(TOPIC, a, "sub-a2", tx_a));
        assert!(broadcaster.subscribe(TOPIC, b, "sub-b", tx_b));
        assert_eq!(broadcaster.subscriber_count(TOPIC), 2);

        let event = CommentEvent::deleted(9);
        assert_eq!(broadcaster.publish(TOPIC, &event), 2);

        let frame = rx_a.try_recv().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header("subscription"), Some("sub-a"));
        assert_eq!(frame.destination(), Some(TOPIC));
        assert_eq!(
            frame.body,
            r#"{"eventType":"comment_deleted","payload":{"id":9}}"#
        );
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().header("subscription"), Some("sub-b"));
    }

    #[test]
    fn other_topics_are_untouched() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = channel(8);
        broadcaster.subscribe("/topic/projects/1/tasks/3/comments", Uuid::new_v4(), "s", tx);
        assert_eq!(broadcaster.publish(TOPIC, &CommentEvent::deleted(1)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_sessions_are_pruned() {
        let broadcaster = Broadcaster::new();
        let (tx, rx) = channel(8);
        broadcaster.subscribe(TOPIC, Uuid::new_v4(), "s", tx);
        drop(rx);
        assert_eq!(broadcaster.publish(TOPIC, &CommentEvent::deleted(1)), 0);
        assert_eq!(broadcaster.subscriber_count(TOPIC), 0);
    }

    #[test]
    fn stalled_sessions_are_dropped() {
        let broadcaster = Broadcaster::new();
        let (slow_tx, mut slow_rx) = channel(1);
        let (fast_tx, mut fast_rx) = channel(8);
        broadcaster.subscribe(TOPIC, Uuid::new_v4(), "slow", slow_tx);
        broadcaster.subscribe(TOPIC, Uuid::new_v4(), "fast", fast_tx);

        assert_eq!(broadcaster.publish(TOPIC, &CommentEvent::deleted(1)), 2);
        assert_eq!(broadcaster.publish(TOPIC, &CommentEvent::deleted(2)), 1);
        assert_eq!(broadcaster.subscriber_count(TOPIC), 1);

        assert!(slow_rx.try_recv().is_ok());
        assert!(slow_rx.try_recv().is_err());
        assert!(fast_rx.try_recv().is_ok());
        assert!(fast_rx.try_recv().is_ok());
    }

    #[test]
    fn unsubscribe_needs_the_matching_id() {
        let broadcaster = Broadcaster::new();
        let (tx, _rx) = channel(8);
        let session = Uuid::new_v4();
        broadcaster.subscribe(TOPIC, session, "sub-0", tx.clone());
        broadcaster.subscribe("/topic/other", session, "sub-1", tx);

        assert!(!broadcaster.unsubscribe(session, "nope"));
        assert!(broadcaster.unsubscribe(session, "sub-0"));
        assert_eq!(broadcaster.subscriber_count(TOPIC), 0);
        assert_eq!(broadcaster.subscriber_count("/topic/other"), 1);

        broadcaster.remove_session(session);
        assert_eq!(broadcaster.subscriber_count("/topic/other"), 0);
    }
}
