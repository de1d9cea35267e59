//! Comment change events and the publishing seam.
//!
//! The comment manager publishes through [`EventPublisher`]; the realtime
//! crate supplies the implementation that fans events out to subscribed
//! sessions.

use serde::Serialize;

use crate::models::TaskComment;

/// Prefix of every broker destination.
pub const TOPIC_PREFIX: &str = "/topic";

/// Destination carrying comment events for one task.
pub fn comment_topic(project_id: i64, task_id: i64) -> String {
    format!("{TOPIC_PREFIX}/projects/{project_id}/tasks/{task_id}/comments")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentEventType {
    CommentCreated,
    CommentUpdated,
    CommentDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommentEventPayload {
    Comment(TaskComment),
    Deleted { id: i64 },
}

/// Envelope delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEvent {
    pub event_type: CommentEventType,
    pub payload: CommentEventPayload,
}

impl CommentEvent {
    pub fn created(comment: TaskComment) -> Self {
        Self {
            event_type: CommentEventType::CommentCreated,
            payload: CommentEventPayload::Comment(comment),
        }
    }

    pub fn updated(comment: TaskComment) -> Self {
        Self {
            event_type: CommentEventType::CommentUpdated,
            payload: CommentEventPayload::Comment(comment),
        }
    }

    pub fn deleted(comment_id: i64) -> Self {
        Self {
            event_type: CommentEventType::CommentDeleted,
            payload: CommentEventPayload::Deleted { id: comment_id },
        }
    }
}

/// Fire-and-forget delivery of events to a topic.
///
/// Returns the number of subscribers the event was handed to. Delivery is
/// best effort and never fails the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, event: &CommentEvent) -> usize;
}

/// Publisher for contexts without realtime delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _topic: &str, _event: &CommentEvent) -> usize {
        0
    }
}
