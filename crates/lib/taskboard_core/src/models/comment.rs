//! Threaded task comments.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A comment on a task. `parent_id` is `None` for a root comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComment {
    pub id: i64,
    pub task_id: i64,
    pub author_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskComment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields required to create a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub task_id: i64,
    pub author_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
}

/// A root comment with its direct replies attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: TaskComment,
    pub replies: Vec<TaskComment>,
}
