//! Comment Tree Manager.
//!
//! Sole writer of task comments. Enforces the nesting limit, assembles
//! root/reply pages and publishes a [`CommentEvent`] after every successful
//! mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::Identity;
use crate::error::{DomainError, actor_id};
use crate::events::{CommentEvent, EventPublisher, comment_topic};
use crate::models::{CommentThread, NewComment, Page, PageRequest, Task, TaskComment};
use crate::permissions::PermissionEvaluator;
use crate::store::Store;

/// Default limit on the ancestor walk. A comment may have at most
/// `MAX_NESTING_DEPTH - 1` ancestors.
pub const MAX_NESTING_DEPTH: usize = 3;

/// Longest accepted comment body, in characters.
pub const MAX_CONTENT_LEN: usize = 10_000;

#[derive(Clone)]
pub struct CommentTreeManager {
    store: Arc<dyn Store>,
    permissions: PermissionEvaluator,
    publisher: Arc<dyn EventPublisher>,
    max_depth: usize,
}

impl CommentTreeManager {
    pub fn new(
        store: Arc<dyn Store>,
        permissions: PermissionEvaluator,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            permissions,
            publisher,
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Override the nesting limit. Values below 1 are raised to 1.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// One page of root comments, newest first, each with its direct
    /// replies oldest first. Deeper replies are not expanded.
    pub async fn list_roots(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
        request: PageRequest,
    ) -> Result<Page<CommentThread>, DomainError> {
        self.load_task(project_id, task_id).await?;
        if !self.permissions.can_read_comments(identity, project_id).await {
            return Err(DomainError::Forbidden("cannot read comments".into()));
        }

        let (roots, total) = self
            .store
            .find_root_comments(task_id, request.limit(), request.offset())
            .await?;
        let root_ids: Vec<i64> = roots.iter().map(|c| c.id).collect();
        let mut replies_by_parent: HashMap<i64, Vec<TaskComment>> = HashMap::new();
        for reply in self.store.find_replies(&root_ids).await? {
            if let Some(parent_id) = reply.parent_id {
                replies_by_parent.entry(parent_id).or_default().push(reply);
            }
        }

        let threads = roots
            .into_iter()
            .map(|comment| CommentThread {
                replies: replies_by_parent.remove(&comment.id).unwrap_or_default(),
                comment,
            })
            .collect();
        Ok(Page::new(threads, request, total))
    }

    /// Direct replies of one comment, oldest first.
    pub async fn list_replies(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
        comment_id: i64,
    ) -> Result<Vec<TaskComment>, DomainError> {
        self.load_task(project_id, task_id).await?;
        if !self.permissions.can_read_comments(identity, project_id).await {
            return Err(DomainError::Forbidden("cannot read comments".into()));
        }
        self.load_comment(task_id, comment_id).await?;
        Ok(self.store.find_replies(&[comment_id]).await?)
    }

    pub async fn create(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
        content: &str,
        parent_id: Option<i64>,
    ) -> Result<TaskComment, DomainError> {
        let author_id = actor_id(identity)?;
        self.load_task(project_id, task_id).await?;
        if !self.permissions.can_create_comment(identity, project_id).await {
            return Err(DomainError::NotProjectMember {
                project_id,
                user_id: author_id,
            });
        }
        let content = validate_content(content)?;

        if let Some(parent_id) = parent_id {
            let parent = self.load_comment(task_id, parent_id).await?;
            self.check_depth(parent).await?;
        }

        let comment = self
            .store
            .create_comment(NewComment {
                task_id,
                author_id,
                content,
                parent_id,
            })
            .await?;
        info!(
            comment_id = comment.id,
            task_id,
            author_id,
            parent_id = ?comment.parent_id,
            "Comment created"
        );
        self.emit(project_id, task_id, CommentEvent::created(comment.clone()));
        Ok(comment)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
        comment_id: i64,
        content: &str,
    ) -> Result<TaskComment, DomainError> {
        self.load_task(project_id, task_id).await?;
        self.load_comment(task_id, comment_id).await?;
        if !self.permissions.can_update_comment(identity, comment_id).await {
            return Err(DomainError::Forbidden(
                "only the author can edit a comment".into(),
            ));
        }
        let content = validate_content(content)?;

        let comment = self
            .store
            .update_comment_content(comment_id, &content)
            .await?
            .ok_or(DomainError::not_found("Comment", comment_id))?;
        debug!(comment_id, task_id, "Comment updated");
        self.emit(project_id, task_id, CommentEvent::updated(comment.clone()));
        Ok(comment)
    }

    /// Delete one comment. Its replies stay in storage with a dangling
    /// `parent_id`.
    pub async fn delete(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
        comment_id: i64,
    ) -> Result<(), DomainError> {
        self.load_task(project_id, task_id).await?;
        self.load_comment(task_id, comment_id).await?;
        if !self.permissions.can_delete_comment(identity, comment_id).await {
            return Err(DomainError::Forbidden(
                "only the author or the project owner can delete a comment".into(),
            ));
        }
        if !self.store.delete_comment(comment_id).await? {
            return Err(DomainError::not_found("Comment", comment_id));
        }
        info!(comment_id, task_id, "Comment deleted");
        self.emit(project_id, task_id, CommentEvent::deleted(comment_id));
        Ok(())
    }

    /// Walk the ancestors of `parent`, counting from 1 at `parent` itself.
    ///
    /// Rejects at the first comment where the running depth reaches the
    /// limit. A root or a dangling parent reference ends the walk.
    async fn check_depth(&self, parent: TaskComment) -> Result<(), DomainError> {
        let mut current = parent;
        let mut depth = 1;
        loop {
            if depth >= self.max_depth {
                debug!(
                    comment_id = current.id,
                    max_depth = self.max_depth,
                    "Nesting limit reached"
                );
                return Err(DomainError::NestingLimitExceeded {
                    comment_id: current.id,
                    max_depth: self.max_depth,
                });
            }
            let Some(next_id) = current.parent_id else {
                return Ok(());
            };
            let Some(next) = self.store.find_comment(next_id).await? else {
                return Ok(());
            };
            current = next;
            depth += 1;
        }
    }

    async fn load_task(&self, project_id: i64, task_id: i64) -> Result<Task, DomainError> {
        self.store
            .find_task(task_id)
            .await?
            .filter(|task| task.project_id == project_id)
            .ok_or(DomainError::not_found("Task", task_id))
    }

    async fn load_comment(&self, task_id: i64, comment_id: i64) -> Result<TaskComment, DomainError> {
        self.store
            .find_comment(comment_id)
            .await?
            .filter(|comment| comment.task_id == task_id)
            .ok_or(DomainError::not_found("Comment", comment_id))
    }

    fn emit(&self, project_id: i64, task_id: i64, event: CommentEvent) {
        let topic = comment_topic(project_id, task_id);
        let delivered = self.publisher.publish(&topic, &event);
        debug!(%topic, event_type = ?event.event_type, delivered, "Comment event published");
    }
}

fn validate_content(content: &str) -> Result<String, DomainError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation("content must not be blank".into()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(DomainError::Validation(format!(
            "content must be at most {MAX_CONTENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}
