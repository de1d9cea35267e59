//! Storage seams.
//!
//! The domain services read and write through these traits. [`PgStore`]
//! backs them with PostgreSQL; [`MemoryStore`] keeps everything in process
//! for development and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    NewComment, NewTask, NewUser, Project, ProjectMember, ProjectRole, Task, TaskComment, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Look a user up by username or e-mail.
    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn set_user_enabled(&self, id: i64, enabled: bool) -> Result<(), StoreError>;

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create a project and enrol its owner with [`ProjectRole::Owner`].
    async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<Project, StoreError>;

    async fn find_project(&self, id: i64) -> Result<Option<Project>, StoreError>;

    async fn update_project(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Project>, StoreError>;

    /// Delete a project with its memberships, tasks and comments.
    async fn delete_project(&self, id: i64) -> Result<bool, StoreError>;

    async fn is_owner(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError>;

    /// Role-agnostic membership test.
    async fn is_member(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError>;

    async fn find_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectMember>, StoreError>;

    async fn list_members(&self, project_id: i64) -> Result<Vec<ProjectMember>, StoreError>;

    async fn add_member(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, StoreError>;

    async fn update_member_role(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<Option<ProjectMember>, StoreError>;

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError>;

    async fn update_task(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Option<Task>, StoreError>;

    /// Delete a task and its comments.
    async fn delete_task(&self, id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn create_comment(&self, comment: NewComment) -> Result<TaskComment, StoreError>;

    async fn find_comment(&self, id: i64) -> Result<Option<TaskComment>, StoreError>;

    /// One page of a task's root comments, newest first, plus the root count.
    async fn find_root_comments(
        &self,
        task_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TaskComment>, i64), StoreError>;

    /// All comments whose parent is in `parent_ids`, oldest first.
    async fn find_replies(&self, parent_ids: &[i64]) -> Result<Vec<TaskComment>, StoreError>;

    async fn update_comment_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<TaskComment>, StoreError>;

    /// Delete a single comment; replies keep their `parent_id`.
    async fn delete_comment(&self, id: i64) -> Result<bool, StoreError>;
}

/// Everything the services need from storage.
pub trait Store: UserStore + ProjectStore + TaskStore + CommentStore {}

impl<T> Store for T where T: UserStore + ProjectStore + TaskStore + CommentStore {}
