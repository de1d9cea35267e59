//! Domain models.
//!
//! Immutable value records that reference related entities by id only.
//! API-facing request/response shapes live in `taskboard_api::models`.

pub mod auth;
pub mod comment;
pub mod page;
pub mod project;

pub use auth::{DEFAULT_USER_ROLE, NewUser, User, UserSummary};
pub use comment::{CommentThread, NewComment, TaskComment};
pub use page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest};
pub use project::{NewTask, Project, ProjectMember, ProjectRole, Task};
