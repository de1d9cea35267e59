//! Domain errors raised by the services in this crate.

use thiserror::Error;

use crate::store::StoreError;

/// Errors from project, task and comment operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("User {user_id} is not a member of project {project_id}")]
    NotProjectMember { project_id: i64, user_id: i64 },

    #[error("Comment {comment_id} is already at the maximum nesting depth of {max_depth}")]
    NestingLimitExceeded { comment_id: i64, max_depth: usize },

    #[error("User {user_id} cannot manage their own membership of project {project_id}")]
    CannotManageOwnMembership { project_id: i64, user_id: i64 },

    #[error("The owner role cannot be assigned to user {user_id} in project {project_id}")]
    OwnerRoleNotAssignable { project_id: i64, user_id: i64 },

    #[error("User {user_id} is already a member of project {project_id}")]
    AlreadyMember { project_id: i64, user_id: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Stable machine-readable code for rule violations.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthenticated => "unauthenticated",
            Self::NotProjectMember { .. } => "not_project_member",
            Self::NestingLimitExceeded { .. } => "nesting_limit_exceeded",
            Self::CannotManageOwnMembership { .. } => "cannot_manage_own_membership",
            Self::OwnerRoleNotAssignable { .. } => "owner_role_not_assignable",
            Self::AlreadyMember { .. } => "already_member",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "internal",
        }
    }
}

/// Resolve the acting user id of an identity, or fail as unauthenticated.
pub(crate) fn actor_id(identity: &crate::auth::Identity) -> Result<i64, DomainError> {
    identity.user_id().ok_or(DomainError::Unauthenticated)
}
