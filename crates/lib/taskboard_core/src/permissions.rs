//! Permission Evaluator.
//!
//! One rule set answers "may this identity do X to resource Y" for both the
//! REST handlers and the messaging subscription matcher. The rules are pure
//! functions over [`ProjectFacts`]; [`PermissionEvaluator`] gathers the facts
//! from storage and never fails: a storage error is logged and denies.

use std::sync::Arc;

use tracing::{error, trace};

use crate::auth::Identity;
use crate::store::{Store, StoreError};

/// What storage knows about one user's relation to one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectFacts {
    pub is_owner: bool,
    pub is_member: bool,
}

impl ProjectFacts {
    pub fn can_read(&self) -> bool {
        self.is_owner || self.is_member
    }

    /// Project settings and membership are owner-only.
    pub fn can_manage(&self) -> bool {
        self.is_owner
    }

    /// Membership is role-agnostic: viewers may contribute too.
    pub fn can_contribute(&self) -> bool {
        self.is_owner || self.is_member
    }
}

/// Task update/delete: the task's owner or the project's owner.
pub fn can_modify_task(facts: ProjectFacts, is_task_owner: bool) -> bool {
    is_task_owner || facts.is_owner
}

/// Comment edits belong to the author alone.
pub fn can_update_comment(is_author: bool) -> bool {
    is_author
}

pub fn can_delete_comment(facts: ProjectFacts, is_author: bool) -> bool {
    is_author || facts.is_owner
}

/// Storage-backed evaluator.
#[derive(Clone)]
pub struct PermissionEvaluator {
    store: Arc<dyn Store>,
}

impl PermissionEvaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetch the owner/member facts for a user and project.
    pub async fn project_facts(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<ProjectFacts, StoreError> {
        let is_owner = self.store.is_owner(project_id, user_id).await?;
        let is_member = is_owner || self.store.is_member(project_id, user_id).await?;
        Ok(ProjectFacts {
            is_owner,
            is_member,
        })
    }

    async fn check_project<F>(
        &self,
        check: &'static str,
        identity: &Identity,
        project_id: i64,
        rule: F,
    ) -> bool
    where
        F: FnOnce(ProjectFacts) -> bool,
    {
        let Some(user_id) = identity.user_id() else {
            return false;
        };
        let allowed = fail_closed(check, self.project_facts(user_id, project_id).await.map(rule));
        trace!(check, user_id, project_id, allowed, "Permission evaluated");
        allowed
    }

    pub async fn can_read_project(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_read_project", identity, project_id, |f| f.can_read())
            .await
    }

    pub async fn can_update_project(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_update_project", identity, project_id, |f| {
            f.can_manage()
        })
        .await
    }

    pub async fn can_delete_project(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_delete_project", identity, project_id, |f| {
            f.can_manage()
        })
        .await
    }

    pub async fn can_add_member(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_add_member", identity, project_id, |f| f.can_manage())
            .await
    }

    pub async fn can_update_member_role(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_update_member_role", identity, project_id, |f| {
            f.can_manage()
        })
        .await
    }

    pub async fn can_remove_member(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_remove_member", identity, project_id, |f| {
            f.can_manage()
        })
        .await
    }

    pub async fn can_read_task(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_read_task", identity, project_id, |f| f.can_read())
            .await
    }

    pub async fn can_create_task(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_create_task", identity, project_id, |f| {
            f.can_contribute()
        })
        .await
    }

    pub async fn can_update_task(&self, identity: &Identity, task_id: i64) -> bool {
        self.check_task("can_update_task", identity, task_id).await
    }

    pub async fn can_delete_task(&self, identity: &Identity, task_id: i64) -> bool {
        self.check_task("can_delete_task", identity, task_id).await
    }

    async fn check_task(&self, check: &'static str, identity: &Identity, task_id: i64) -> bool {
        let Some(user_id) = identity.user_id() else {
            return false;
        };
        fail_closed(check, self.task_modifiable(user_id, task_id).await)
    }

    async fn task_modifiable(&self, user_id: i64, task_id: i64) -> Result<bool, StoreError> {
        let Some(task) = self.store.find_task(task_id).await? else {
            return Ok(false);
        };
        let facts = self.project_facts(user_id, task.project_id).await?;
        Ok(can_modify_task(facts, task.owner_id == user_id))
    }

    pub async fn can_read_comments(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_read_comments", identity, project_id, |f| f.can_read())
            .await
    }

    pub async fn can_create_comment(&self, identity: &Identity, project_id: i64) -> bool {
        self.check_project("can_create_comment", identity, project_id, |f| {
            f.can_contribute()
        })
        .await
    }

    pub async fn can_update_comment(&self, identity: &Identity, comment_id: i64) -> bool {
        let Some(user_id) = identity.user_id() else {
            return false;
        };
        let result = self
            .store
            .find_comment(comment_id)
            .await
            .map(|c| c.is_some_and(|c| can_update_comment(c.author_id == user_id)));
        fail_closed("can_update_comment", result)
    }

    pub async fn can_delete_comment(&self, identity: &Identity, comment_id: i64) -> bool {
        let Some(user_id) = identity.user_id() else {
            return false;
        };
        fail_closed(
            "can_delete_comment",
            self.comment_deletable(user_id, comment_id).await,
        )
    }

    async fn comment_deletable(&self, user_id: i64, comment_id: i64) -> Result<bool, StoreError> {
        let Some(comment) = self.store.find_comment(comment_id).await? else {
            return Ok(false);
        };
        let is_author = comment.author_id == user_id;
        if is_author {
            return Ok(true);
        }
        let Some(task) = self.store.find_task(comment.task_id).await? else {
            return Ok(false);
        };
        let facts = self.project_facts(user_id, task.project_id).await?;
        Ok(can_delete_comment(facts, is_author))
    }
}

fn fail_closed(check: &'static str, result: Result<bool, StoreError>) -> bool {
    match result {
        Ok(allowed) => allowed,
        Err(e) => {
            error!(check, error = %e, "Permission lookup failed, denying");
            false
        }
    }
}
