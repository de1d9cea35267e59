//! Task operations. Tasks exist here to host comment threads.

use std::sync::Arc;

use tracing::info;

use crate::auth::Identity;
use crate::error::{DomainError, actor_id};
use crate::models::{NewTask, Task};
use crate::permissions::PermissionEvaluator;
use crate::store::Store;

pub const MAX_TASK_TITLE_LEN: usize = 200;

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
    permissions: PermissionEvaluator,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, permissions: PermissionEvaluator) -> Self {
        Self { store, permissions }
    }

    pub async fn create(
        &self,
        identity: &Identity,
        project_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task, DomainError> {
        let owner_id = actor_id(identity)?;
        if self.store.find_project(project_id).await?.is_none() {
            return Err(DomainError::not_found("Project", project_id));
        }
        if !self.permissions.can_create_task(identity, project_id).await {
            return Err(DomainError::NotProjectMember {
                project_id,
                user_id: owner_id,
            });
        }
        let title = validate_title(title)?;
        let task = self
            .store
            .create_task(NewTask {
                project_id,
                owner_id,
                title: title.to_string(),
                description: description.map(str::to_string),
            })
            .await?;
        info!(task_id = task.id, project_id, owner_id, "Task created");
        Ok(task)
    }

    pub async fn get(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
    ) -> Result<Task, DomainError> {
        let task = self.load(project_id, task_id).await?;
        if !self.permissions.can_read_task(identity, project_id).await {
            return Err(DomainError::Forbidden("not a project member".into()));
        }
        Ok(task)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task, DomainError> {
        self.load(project_id, task_id).await?;
        if !self.permissions.can_update_task(identity, task_id).await {
            return Err(DomainError::Forbidden(
                "only the task owner or project owner can update a task".into(),
            ));
        }
        let title = validate_title(title)?;
        self.store
            .update_task(task_id, title, description)
            .await?
            .ok_or(DomainError::not_found("Task", task_id))
    }

    pub async fn delete(
        &self,
        identity: &Identity,
        project_id: i64,
        task_id: i64,
    ) -> Result<(), DomainError> {
        self.load(project_id, task_id).await?;
        if !self.permissions.can_delete_task(identity, task_id).await {
            return Err(DomainError::Forbidden(
                "only the task owner or project owner can delete a task".into(),
            ));
        }
        self.store.delete_task(task_id).await?;
        info!(task_id, project_id, "Task deleted");
        Ok(())
    }

    async fn load(&self, project_id: i64, task_id: i64) -> Result<Task, DomainError> {
        self.store
            .find_task(task_id)
            .await?
            .filter(|task| task.project_id == project_id)
            .ok_or(DomainError::not_found("Task", task_id))
    }
}

fn validate_title(title: &str) -> Result<&str, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::Validation("title must not be blank".into()));
    }
    if title.chars().count() > MAX_TASK_TITLE_LEN {
        return Err(DomainError::Validation(format!(
            "title must be at most {MAX_TASK_TITLE_LEN} characters"
        )));
    }
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectRole;
    use crate::store::{MemoryStore, ProjectStore};

    #[tokio::test]
    async fn task_owner_and_project_owner_may_modify() {
        let store = Arc::new(MemoryStore::new());
        let project = store.create_project("p", None, 1).await.unwrap();
        store
            .add_member(project.id, 2, ProjectRole::Member)
            .await
            .unwrap();
        store
            .add_member(project.id, 3, ProjectRole::Member)
            .await
            .unwrap();
        let service = TaskService::new(store.clone(), PermissionEvaluator::new(store));
        let owner = Identity::for_user(1, ["USER"]);
        let author = Identity::for_user(2, ["USER"]);
        let other = Identity::for_user(3, ["USER"]);

        let task = service
            .create(&author, project.id, "Write docs", None)
            .await
            .unwrap();
        assert_eq!(task.owner_id, 2);

        let err = service
            .update(&other, project.id, task.id, "Hijack", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        let renamed = service
            .update(&author, project.id, task.id, "Write more docs", Some("soon"))
            .await
            .unwrap();
        assert_eq!(renamed.title, "Write more docs");

        service.delete(&owner, project.id, task.id).await.unwrap();
        let gone = service.get(&owner, project.id, task.id).await.unwrap_err();
        assert!(matches!(gone, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn outsiders_cannot_create_or_read() {
        let store = Arc::new(MemoryStore::new());
        let project = store.create_project("p", None, 1).await.unwrap();
        let service = TaskService::new(store.clone(), PermissionEvaluator::new(store));
        let owner = Identity::for_user(1, ["USER"]);
        let outsider = Identity::for_user(9, ["USER"]);

        let err = service
            .create(&outsider, project.id, "t", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotProjectMember { user_id: 9, .. }));

        let task = service.create(&owner, project.id, "t", None).await.unwrap();
        let err = service.get(&outsider, project.id, task.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
