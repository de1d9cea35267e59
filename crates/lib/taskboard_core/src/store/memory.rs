//! In-process store used when no database is configured, and by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CommentStore, ProjectStore, StoreError, TaskStore, UserStore};
use crate::models::{
    NewComment, NewTask, NewUser, Project, ProjectMember, ProjectRole, Task, TaskComment, User,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    projects: BTreeMap<i64, Project>,
    members: BTreeMap<(i64, i64), ProjectMember>,
    tasks: BTreeMap<i64, Task>,
    comments: BTreeMap<i64, TaskComment>,
}

impl Tables {
    /// Ids are shared across tables and strictly increasing.
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove_task_cascade(&mut self, task_id: i64) -> bool {
        let removed = self.tasks.remove(&task_id).is_some();
        self.comments.retain(|_, c| c.task_id != task_id);
        removed
    }
}

/// Tables behind a single async lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict("username or email already registered".into()));
        }
        let id = tables.allocate_id();
        let record = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            enabled: user.enabled,
            roles: user.roles,
            created_at: Utc::now(),
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_user_enabled(&self, id: i64, enabled: bool) -> Result<(), StoreError> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.enabled = enabled;
        }
        Ok(())
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<Project, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        let now = Utc::now();
        let project = Project {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(id, project.clone());
        tables.members.insert(
            (id, owner_id),
            ProjectMember {
                project_id: id,
                user_id: owner_id,
                role: ProjectRole::Owner,
                joined_at: now,
            },
        );
        Ok(project)
    }

    async fn find_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn update_project(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Project>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.projects.get_mut(&id).map(|project| {
            project.name = name.to_string();
            project.description = description.map(str::to_string);
            project.updated_at = Utc::now();
            project.clone()
        }))
    }

    async fn delete_project(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.projects.remove(&id).is_none() {
            return Ok(false);
        }
        tables.members.retain(|(project_id, _), _| *project_id != id);
        let task_ids: Vec<i64> = tables
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            tables.remove_task_cascade(task_id);
        }
        Ok(true)
    }

    async fn is_owner(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .get(&project_id)
            .is_some_and(|p| p.owner_id == user_id))
    }

    async fn is_member(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .contains_key(&(project_id, user_id)))
    }

    async fn find_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectMember>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .get(&(project_id, user_id))
            .cloned())
    }

    async fn list_members(&self, project_id: i64) -> Result<Vec<ProjectMember>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .range((project_id, i64::MIN)..=(project_id, i64::MAX))
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn add_member(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.members.contains_key(&(project_id, user_id)) {
            return Err(StoreError::Conflict(format!(
                "user {user_id} is already a member of project {project_id}"
            )));
        }
        let member = ProjectMember {
            project_id,
            user_id,
            role,
            joined_at: Utc::now(),
        };
        tables.members.insert((project_id, user_id), member.clone());
        Ok(member)
    }

    async fn update_member_role(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<Option<ProjectMember>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.members.get_mut(&(project_id, user_id)).map(|m| {
            m.role = role;
            m.clone()
        }))
    }

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .write()
            .await
            .members
            .remove(&(project_id, user_id))
            .is_some())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        let now = Utc::now();
        let record = Task {
            id,
            project_id: task.project_id,
            owner_id: task.owner_id,
            title: task.title,
            description: task.description,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(id, record.clone());
        Ok(record)
    }

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn update_task(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Option<Task>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.tasks.get_mut(&id).map(|task| {
            task.title = title.to_string();
            task.description = description.map(str::to_string);
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.remove_task_cascade(id))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create_comment(&self, comment: NewComment) -> Result<TaskComment, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        let now = Utc::now();
        let record = TaskComment {
            id,
            task_id: comment.task_id,
            author_id: comment.author_id,
            content: comment.content,
            parent_id: comment.parent_id,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(id, record.clone());
        Ok(record)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<TaskComment>, StoreError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn find_root_comments(
        &self,
        task_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TaskComment>, i64), StoreError> {
        let tables = self.tables.read().await;
        let roots: Vec<&TaskComment> = tables
            .comments
            .values()
            .rev()
            .filter(|c| c.task_id == task_id && c.is_root())
            .collect();
        let total = roots.len() as i64;
        let page = roots
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_replies(&self, parent_ids: &[i64]) -> Result<Vec<TaskComment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .cloned()
            .collect())
    }

    async fn update_comment_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<TaskComment>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.get_mut(&id).map(|comment| {
            comment.content = content.to_string();
            comment.updated_at = Utc::now();
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_comment(task_id: i64, parent_id: Option<i64>) -> NewComment {
        NewComment {
            task_id,
            author_id: 1,
            content: "c".into(),
            parent_id,
        }
    }

    #[tokio::test]
    async fn project_creation_enrols_owner() {
        let store = MemoryStore::new();
        let project = store.create_project("p", None, 5).await.unwrap();
        assert!(store.is_owner(project.id, 5).await.unwrap());
        let member = store.find_member(project.id, 5).await.unwrap().unwrap();
        assert_eq!(member.role, ProjectRole::Owner);
    }

    #[tokio::test]
    async fn duplicate_member_is_a_conflict() {
        let store = MemoryStore::new();
        let project = store.create_project("p", None, 5).await.unwrap();
        store
            .add_member(project.id, 6, ProjectRole::Member)
            .await
            .unwrap();
        assert!(matches!(
            store.add_member(project.id, 6, ProjectRole::Viewer).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn roots_are_paged_newest_first() {
        let store = MemoryStore::new();
        let a = store.create_comment(new_comment(1, None)).await.unwrap();
        let b = store.create_comment(new_comment(1, None)).await.unwrap();
        store.create_comment(new_comment(1, Some(a.id))).await.unwrap();
        store.create_comment(new_comment(2, None)).await.unwrap();

        let (page, total) = store.find_root_comments(1, 1, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page, vec![b]);

        let (page, _) = store.find_root_comments(1, 1, 1).await.unwrap();
        assert_eq!(page, vec![a]);
    }

    #[tokio::test]
    async fn deleting_a_comment_leaves_replies_in_place() {
        let store = MemoryStore::new();
        let root = store.create_comment(new_comment(1, None)).await.unwrap();
        let reply = store
            .create_comment(new_comment(1, Some(root.id)))
            .await
            .unwrap();

        assert!(store.delete_comment(root.id).await.unwrap());
        let orphan = store.find_comment(reply.id).await.unwrap().unwrap();
        assert_eq!(orphan.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn deleting_a_project_cascades() {
        let store = MemoryStore::new();
        let project = store.create_project("p", None, 1).await.unwrap();
        let task = store
            .create_task(NewTask {
                project_id: project.id,
                owner_id: 1,
                title: "t".into(),
                description: None,
            })
            .await
            .unwrap();
        let comment = store
            .create_comment(new_comment(task.id, None))
            .await
            .unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.find_task(task.id).await.unwrap().is_none());
        assert!(store.find_comment(comment.id).await.unwrap().is_none());
        assert!(!store.is_member(project.id, 1).await.unwrap());
    }
}
