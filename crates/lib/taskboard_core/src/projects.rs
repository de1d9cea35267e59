//! Project and membership operations.

use std::sync::Arc;

use tracing::info;

use crate::auth::Identity;
use crate::error::{DomainError, actor_id};
use crate::models::{Project, ProjectMember, ProjectRole};
use crate::permissions::PermissionEvaluator;
use crate::store::{Store, StoreError};

pub const MAX_PROJECT_NAME_LEN: usize = 200;

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn Store>,
    permissions: PermissionEvaluator,
}

impl ProjectService {
    pub fn new(store: Arc<dyn Store>, permissions: PermissionEvaluator) -> Self {
        Self { store, permissions }
    }

    /// Create a project owned by the caller.
    pub async fn create(
        &self,
        identity: &Identity,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, DomainError> {
        let owner_id = actor_id(identity)?;
        let name = validate_name(name)?;
        let project = self
            .store
            .create_project(name, description, owner_id)
            .await?;
        info!(project_id = project.id, owner_id, "Project created");
        Ok(project)
    }

    pub async fn get(&self, identity: &Identity, project_id: i64) -> Result<Project, DomainError> {
        let project = self.load(project_id).await?;
        if !self.permissions.can_read_project(identity, project_id).await {
            return Err(DomainError::Forbidden("not a project member".into()));
        }
        Ok(project)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        project_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, DomainError> {
        self.load(project_id).await?;
        if !self.permissions.can_update_project(identity, project_id).await {
            return Err(DomainError::Forbidden("only the owner can update a project".into()));
        }
        let name = validate_name(name)?;
        self.store
            .update_project(project_id, name, description)
            .await?
            .ok_or(DomainError::not_found("Project", project_id))
    }

    /// Delete a project with everything under it.
    pub async fn delete(&self, identity: &Identity, project_id: i64) -> Result<(), DomainError> {
        self.load(project_id).await?;
        if !self.permissions.can_delete_project(identity, project_id).await {
            return Err(DomainError::Forbidden("only the owner can delete a project".into()));
        }
        self.store.delete_project(project_id).await?;
        info!(project_id, "Project deleted");
        Ok(())
    }

    pub async fn list_members(
        &self,
        identity: &Identity,
        project_id: i64,
    ) -> Result<Vec<ProjectMember>, DomainError> {
        self.load(project_id).await?;
        if !self.permissions.can_read_project(identity, project_id).await {
            return Err(DomainError::Forbidden("not a project member".into()));
        }
        Ok(self.store.list_members(project_id).await?)
    }

    pub async fn add_member(
        &self,
        identity: &Identity,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, DomainError> {
        self.load(project_id).await?;
        if !self.permissions.can_add_member(identity, project_id).await {
            return Err(DomainError::Forbidden("only the owner can add members".into()));
        }
        self.check_target(identity, project_id, user_id, Some(role))?;
        if self.store.find_user(user_id).await?.is_none() {
            return Err(DomainError::not_found("User", user_id));
        }

        let member = self
            .store
            .add_member(project_id, user_id, role)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => DomainError::AlreadyMember {
                    project_id,
                    user_id,
                },
                other => other.into(),
            })?;
        info!(project_id, user_id, %role, "Member added");
        Ok(member)
    }

    pub async fn update_member_role(
        &self,
        identity: &Identity,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, DomainError> {
        self.load(project_id).await?;
        if !self.permissions.can_update_member_role(identity, project_id).await {
            return Err(DomainError::Forbidden("only the owner can change roles".into()));
        }
        self.check_target(identity, project_id, user_id, Some(role))?;
        let member = self
            .store
            .update_member_role(project_id, user_id, role)
            .await?
            .ok_or(DomainError::not_found("Member", user_id))?;
        info!(project_id, user_id, %role, "Member role updated");
        Ok(member)
    }

    pub async fn remove_member(
        &self,
        identity: &Identity,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), DomainError> {
        self.load(project_id).await?;
        if !self.permissions.can_remove_member(identity, project_id).await {
            return Err(DomainError::Forbidden("only the owner can remove members".into()));
        }
        self.check_target(identity, project_id, user_id, None)?;
        if !self.store.remove_member(project_id, user_id).await? {
            return Err(DomainError::not_found("Member", user_id));
        }
        info!(project_id, user_id, "Member removed");
        Ok(())
    }

    /// The owner's own membership is fixed, and nobody else can become owner.
    fn check_target(
        &self,
        identity: &Identity,
        project_id: i64,
        user_id: i64,
        role: Option<ProjectRole>,
    ) -> Result<(), DomainError> {
        if identity.user_id() == Some(user_id) {
            return Err(DomainError::CannotManageOwnMembership {
                project_id,
                user_id,
            });
        }
        if role == Some(ProjectRole::Owner) {
            return Err(DomainError::OwnerRoleNotAssignable {
                project_id,
                user_id,
            });
        }
        Ok(())
    }

    async fn load(&self, project_id: i64) -> Result<Project, DomainError> {
        self.store
            .find_project(project_id)
            .await?
            .ok_or(DomainError::not_found("Project", project_id))
    }
}

fn validate_name(name: &str) -> Result<&str, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("name must not be blank".into()));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(DomainError::Validation(format!(
            "name must be at most {MAX_PROJECT_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::{MemoryStore, UserStore};

    async fn user(store: &MemoryStore, name: &str) -> Identity {
        let user = store
            .create_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                enabled: true,
                roles: vec!["USER".into()],
            })
            .await
            .unwrap();
        Identity::for_user(user.id, user.roles)
    }

    async fn setup() -> (ProjectService, Identity, Identity, Identity) {
        let store = Arc::new(MemoryStore::new());
        let owner = user(&store, "owner").await;
        let member = user(&store, "member").await;
        let outsider = user(&store, "outsider").await;
        let service = ProjectService::new(store.clone(), PermissionEvaluator::new(store));
        (service, owner, member, outsider)
    }

    #[tokio::test]
    async fn owner_manages_membership() {
        let (service, owner, member, outsider) = setup().await;
        let project = service.create(&owner, "Apollo", None).await.unwrap();
        let member_id = member.user_id().unwrap();

        service
            .add_member(&owner, project.id, member_id, ProjectRole::Viewer)
            .await
            .unwrap();
        assert!(service.get(&member, project.id).await.is_ok());
        assert!(matches!(
            service.get(&outsider, project.id).await,
            Err(DomainError::Forbidden(_))
        ));

        let dup = service
            .add_member(&owner, project.id, member_id, ProjectRole::Member)
            .await;
        assert!(matches!(dup, Err(DomainError::AlreadyMember { .. })));

        let updated = service
            .update_member_role(&owner, project.id, member_id, ProjectRole::Member)
            .await
            .unwrap();
        assert_eq!(updated.role, ProjectRole::Member);
        assert_eq!(service.list_members(&member, project.id).await.unwrap().len(), 2);

        service.remove_member(&owner, project.id, member_id).await.unwrap();
        assert!(service.get(&member, project.id).await.is_err());
    }

    #[tokio::test]
    async fn membership_guards() {
        let (service, owner, member, _) = setup().await;
        let project = service.create(&owner, "Apollo", None).await.unwrap();
        let owner_id = owner.user_id().unwrap();
        let member_id = member.user_id().unwrap();

        let own = service.remove_member(&owner, project.id, owner_id).await;
        assert!(matches!(own, Err(DomainError::CannotManageOwnMembership { .. })));

        let promote = service
            .add_member(&owner, project.id, member_id, ProjectRole::Owner)
            .await;
        assert!(matches!(promote, Err(DomainError::OwnerRoleNotAssignable { .. })));

        let by_member = service
            .add_member(&member, project.id, member_id, ProjectRole::Member)
            .await;
        assert!(matches!(by_member, Err(DomainError::Forbidden(_))));

        let ghost = service
            .add_member(&owner, project.id, 9999, ProjectRole::Member)
            .await;
        assert!(matches!(ghost, Err(DomainError::NotFound { entity: "User", .. })));
    }

    #[tokio::test]
    async fn missing_project_is_not_found_before_forbidden() {
        let (service, _, _, outsider) = setup().await;
        let err = service.get(&outsider, 4242).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Project", .. }));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (service, owner, _, _) = setup().await;
        let err = service.create(&owner, "  ", None).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
