//! PostgreSQL-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CommentStore, ProjectStore, StoreError, TaskStore, UserStore};
use crate::models::{
    NewComment, NewTask, NewUser, Project, ProjectMember, ProjectRole, Task, TaskComment, User,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, enabled, roles, created_at";
const PROJECT_COLUMNS: &str = "id, name, description, owner_id, created_at, updated_at";
const MEMBER_COLUMNS: &str = "project_id, user_id, role, joined_at";
const TASK_COLUMNS: &str = "id, project_id, owner_id, title, description, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, task_id, author_id, content, parent_id, created_at, updated_at";

/// Store over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique violations to [`StoreError::Conflict`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::DbError(e),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    enabled: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            enabled: row.enabled,
            roles: row.roles,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    description: Option<String>,
    owner_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    project_id: i64,
    user_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for ProjectMember {
    type Error = StoreError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<ProjectRole>().map_err(StoreError::InvalidData)?;
        Ok(ProjectMember {
            project_id: row.project_id,
            user_id: row.user_id,
            role,
            joined_at: row.joined_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    project_id: i64,
    owner_id: i64,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            project_id: row.project_id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    task_id: i64,
    author_id: i64,
    content: String,
    parent_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for TaskComment {
    fn from(row: CommentRow) -> Self {
        TaskComment {
            id: row.id,
            task_id: row.task_id,
            author_id: row.author_id,
            content: row.content,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, password_hash, enabled, roles) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.enabled)
        .bind(&user.roles)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(row.into())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn set_user_enabled(&self, id: i64, enabled: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET enabled = $1 WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<Project, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "INSERT INTO projects (name, description, owner_id) \
             VALUES ($1, $2, $3) RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO project_members (project_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(owner_id)
            .bind(ProjectRole::Owner.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn find_project(&self, id: i64) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_project(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "UPDATE projects SET name = $1, description = $2, updated_at = now() \
             WHERE id = $3 RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_project(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_owner(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let owner = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1 AND owner_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn is_member(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let member = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn find_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectMember>, StoreError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM project_members WHERE project_id = $1 AND user_id = $2"
        ))
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ProjectMember::try_from)
        .transpose()
    }

    async fn list_members(&self, project_id: i64) -> Result<Vec<ProjectMember>, StoreError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM project_members WHERE project_id = $1 ORDER BY user_id"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ProjectMember::try_from)
        .collect()
    }

    async fn add_member(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, StoreError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "INSERT INTO project_members (project_id, user_id, role) \
             VALUES ($1, $2, $3) RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        row.try_into()
    }

    async fn update_member_role(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<Option<ProjectMember>, StoreError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "UPDATE project_members SET role = $1 \
             WHERE project_id = $2 AND user_id = $3 RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(role.as_str())
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ProjectMember::try_from)
        .transpose()
    }

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
                .bind(project_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks (project_id, owner_id, title, description) \
             VALUES ($1, $2, $3, $4) RETURNING {TASK_COLUMNS}"
        ))
        .bind(task.project_id)
        .bind(task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_task(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks SET title = $1, description = $2, updated_at = now() \
             WHERE id = $3 RETURNING {TASK_COLUMNS}"
        ))
        .bind(title)
        .bind(description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn create_comment(&self, comment: NewComment) -> Result<TaskComment, StoreError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO task_comments (task_id, author_id, content, parent_id) \
             VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.task_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_comment(&self, id: i64) -> Result<Option<TaskComment>, StoreError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM task_comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_root_comments(
        &self,
        task_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TaskComment>, i64), StoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM task_comments WHERE task_id = $1 AND parent_id IS NULL",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM task_comments
            WHERE task_id = $1 AND parent_id IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(task_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn find_replies(&self, parent_ids: &[i64]) -> Result<Vec<TaskComment>, StoreError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM task_comments \
             WHERE parent_id = ANY($1) ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_comment_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<TaskComment>, StoreError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "UPDATE task_comments SET content = $1, updated_at = now() \
             WHERE id = $2 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM task_comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
