//! Project and membership handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use taskboard_core::models::{Project, ProjectMember};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AddMemberRequest, ProjectRequest, UpdateMemberRoleRequest};

/// `POST /projects`
pub async fn create_project_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Json(body): Json<ProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = state
        .projects
        .create(&identity, &body.name, body.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /projects/{project_id}`
pub async fn get_project_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path(project_id): Path<i64>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.projects.get(&identity, project_id).await?))
}

/// `PUT /projects/{project_id}`
pub async fn update_project_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<ProjectRequest>,
) -> AppResult<Json<Project>> {
    let project = state
        .projects
        .update(&identity, project_id, &body.name, body.description.as_deref())
        .await?;
    Ok(Json(project))
}

/// `DELETE /projects/{project_id}`
pub async fn delete_project_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path(project_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.projects.delete(&identity, project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /projects/{project_id}/members`
pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path(project_id): Path<i64>,
) -> AppResult<Json<Vec<ProjectMember>>> {
    Ok(Json(state.projects.list_members(&identity, project_id).await?))
}

/// `POST /projects/{project_id}/members`
pub async fn add_member_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<ProjectMember>)> {
    let member = state
        .projects
        .add_member(&identity, project_id, body.user_id, body.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// `PUT /projects/{project_id}/members/{user_id}`
pub async fn update_member_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, user_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateMemberRoleRequest>,
) -> AppResult<Json<ProjectMember>> {
    let member = state
        .projects
        .update_member_role(&identity, project_id, user_id, body.role)
        .await?;
    Ok(Json(member))
}

/// `DELETE /projects/{project_id}/members/{user_id}`
pub async fn remove_member_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state
        .projects
        .remove_member(&identity, project_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
