//! Task handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use taskboard_core::models::Task;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::TaskRequest;

/// `POST /projects/{project_id}/tasks`
pub async fn create_task_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<TaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = state
        .tasks
        .create(&identity, project_id, &body.title, body.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /projects/{project_id}/tasks/{task_id}`
pub async fn get_task_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id)): Path<(i64, i64)>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.tasks.get(&identity, project_id, task_id).await?))
}

/// `PUT /projects/{project_id}/tasks/{task_id}`
pub async fn update_task_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id)): Path<(i64, i64)>,
    Json(body): Json<TaskRequest>,
) -> AppResult<Json<Task>> {
    let task = state
        .tasks
        .update(
            &identity,
            project_id,
            task_id,
            &body.title,
            body.description.as_deref(),
        )
        .await?;
    Ok(Json(task))
}

/// `DELETE /projects/{project_id}/tasks/{task_id}`
pub async fn delete_task_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.tasks.delete(&identity, project_id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
