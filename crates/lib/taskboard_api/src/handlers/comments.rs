//! Comment thread handlers. Every mutation is broadcast to the task topic
//! before the response is returned.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use taskboard_core::models::{CommentThread, Page, TaskComment};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateCommentRequest, PageQuery, UpdateCommentRequest};

/// `GET /projects/{project_id}/tasks/{task_id}/comments?page=&size=`
pub async fn list_comments_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id)): Path<(i64, i64)>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<CommentThread>>> {
    let page = state
        .comments
        .list_roots(&identity, project_id, task_id, query.into())
        .await?;
    Ok(Json(page))
}

/// `POST /projects/{project_id}/tasks/{task_id}/comments`
pub async fn create_comment_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id)): Path<(i64, i64)>,
    Json(body): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<TaskComment>)> {
    let comment = state
        .comments
        .create(&identity, project_id, task_id, &body.content, body.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// `GET /projects/{project_id}/tasks/{task_id}/comments/{comment_id}/replies`
pub async fn list_replies_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id, comment_id)): Path<(i64, i64, i64)>,
) -> AppResult<Json<Vec<TaskComment>>> {
    let replies = state
        .comments
        .list_replies(&identity, project_id, task_id, comment_id)
        .await?;
    Ok(Json(replies))
}

/// `PUT /projects/{project_id}/tasks/{task_id}/comments/{comment_id}`
pub async fn update_comment_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id, comment_id)): Path<(i64, i64, i64)>,
    Json(body): Json<UpdateCommentRequest>,
) -> AppResult<Json<TaskComment>> {
    let comment = state
        .comments
        .update(&identity, project_id, task_id, comment_id, &body.content)
        .await?;
    Ok(Json(comment))
}

/// `DELETE /projects/{project_id}/tasks/{task_id}/comments/{comment_id}`
pub async fn delete_comment_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    Path((project_id, task_id, comment_id)): Path<(i64, i64, i64)>,
) -> AppResult<StatusCode> {
    state
        .comments
        .delete(&identity, project_id, task_id, comment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
