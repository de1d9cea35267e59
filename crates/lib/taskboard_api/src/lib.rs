//! # taskboard_api
//!
//! HTTP API library for Taskboard.
//!
//! Wires the core services into an Axum router and mounts the STOMP
//! WebSocket endpoint from `taskboard_realtime` next to the REST routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use taskboard_core::auth::TokenService;
use taskboard_core::comments::CommentTreeManager;
use taskboard_core::mailer::Mailer;
use taskboard_core::permissions::PermissionEvaluator;
use taskboard_core::projects::ProjectService;
use taskboard_core::store::Store;
use taskboard_core::tasks::TaskService;
use taskboard_realtime::broadcast::Broadcaster;
use taskboard_realtime::{RealtimeState, realtime_router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::handlers::{auth, comments, health, projects, tasks};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub permissions: PermissionEvaluator,
    pub projects: ProjectService,
    pub tasks: TaskService,
    pub comments: CommentTreeManager,
    pub realtime: RealtimeState,
    pub mailer: Arc<dyn Mailer>,
    pub config: ApiConfig,
}

impl AppState {
    /// Build the services over one store. Comment events are published to
    /// the same broadcaster the WebSocket sessions subscribe on.
    pub fn new(
        store: Arc<dyn Store>,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn Mailer>,
        config: ApiConfig,
    ) -> Result<Self, AppError> {
        let permissions = PermissionEvaluator::new(store.clone());
        let broadcaster = Arc::new(Broadcaster::new());
        let realtime = RealtimeState::new(tokens.clone(), permissions.clone(), broadcaster.clone())
            .map_err(|e| AppError::Internal(format!("destination rules: {e}")))?;
        let comments = CommentTreeManager::new(store.clone(), permissions.clone(), broadcaster)
            .with_max_depth(config.comment_max_depth);

        Ok(Self {
            projects: ProjectService::new(store.clone(), permissions.clone()),
            tasks: TaskService::new(store.clone(), permissions.clone()),
            store,
            tokens,
            permissions,
            comments,
            realtime,
            mailer,
            config,
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::GET_AUTH_VERIFY_EMAIL, get(auth::verify_email_handler))
        .route(
            routes::POST_AUTH_PASSWORD_RESET_REQUEST,
            post(auth::password_reset_request_handler),
        )
        .route(
            routes::POST_AUTH_PASSWORD_RESET_CONFIRM,
            post(auth::password_reset_confirm_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::PROJECTS, post(projects::create_project_handler))
        .route(
            routes::PROJECT,
            get(projects::get_project_handler)
                .put(projects::update_project_handler)
                .delete(projects::delete_project_handler),
        )
        .route(
            routes::PROJECT_MEMBERS,
            get(projects::list_members_handler).post(projects::add_member_handler),
        )
        .route(
            routes::PROJECT_MEMBER,
            put(projects::update_member_handler)
                .delete(projects::remove_member_handler),
        )
        .route(routes::TASKS, post(tasks::create_task_handler))
        .route(
            routes::TASK,
            get(tasks::get_task_handler)
                .put(tasks::update_task_handler)
                .delete(tasks::delete_task_handler),
        )
        .route(
            routes::COMMENTS,
            get(comments::list_comments_handler).post(comments::create_comment_handler),
        )
        .route(
            routes::COMMENT,
            put(comments::update_comment_handler)
                .delete(comments::delete_comment_handler),
        )
        .route(routes::COMMENT_REPLIES, get(comments::list_replies_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let realtime = realtime_router(state.realtime.clone());

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .merge(realtime)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
