//! Integration tests: build the router over the in-memory store and drive it
//! with `oneshot` requests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use taskboard_api::{AppState, config::ApiConfig};
use taskboard_core::auth::{SigningKeys, TokenService};
use taskboard_core::mailer::Mailer;
use taskboard_core::store::MemoryStore;
use tower::ServiceExt;

/// Keeps the last token of each kind so tests can follow the mailed links.
#[derive(Default)]
struct CapturingMailer {
    verification: Mutex<Vec<String>>,
    reset: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_verification(&self, _email: &str, _username: &str, token: &str) {
        self.verification.lock().unwrap().push(token.to_string());
    }

    async fn send_password_reset(&self, _email: &str, token: &str) {
        self.reset.lock().unwrap().push(token.to_string());
    }
}

struct TestApp {
    router: Router,
    mailer: Arc<CapturingMailer>,
}

impl TestApp {
    fn new() -> Self {
        let (keys, _) = SigningKeys::generate().unwrap();
        let mailer = Arc::new(CapturingMailer::default());
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TokenService::new(keys)),
            mailer.clone(),
            ApiConfig::default(),
        )
        .unwrap();
        Self {
            router: taskboard_api::router(state),
            mailer,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register, verify and log in. Returns (user id, access token).
    async fn signup(&self, username: &str) -> (i64, String) {
        let (status, user) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "correct horse",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["enabled"], false);

        let token = self.mailer.verification.lock().unwrap().last().cloned().unwrap();
        let (status, _) = self
            .call(
                Method::GET,
                &format!("/auth/verify-email?token={token}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, login) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "identifier": username, "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        (
            user["id"].as_i64().unwrap(),
            login["accessToken"].as_str().unwrap().to_string(),
        )
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn login_requires_verified_account() {
    let app = TestApp::new();
    let (status, _) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "username": "dora",
                "email": "dora@example.com",
                "password": "correct horse",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let login = json!({ "identifier": "dora@example.com", "password": "correct horse" });
    let (status, _) = app
        .call(Method::POST, "/auth/login", None, Some(login.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.mailer.verification.lock().unwrap()[0].clone();
    app.call(
        Method::GET,
        &format!("/auth/verify-email?token={token}"),
        None,
        None,
    )
    .await;
    let (status, body) = app.call(Method::POST, "/auth/login", None, Some(login)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 3600);
}

#[tokio::test]
async fn wrong_password_and_short_password_are_rejected() {
    let app = TestApp::new();
    app.signup("erin").await;
    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "identifier": "erin", "password": "wrong horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "finn", "email": "finn@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_need_an_access_token() {
    let app = TestApp::new();
    let (status, _) = app.call(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::GET, "/auth/me", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A verification token carries the wrong purpose.
    app.call(
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "gil", "email": "gil@example.com", "password": "correct horse" })),
    )
    .await;
    let verification = app.mailer.verification.lock().unwrap()[0].clone();
    let (status, _) = app
        .call(Method::GET, "/auth/me", Some(&verification), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (user_id, token) = app.signup("hana").await;
    let (status, me) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["userId"], user_id);
    assert_eq!(me["authorities"], json!(["USER"]));
}

#[tokio::test]
async fn password_reset_always_reports_success() {
    let app = TestApp::new();
    app.signup("ivan").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/password-reset/request",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(app.mailer.reset.lock().unwrap().is_empty());

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/password-reset/request",
            None,
            Some(json!({ "email": "ivan@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let reset = app.mailer.reset.lock().unwrap()[0].clone();

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/password-reset/confirm",
            None,
            Some(json!({ "token": reset, "newPassword": "battery staple" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "identifier": "ivan", "password": "battery staple" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn project_task_and_comment_flow() {
    let app = TestApp::new();
    let (_, owner) = app.signup("olga").await;
    let (member_id, member) = app.signup("mia").await;
    let (_, outsider) = app.signup("otto").await;

    let (status, project) = app
        .call(
            Method::POST,
            "/projects",
            Some(&owner),
            Some(json!({ "name": "Apollo" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = project["id"].as_i64().unwrap();

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/projects/{project_id}/members"),
            Some(&owner),
            Some(json!({ "userId": member_id, "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, members) = app
        .call(
            Method::GET,
            &format!("/projects/{project_id}/members"),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/projects/{project_id}"),
            Some(&outsider),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/projects/{project_id}/tasks"),
            Some(&outsider),
            Some(json!({ "title": "Sneak in" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_project_member");

    let (status, task) = app
        .call(
            Method::POST,
            &format!("/projects/{project_id}/tasks"),
            Some(&member),
            Some(json!({ "title": "Launch" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_i64().unwrap();
    let comments = format!("/projects/{project_id}/tasks/{task_id}/comments");

    let mut parent: Option<i64> = None;
    let mut ids = Vec::new();
    for content in ["A", "B", "C"] {
        let (status, comment) = app
            .call(
                Method::POST,
                &comments,
                Some(&member),
                Some(json!({ "content": content, "parentId": parent })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{content}");
        let id = comment["id"].as_i64().unwrap();
        ids.push(id);
        parent = Some(id);
    }

    let (status, body) = app
        .call(
            Method::POST,
            &comments,
            Some(&owner),
            Some(json!({ "content": "D", "parentId": ids[2] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "nesting_limit_exceeded");

    let (status, page) = app.call(Method::GET, &comments, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 1);
    assert_eq!(page["items"][0]["id"], ids[0]);
    assert_eq!(page["items"][0]["replies"][0]["id"], ids[1]);

    let (status, replies) = app
        .call(
            Method::GET,
            &format!("{comments}/{}/replies", ids[1]),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replies[0]["id"], ids[2]);

    let (status, _) = app
        .call(Method::GET, &comments, Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Only the author edits.
    let (status, _) = app
        .call(
            Method::PUT,
            &format!("{comments}/{}", ids[0]),
            Some(&owner),
            Some(json!({ "content": "edited" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, edited) = app
        .call(
            Method::PUT,
            &format!("{comments}/{}", ids[0]),
            Some(&member),
            Some(json!({ "content": "edited" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "edited");

    // The project owner may delete anyone's comment.
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("{comments}/{}", ids[2]),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/projects/{project_id}"),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_cannot_manage_own_membership() {
    let app = TestApp::new();
    let (owner_id, owner) = app.signup("pia").await;
    let (_, project) = app
        .call(
            Method::POST,
            "/projects",
            Some(&owner),
            Some(json!({ "name": "Gemini" })),
        )
        .await;
    let project_id = project["id"].as_i64().unwrap();

    let (status, body) = app
        .call(
            Method::DELETE,
            &format!("/projects/{project_id}/members/{owner_id}"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "cannot_manage_own_membership");

    let (status, _) = app
        .call(Method::GET, "/projects/9999", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
