//! Router-level tests over the in-memory store.

use super::*;
use crate::identity::{
    codes::tests::RecordingNotifier, AuthConfig, Caller, Registration,
};
use crate::store::MemoryStore;
use anyhow::{Context, Result};
use axum::{
    body::to_bytes,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, StatusCode},
    response::Response,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_SECRET: &str = "admin-s3cret";

struct TestApp {
    identity: Identity,
    notifier: Arc<RecordingNotifier>,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let identity = Identity::new(
            store.clone(),
            SecretString::from("test-secret".to_string()),
            notifier.clone(),
            &AuthConfig::new(),
        )?;
        Ok(Self {
            identity,
            notifier,
            store,
        })
    }

    fn router(&self) -> Router {
        router(
            self.identity.clone(),
            AdminGuard::new(Some(SecretString::from(ADMIN_SECRET.to_string()))),
        )
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router().oneshot(request).await?)
    }

    async fn seed_account(&self, username: &str) -> Result<i64> {
        let account = self
            .identity
            .accounts
            .register(
                Registration {
                    username: username.to_string(),
                    password: "correct horse".to_string(),
                    email: format!("{username}@x.com"),
                    code: None,
                },
                Caller::Trusted,
            )
            .await?;
        Ok(account.id)
    }
}

fn json_request(method: Method, uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

fn bearer_request(method: Method, uri: &str, token: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?)
}

fn admin_request(method: Method, uri: &str, secret: &str, body: Option<&Value>) -> Result<Request<Body>> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(handlers::admin::ADMIN_SECRET_HEADER, secret);
    Ok(match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?,
        None => builder.body(Body::empty())?,
    })
}

async fn body_json(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn login(app: &TestApp, identifier: &str) -> Result<String> {
    let response = app
        .send(json_request(
            Method::POST,
            "/v1/auth/login",
            &json!({"identifier": identifier, "password": "correct horse"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("missing token")
}

#[tokio::test]
async fn health_reports_store_state() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let response = app.send(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    let body = body_json(response).await?;
    assert_eq!(body["store"], "ok");

    app.store.set_offline(true);
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let response = app.send(request).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn register_flow_over_http() -> Result<()> {
    let app = TestApp::new()?;

    let response = app
        .send(json_request(
            Method::POST,
            "/v1/auth/code",
            &json!({"email": "alice@x.com"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let code = app
        .notifier
        .last_code("alice@x.com")
        .await
        .context("no code sent")?;

    let response = app
        .send(json_request(
            Method::POST,
            "/v1/auth/register",
            &json!({"username": "alice", "password": "correct horse", "email": "alice@x.com", "code": code}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert_eq!(body["user_id"], 1);

    let response = app
        .send(json_request(
            Method::POST,
            "/v1/auth/register",
            &json!({"username": "alice", "password": "x", "email": "other@x.com", "code": "123456"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await?["code"], "conflict");
    Ok(())
}

#[tokio::test]
async fn code_requests_are_rate_limited() -> Result<()> {
    let app = TestApp::new()?;
    let request = || {
        json_request(
            Method::POST,
            "/v1/auth/code",
            &json!({"email": "bob@x.com"}),
        )
    };

    assert_eq!(app.send(request()?).await?.status(), StatusCode::ACCEPTED);
    let response = app.send(request()?).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await?["code"], "rate_limited");
    assert_eq!(app.notifier.sent_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn missing_payload_is_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/login")
        .body(Body::empty())?;
    let response = app.send(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn session_and_logout() -> Result<()> {
    let app = TestApp::new()?;
    let user_id = app.seed_account("carol").await?;
    let token = login(&app, "carol").await?;

    let response = app
        .send(bearer_request(Method::GET, "/v1/auth/session", &token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["user_id"], user_id);

    let response = app
        .send(bearer_request(Method::POST, "/v1/auth/logout", &token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(bearer_request(Method::GET, "/v1/auth/session", &token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = TestApp::new()?;
    app.seed_account("dave").await?;
    let response = app
        .send(json_request(
            Method::POST,
            "/v1/auth/login",
            &json!({"identifier": "dave", "password": "nope"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await?["code"], "unauthorized");
    Ok(())
}

#[tokio::test]
async fn admin_ban_cycle() -> Result<()> {
    let app = TestApp::new()?;
    let user_id = app.seed_account("erin").await?;
    let token = login(&app, "erin").await?;

    let response = app
        .send(admin_request(
            Method::POST,
            &format!("/v1/admin/users/{user_id}/ban"),
            "wrong",
            None,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(admin_request(
            Method::POST,
            &format!("/v1/admin/users/{user_id}/ban"),
            ADMIN_SECRET,
            Some(&json!({"reason": "spam"})),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send(bearer_request(Method::GET, "/v1/auth/session", &token)?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            Method::POST,
            "/v1/auth/login",
            &json!({"identifier": "erin", "password": "correct horse"}),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "account_suspended");
    assert_eq!(body["reason"], "spam");

    let response = app
        .send(admin_request(
            Method::POST,
            &format!("/v1/admin/users/{user_id}/unban"),
            ADMIN_SECRET,
            None,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["lifted"], 1);

    let response = app
        .send(admin_request(
            Method::GET,
            &format!("/v1/admin/users/{user_id}/bans"),
            ADMIN_SECRET,
            None,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await?;
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["is_active"], false);

    login(&app, "erin").await?;
    Ok(())
}

#[tokio::test]
async fn admin_routes_hidden_without_secret() -> Result<()> {
    let app = TestApp::new()?;
    let router = super::router(app.identity.clone(), AdminGuard::new(None));
    let response = router
        .oneshot(admin_request(
            Method::GET,
            "/v1/admin/users/1/bans",
            "",
            None,
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
