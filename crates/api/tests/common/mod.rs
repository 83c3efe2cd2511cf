#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use editflow_api::auth::jwt::{issue_token, JwtConfig};
use editflow_api::config::ServerConfig;
use editflow_api::router::build_app_router;
use editflow_api::state::AppState;
use editflow_capabilities::fakes::FakeCapabilities;
use editflow_pipeline::PipelineConfig;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

pub const CRON_SECRET: &str = "test-cron-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        cron_secret: CRON_SECRET.to_string(),
        pipeline: PipelineConfig::default(),
    }
}

/// Full application router over `pool`, with scripted capabilities.
pub fn build_test_app_with(pool: PgPool, fakes: &FakeCapabilities) -> Router {
    build_app_router(AppState::new(pool, test_config(), fakes.capabilities()))
}

pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, &FakeCapabilities::new())
}

/// Bearer token for `user_id`, signed with the test secret.
pub fn token_for(user_id: &str) -> String {
    let config = JwtConfig {
        secret: JWT_SECRET.to_string(),
    };
    issue_token(user_id, 3600, &config).expect("token should sign")
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Fire the scheduler trigger with the given bearer value, if any.
pub async fn trigger(app: Router, bearer: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/orchestrator/worker");
    if let Some(secret) = bearer {
        builder = builder.header("authorization", format!("Bearer {secret}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub fn edit_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "originalImageUrl": "https://cdn.example.com/uploads/cat.png",
        "originalImageFilename": "cat.png",
        "userPrompt": prompt,
    })
}

/// Submit an edit as `user_id` and return `(editId, jobId)`.
pub async fn submit_edit(app: Router, user_id: &str, prompt: &str) -> (String, String) {
    let response = post_json_auth(app, "/api/v1/edits", edit_body(prompt), &token_for(user_id)).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    (
        json["data"]["editId"].as_str().unwrap().to_string(),
        json["data"]["jobId"].as_str().unwrap().to_string(),
    )
}
