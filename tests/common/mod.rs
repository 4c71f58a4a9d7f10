//! Test utilities and common setup.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use devtrack::api::{AppState, create_router};
use devtrack::auth::{AuthService, TokenCodec};
use devtrack::db::Database;
use devtrack::user::UserRepository;

pub const TEST_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";

/// Create a test application over an in-memory database.
pub async fn test_app() -> Router {
    test_app_with_codec(TokenCodec::new(TEST_SECRET, 3600, 86400)).await
}

/// Create a test application with a custom token codec (e.g. expired TTLs).
pub async fn test_app_with_codec(codec: TokenCodec) -> Router {
    let db = Database::in_memory().await.unwrap();
    let users = UserRepository::new(db.pool().clone());
    let auth = AuthService::new(users, codec.clone());

    let state = AppState::new(auth, codec, None);
    create_router(state, &[])
}

/// POST a JSON body and return the response.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// GET a URI, optionally with a bearer token.
pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri).method(Method::GET);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Sign up a user, sign them in, and return (access token, refresh token,
/// user id). Sign-up alone issues no tokens.
pub async fn signed_up_user(app: &Router, email: &str) -> (String, String, i64) {
    let response = post_json(
        app,
        "/api/v1/auth/signup",
        serde_json::json!({
            "email": email,
            "password": "correct horse",
            "passwordConfirm": "correct horse",
            "displayName": "Test User"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        app,
        "/api/v1/auth/signin",
        serde_json::json!({"email": email, "password": "correct horse"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let data = &body["data"];
    (
        data["accessToken"].as_str().unwrap().to_string(),
        data["refreshToken"].as_str().unwrap().to_string(),
        data["user"]["id"].as_i64().unwrap(),
    )
}
