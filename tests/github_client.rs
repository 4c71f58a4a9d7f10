//! GitHub OAuth2 tests against a local stub server.
//!
//! The client's endpoint URLs are configurable, so these tests bind a small
//! axum router on an ephemeral port and point the client at it.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    Form, Json, Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use devtrack::api::{AppState, create_router};
use devtrack::auth::{AuthService, TokenCodec};
use devtrack::config::GithubConfig;
use devtrack::db::Database;
use devtrack::oauth::GithubClient;
use devtrack::user::UserRepository;

const STUB_ACCESS_TOKEN: &str = "gho_stub_access_token";

async fn token_endpoint(Form(params): Form<HashMap<String, String>>) -> Json<Value> {
    let valid = params.get("code").map(String::as_str) == Some("good-code")
        && params.get("client_id").map(String::as_str) == Some("client-id")
        && params.get("client_secret").map(String::as_str) == Some("client-secret");

    if valid {
        Json(json!({"access_token": STUB_ACCESS_TOKEN, "token_type": "bearer"}))
    } else {
        // GitHub reports a rejected code with a 200 status and an error body.
        Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
    }
}

async fn user_endpoint(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let expected = format!("Bearer {STUB_ACCESS_TOKEN}");
    let authorized =
        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str());
    if !authorized {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Json(json!({
        "id": 583231,
        "login": "octocat",
        "name": "The Octocat",
        "email": "octocat@github.com",
        "avatar_url": "https://avatars.githubusercontent.com/u/583231"
    })))
}

async fn spawn_stub() -> SocketAddr {
    let router = Router::new()
        .route("/login/oauth/access_token", post(token_endpoint))
        .route("/user", get(user_endpoint));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn stub_config(addr: SocketAddr) -> GithubConfig {
    GithubConfig {
        client_id: Some("client-id".to_string()),
        client_secret: Some("client-secret".to_string()),
        token_url: format!("http://{addr}/login/oauth/access_token"),
        user_api_url: format!("http://{addr}/user"),
    }
}

/// Full application wired to the stub provider, over an in-memory database.
async fn stub_app(addr: SocketAddr) -> Router {
    let db = Database::in_memory().await.unwrap();
    let users = UserRepository::new(db.pool().clone());
    let codec = TokenCodec::new(
        "test-secret-for-integration-tests-minimum-32-chars",
        3600,
        86400,
    );
    let auth = AuthService::new(users, codec.clone());
    let github = GithubClient::new(&stub_config(addr)).unwrap();

    create_router(AppState::new(auth, codec, Some(github)), &[])
}

#[tokio::test]
async fn test_code_exchange_and_user_fetch() {
    let addr = spawn_stub().await;
    let client = GithubClient::new(&stub_config(addr)).unwrap();

    let token = client.exchange_code("good-code").await.unwrap();
    assert_eq!(token, STUB_ACCESS_TOKEN);

    let attrs = client.fetch_user(&token).await.unwrap();
    assert_eq!(attrs["id"], json!(583231));
    assert_eq!(attrs["login"], json!("octocat"));
    assert_eq!(attrs["email"], json!("octocat@github.com"));
}

#[tokio::test]
async fn test_rejected_code_fails_despite_200_status() {
    let addr = spawn_stub().await;
    let client = GithubClient::new(&stub_config(addr)).unwrap();

    let err = client.exchange_code("bad-code").await.unwrap_err();
    assert!(format!("{err:#}").contains("bad_verification_code"));
}

#[tokio::test]
async fn test_user_fetch_with_wrong_token_fails() {
    let addr = spawn_stub().await;
    let client = GithubClient::new(&stub_config(addr)).unwrap();

    let err = client.fetch_user("wrong-token").await.unwrap_err();
    assert!(format!("{err:#}").contains("401"));
}

#[tokio::test]
async fn test_github_callback_signs_user_in() {
    let addr = spawn_stub().await;
    let app = stub_app(addr).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/oauth/github/callback?code=good-code")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let data = &json["data"];
    assert_eq!(data["tokenType"], "Bearer");
    assert_eq!(data["user"]["provider"], "github");
    assert_eq!(data["user"]["email"], "octocat@github.com");
    assert_eq!(data["user"]["emailVerified"], json!(true));

    // The issued access token works on protected routes.
    let access = data["accessToken"].as_str().unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
