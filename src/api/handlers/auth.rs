//! Local authentication endpoints: signup, signin, refresh, current user.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::auth::{AuthError, AuthTokens, Principal, SignUpData};
use crate::user::UserProfile;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/v1/auth/signup
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, AuthError> {
    let profile = state
        .auth
        .sign_up(SignUpData {
            email: req.email.trim().to_lowercase(),
            password: req.password,
            password_confirm: req.password_confirm,
            display_name: req.display_name,
            avatar_url: req.avatar_url.filter(|u| !u.trim().is_empty()),
            github_username: req.github_username.filter(|u| !u.trim().is_empty()),
        })
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        profile,
        "account created",
    )))
}

/// POST /api/v1/auth/signin
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<ApiResponse<AuthTokens>>, AuthError> {
    let session = state
        .auth
        .sign_in(req.email.trim().to_lowercase().as_str(), &req.password)
        .await?;

    Ok(Json(ApiResponse::success(session)))
}

/// POST /api/v1/auth/refresh
#[instrument(skip(state, req))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<AuthTokens>>, AuthError> {
    let session = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(ApiResponse::success(session)))
}

/// GET /api/v1/auth/me
#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<UserProfile>>, AuthError> {
    let profile = state.auth.current_user(principal.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
