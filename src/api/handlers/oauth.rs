//! Federated login endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::auth::{AuthError, AuthTokens};
use crate::user::GITHUB_PROVIDER;

#[derive(Debug, Deserialize)]
pub struct GithubCallbackQuery {
    pub code: String,
}

/// GET /api/v1/auth/oauth/github/callback
///
/// Terminal leg of the GitHub authorization-code flow: exchange the code,
/// fetch the user, reconcile and sign in.
#[instrument(skip(state, query))]
pub async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<GithubCallbackQuery>,
) -> Result<Json<ApiResponse<AuthTokens>>, AuthError> {
    let github = state
        .github
        .as_ref()
        .ok_or_else(|| AuthError::UnsupportedProvider(GITHUB_PROVIDER.to_string()))?;

    if query.code.is_empty() {
        return Err(AuthError::Validation("missing authorization code".to_string()));
    }

    let access_token = github.exchange_code(&query.code).await?;
    let attributes = github.fetch_user(&access_token).await?;

    let session = state
        .auth
        .federated_sign_in(GITHUB_PROVIDER, &attributes)
        .await?;

    Ok(Json(ApiResponse::success(session)))
}
