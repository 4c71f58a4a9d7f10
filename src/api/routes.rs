//! Router assembly.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::auth::auth_pipeline;

use super::handlers::{auth, misc, oauth};
use super::state::AppState;

/// Build the full application router.
///
/// The auth pipeline runs on every route. It only annotates requests;
/// endpoints that need a principal enforce it through the extractor.
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = build_cors(allowed_origins);

    Router::new()
        .route("/health", get(misc::health))
        .route("/api/v1/auth/signup", post(auth::sign_up))
        .route("/api/v1/auth/signin", post(auth::sign_in))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/api/v1/auth/me", get(auth::me))
        .route(
            "/api/v1/auth/oauth/github/callback",
            get(oauth::github_callback),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_pipeline))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
