//! Request authentication pipeline.
//!
//! Runs on every request. A valid bearer token attaches a [`Principal`] to
//! the request extensions; anything else leaves the request anonymous and
//! lets the handler (or the [`Principal`] extractor) decide whether that is
//! acceptable. The pipeline itself never rejects a request.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::AppState;

use super::principal::Principal;

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-sensitively and the token must be non-empty.
pub fn bearer_token_from_header(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() { None } else { Some(token) }
}

/// Middleware that resolves the bearer token, if any, into a [`Principal`].
pub async fn auth_pipeline(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token_from_header);

    if let Some(token) = token {
        match state.tokens.verify(token) {
            Ok(claims) => {
                if let Some(principal) = Principal::from_claims(&claims) {
                    req.extensions_mut().insert(principal);
                } else {
                    debug!("token verified but subject is not a user id");
                }
            }
            Err(err) => {
                // Invalid token and no token look the same downstream.
                debug!(reason = %err, "request carries an unusable bearer token");
            }
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token_from_header("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_scheme_is_case_sensitive() {
        assert_eq!(bearer_token_from_header("bearer abc"), None);
        assert_eq!(bearer_token_from_header("BEARER abc"), None);
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert_eq!(bearer_token_from_header("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token_from_header("Token abc"), None);
    }

    #[test]
    fn test_empty_token_rejected() {
        assert_eq!(bearer_token_from_header("Bearer "), None);
        assert_eq!(bearer_token_from_header("Bearer"), None);
    }

    #[test]
    fn test_token_with_internal_spaces_kept_verbatim() {
        // Whatever follows the scheme is handed to verification untouched.
        assert_eq!(bearer_token_from_header("Bearer a b"), Some("a b"));
    }
}
