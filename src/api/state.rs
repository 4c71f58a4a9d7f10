//! Shared application state handed to every handler.

use crate::auth::{AuthService, TokenCodec};
use crate::oauth::GithubClient;

/// State shared across the router. Everything in here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub tokens: TokenCodec,
    /// Absent when GitHub login is not configured.
    pub github: Option<GithubClient>,
}

impl AppState {
    pub fn new(auth: AuthService, tokens: TokenCodec, github: Option<GithubClient>) -> Self {
        Self {
            auth,
            tokens,
            github,
        }
    }
}
