//! Authentication and account errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::api::ApiResponse;

use super::tokens::TokenError;

/// Errors surfaced by the authentication subsystem.
///
/// The credential and token variants are deliberately vague on the wire:
/// a caller must not be able to tell an unknown email from a wrong password,
/// nor which token check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input the client can fix.
    #[error("{0}")]
    Validation(String),

    /// Password and confirmation do not match.
    #[error("password and confirmation do not match")]
    PasswordMismatch,

    /// Email already registered.
    #[error("email is already registered")]
    DuplicateEmail,

    /// GitHub username already claimed by another account.
    #[error("GitHub username is already in use")]
    DuplicateProviderUsername,

    /// Sign-in failure. Covers unknown email and wrong password alike.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Token verification failure. Covers bad signature, bad structure and
    /// expiry alike.
    #[error("invalid or expired token")]
    InvalidToken,

    /// No principal established for this request.
    #[error("authentication required")]
    Unauthenticated,

    /// The referenced identity no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// Federated provider did not supply an email address.
    #[error("email not available from OAuth2 provider")]
    MissingEmail,

    /// No resolver registered for this provider.
    #[error("login with {0} is not supported")]
    UnsupportedProvider(String),

    /// The email is already owned by an account from another provider.
    /// Naming the original provider is safe: the caller proved email
    /// ownership through that provider's login.
    #[error("this email is registered with a {provider} account; use your {provider} login")]
    ProviderMismatch { provider: String },

    /// Anything unanticipated. Logged in full server-side, opaque on the wire.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        // The specific failure stays server-side.
        warn!(reason = %err, "token verification failed");
        AuthError::InvalidToken
    }
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::PasswordMismatch
            | AuthError::DuplicateEmail
            | AuthError::DuplicateProviderUsername
            | AuthError::MissingEmail
            | AuthError::UnsupportedProvider(_)
            | AuthError::ProviderMismatch { .. } => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::PasswordMismatch => "PASSWORD_MISMATCH",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::DuplicateProviderUsername => "DUPLICATE_PROVIDER_USERNAME",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::MissingEmail => "OAUTH_MISSING_EMAIL",
            AuthError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            AuthError::ProviderMismatch { .. } => "PROVIDER_MISMATCH",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let message = match &self {
            AuthError::Internal(err) => {
                error!(error = ?err, "internal error while handling auth request");
                "internal server error".to_string()
            }
            other => {
                warn!(error_code = code, "auth request failed: {other}");
                other.to_string()
            }
        };

        let body = Json(ApiResponse::<()>::failure(message, code));
        (status, body).into_response()
    }
}
