//! Authentication module.
//!
//! Stateless JWT authentication: token issuance and verification, the
//! per-request authentication pipeline, and the sign-up/sign-in/refresh
//! orchestration on top of the user store.

mod claims;
mod error;
mod middleware;
mod principal;
mod service;
mod tokens;

pub use claims::Claims;
pub use error::AuthError;
pub use middleware::{auth_pipeline, bearer_token_from_header};
pub use principal::Principal;
pub use service::{AuthService, AuthTokens, SignUpData};
pub use tokens::{IssuedToken, TokenCodec, TokenError};
