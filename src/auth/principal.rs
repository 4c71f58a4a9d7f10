//! Request-scoped authenticated identity.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::{Map, Value};

use super::claims::Claims;
use super::error::AuthError;
use crate::user::User;

/// The authenticated identity attached to one request or login.
///
/// Constructed fresh per request by the authentication pipeline, or per
/// successful login by the service layer; never cached across requests.
/// Federated logins additionally carry the raw provider attribute map for
/// downstream consumers.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Raw provider attributes; present only when this principal was built
    /// from a federated login.
    pub attributes: Option<Map<String, Value>>,
}

impl Principal {
    /// Build a principal from verified token claims. Trusts only what the
    /// signature covers.
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        Some(Self {
            id: claims.user_id()?,
            email: claims.email.clone(),
            display_name: claims.name.clone(),
            attributes: None,
        })
    }

    /// Build a principal from a persisted user.
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: Some(user.email.clone()),
            display_name: Some(user.display_name.clone()),
            attributes: None,
        }
    }

    /// Build a principal from a federated login, preserving the provider's
    /// raw attribute map.
    pub fn from_federated_user(user: &User, attributes: Map<String, Value>) -> Self {
        Self {
            attributes: Some(attributes),
            ..Self::from_user(user)
        }
    }
}

/// Extract the principal established by the authentication pipeline.
///
/// Absence means the request is anonymous; rejecting it here is the
/// downstream authorization decision, not the pipeline's.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}
