//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Provider name for accounts created with email/password.
pub const LOCAL_PROVIDER: &str = "local";

/// Provider marker for accounts created through GitHub login.
pub const GITHUB_PROVIDER: &str = "github";

/// User entity from database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
    /// Identity provider that owns this account ("local" or "github").
    pub provider: String,
    /// Provider-assigned subject id. Present only for federated accounts.
    pub provider_id: Option<String>,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Whether this account was created through a federated provider.
    pub fn is_federated(&self) -> bool {
        self.provider != LOCAL_PROVIDER
    }
}

/// Public user profile (safe to return to clients).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
    pub provider: String,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            github_username: user.github_username,
            provider: user.provider,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Insert payload for a local (email/password) account.
#[derive(Debug, Clone)]
pub struct NewLocalUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
}

/// Insert payload for a federated account.
#[derive(Debug, Clone)]
pub struct NewFederatedUser {
    pub provider: String,
    pub provider_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
}

/// Mutable display fields. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_url.is_none() && self.github_username.is_none()
    }
}
