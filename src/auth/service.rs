//! Account and session orchestration: signup, signin, refresh and the
//! federated login path, all ending in an issued token pair.

use anyhow::anyhow;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::oauth::{IdentityReconciler, ResolverRegistry};
use crate::user::{NewLocalUser, User, UserProfile, UserRepository, is_unique_violation};

use super::error::AuthError;
use super::principal::Principal;
use super::tokens::TokenCodec;

#[cfg(debug_assertions)]
const BCRYPT_COST: u32 = 4;
#[cfg(not(debug_assertions))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

const MIN_PASSWORD_LEN: usize = 8;

/// Input for local account creation, already deserialized and trimmed by
/// the HTTP layer.
#[derive(Debug, Clone)]
pub struct SignUpData {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
}

/// A freshly issued session: token pair plus the profile of the user it
/// belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Orchestrates authentication flows over the user store, the token codec
/// and the federated identity machinery.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    codec: TokenCodec,
    resolvers: std::sync::Arc<ResolverRegistry>,
    reconciler: IdentityReconciler,
}

impl AuthService {
    pub fn new(users: UserRepository, codec: TokenCodec) -> Self {
        let reconciler = IdentityReconciler::new(users.clone());
        Self {
            users,
            codec,
            resolvers: std::sync::Arc::new(ResolverRegistry::with_defaults()),
            reconciler,
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Register a local account. Issues no tokens; signing in is a
    /// separate step.
    #[instrument(skip(self, data), fields(email = %data.email))]
    pub async fn sign_up(&self, data: SignUpData) -> Result<UserProfile, AuthError> {
        validate_email(&data.email)?;
        if data.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if data.password != data.password_confirm {
            return Err(AuthError::PasswordMismatch);
        }
        if data.display_name.trim().is_empty() {
            return Err(AuthError::Validation("display name is required".to_string()));
        }

        if self.users.email_exists(&data.email).await? {
            return Err(AuthError::DuplicateEmail);
        }
        if let Some(github_username) = &data.github_username {
            if self.users.github_username_exists(github_username).await? {
                return Err(AuthError::DuplicateProviderUsername);
            }
        }

        let password_hash = bcrypt::hash(&data.password, BCRYPT_COST)
            .map_err(|e| AuthError::Internal(anyhow!("password hashing failed: {e}")))?;

        let user = match self
            .users
            .create_local(NewLocalUser {
                email: data.email,
                password_hash,
                display_name: data.display_name.trim().to_string(),
                avatar_url: data.avatar_url,
                github_username: data.github_username,
            })
            .await
        {
            Ok(user) => user,
            // The exists-check raced with another signup for the same email.
            Err(err) if is_unique_violation(&err) => return Err(AuthError::DuplicateEmail),
            Err(err) => return Err(err.into()),
        };

        info!(user_id = user.id, "user signed up");
        Ok(UserProfile::from(user))
    }

    /// Sign in with email and password.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Federated accounts have no password. Which provider owns the email
        // stays in the server-side log; over the wire this is a plain
        // credential failure, indistinguishable from an unknown email.
        let Some(password_hash) = &user.password_hash else {
            warn!(
                user_id = user.id,
                provider = %user.provider,
                "password sign-in against federated account"
            );
            return Err(AuthError::InvalidCredentials);
        };

        let matches = bcrypt::verify(password, password_hash)
            .map_err(|e| AuthError::Internal(anyhow!("password verification failed: {e}")))?;
        if !matches {
            warn!(user_id = user.id, "sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "user signed in");
        self.issue_session(&Principal::from_user(&user), &user)
    }

    /// Exchange a refresh token for a fresh token pair.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let user_id = self.codec.subject_id(refresh_token)?;

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.issue_session(&Principal::from_user(&user), &user)
    }

    /// Complete a federated login from a provider's raw attribute map.
    #[instrument(skip(self, attributes))]
    pub async fn federated_sign_in(
        &self,
        provider: &str,
        attributes: &Map<String, Value>,
    ) -> Result<AuthTokens, AuthError> {
        let identity = self.resolvers.resolve(provider, attributes)?;
        let user = self.reconciler.reconcile(&identity).await?;

        // The federated principal keeps the provider's raw attribute map
        // alongside the persisted profile.
        let principal = Principal::from_federated_user(&user, attributes.clone());

        info!(user_id = user.id, provider, "federated sign-in");
        self.issue_session(&principal, &user)
    }

    /// Look up the profile behind an authenticated principal.
    #[instrument(skip(self))]
    pub async fn current_user(&self, user_id: i64) -> Result<UserProfile, AuthError> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile::from(user))
    }

    fn issue_session(&self, principal: &Principal, user: &User) -> Result<AuthTokens, AuthError> {
        let access = self
            .codec
            .issue_access_token(principal)
            .map_err(|e| AuthError::Internal(anyhow!("access token encoding failed: {e}")))?;
        let refresh = self
            .codec
            .issue_refresh_token(principal.id)
            .map_err(|e| AuthError::Internal(anyhow!("refresh token encoding failed: {e}")))?;

        Ok(AuthTokens {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
            expires_in: self.codec.access_ttl_secs(),
            user: UserProfile::from(user.clone()),
        })
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    });
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("invalid email address".to_string()))
    }
}
