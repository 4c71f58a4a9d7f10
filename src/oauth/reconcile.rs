//! Reconciliation of a federated identity against the local account store.

use tracing::{info, instrument, warn};

use crate::auth::AuthError;
use crate::user::{
    GITHUB_PROVIDER, NewFederatedUser, ProfileUpdate, User, UserRepository, is_unique_violation,
};

use super::resolver::FederatedIdentity;

/// Decides, for each incoming federated login, whether it maps to an
/// existing account, refreshes one, or creates a new one.
#[derive(Debug, Clone)]
pub struct IdentityReconciler {
    users: UserRepository,
}

impl IdentityReconciler {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Reconcile a federated identity to a local user.
    ///
    /// Accounts are keyed by email. A first-time login with an email already
    /// owned by a different provider's account is refused rather than
    /// silently merged.
    ///
    /// Two concurrent first logins for the same identity can both reach the
    /// insert. The loser's insert fails on a unique index, and one retry of
    /// the lookup-then-decide sequence finds the winner's row.
    #[instrument(skip(self, identity), fields(provider = %identity.provider))]
    pub async fn reconcile(&self, identity: &FederatedIdentity) -> Result<User, AuthError> {
        // Provider emails arrive in arbitrary case; the store is keyed on
        // the same normalized form the signup path uses.
        let email = match identity.email.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => e.to_lowercase(),
            _ => return Err(AuthError::MissingEmail),
        };

        for attempt in 0..2 {
            if let Some(user) = self.users.get_by_email(&email).await? {
                if user.provider != identity.provider {
                    warn!(
                        stored_provider = %user.provider,
                        "federated login email belongs to another provider's account"
                    );
                    return Err(AuthError::ProviderMismatch {
                        provider: user.provider,
                    });
                }
                return self.refresh_profile(user, identity).await;
            }

            // On the retry leg the lost insert may have tripped the provider
            // identity index instead of email: the same provider account
            // already exists under another email. The stored row wins.
            if attempt > 0
                && let Some(user) = self
                    .users
                    .get_by_provider_identity(&identity.provider, &identity.provider_id)
                    .await?
            {
                return self.refresh_profile(user, identity).await;
            }

            match self
                .users
                .create_federated(NewFederatedUser {
                    provider: identity.provider.clone(),
                    provider_id: identity.provider_id.clone(),
                    email: email.clone(),
                    display_name: identity.display_name.clone(),
                    avatar_url: identity.avatar_url.clone(),
                    github_username: if identity.provider == GITHUB_PROVIDER {
                        identity.provider_username.clone()
                    } else {
                        None
                    },
                })
                .await
            {
                Ok(user) => {
                    info!(user_id = user.id, "created account from federated login");
                    return Ok(user);
                }
                Err(err) if attempt == 0 && is_unique_violation(&err) => {
                    // Lost a concurrent-signup race; re-run the lookups.
                    warn!("federated signup hit a unique constraint, retrying lookup");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AuthError::Internal(anyhow::anyhow!(
            "federated identity neither found nor insertable after retry"
        )))
    }

    /// Push changed provider-side profile fields into the stored account.
    /// Unchanged fields are left out of the update entirely.
    async fn refresh_profile(
        &self,
        user: User,
        identity: &FederatedIdentity,
    ) -> Result<User, AuthError> {
        let mut update = ProfileUpdate::default();

        if user.display_name != identity.display_name {
            update.display_name = Some(identity.display_name.clone());
        }
        if identity.avatar_url.is_some() && user.avatar_url != identity.avatar_url {
            update.avatar_url = identity.avatar_url.clone();
        }
        if identity.provider == GITHUB_PROVIDER
            && identity.provider_username.is_some()
            && user.github_username != identity.provider_username
        {
            update.github_username = identity.provider_username.clone();
        }

        if update.is_empty() {
            return Ok(user);
        }

        Ok(self.users.update_profile(user.id, update).await?)
    }
}
