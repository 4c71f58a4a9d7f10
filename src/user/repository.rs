//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{NewFederatedUser, NewLocalUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, password_hash, display_name, avatar_url, \
     github_username, provider, provider_id, email_verified, created_at, updated_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a local (email/password) account.
    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub async fn create_local(&self, new_user: NewLocalUser) -> Result<User> {
        debug!("Creating local user");

        let id = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, display_name, avatar_url, github_username, provider, email_verified)
            VALUES (?, ?, ?, ?, ?, 'local', FALSE)
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.display_name)
        .bind(&new_user.avatar_url)
        .bind(&new_user.github_username)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?
        .last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Insert a federated account. Federated providers are trusted to have
    /// verified the email, so the row is created with email_verified set.
    #[instrument(skip(self, new_user), fields(provider = %new_user.provider, email = %new_user.email))]
    pub async fn create_federated(&self, new_user: NewFederatedUser) -> Result<User> {
        debug!("Creating federated user");

        let id = sqlx::query(
            r#"
            INSERT INTO users (email, display_name, avatar_url, github_username, provider, provider_id, email_verified)
            VALUES (?, ?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.display_name)
        .bind(&new_user.avatar_url)
        .bind(&new_user.github_username)
        .bind(&new_user.provider)
        .bind(&new_user.provider_id)
        .execute(&self.pool)
        .await
        .context("Failed to insert federated user")?
        .last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get a user by email.
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        Ok(user)
    }

    /// Get a user by federated provider identity.
    #[instrument(skip(self))]
    pub async fn get_by_provider_identity(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE provider = ? AND provider_id = ?"
        ))
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by provider identity")?;

        Ok(user)
    }

    /// Check if an email is already registered.
    #[instrument(skip(self))]
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check email")?;

        Ok(count.0 > 0)
    }

    /// Check if a GitHub username is already claimed by another account.
    #[instrument(skip(self))]
    pub async fn github_username_exists(&self, github_username: &str) -> Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE github_username = ?")
                .bind(github_username)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check github username")?;

        Ok(count.0 > 0)
    }

    /// Update mutable display fields. Immutable fields (email, provider,
    /// provider_id) are never touched here.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: i64, update: ProfileUpdate) -> Result<User> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))?;

        if update.is_empty() {
            return Ok(existing);
        }

        let mut updates = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(display_name) = update.display_name {
            updates.push("display_name = ?");
            values.push(display_name);
        }
        if let Some(avatar_url) = update.avatar_url {
            updates.push("avatar_url = ?");
            values.push(avatar_url);
        }
        if let Some(github_username) = update.github_username {
            updates.push("github_username = ?");
            values.push(github_username);
        }

        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));

        let mut query_builder = sqlx::query(&sql);
        for value in &values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(id);

        query_builder
            .execute(&self.pool)
            .await
            .context("Failed to update user")?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    /// Count total users.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        Ok(count.0)
    }
}

/// Whether an error chain contains a SQLite UNIQUE constraint violation.
///
/// Used by callers that treat a lost insert race as recoverable.
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    format!("{err:#}").contains("UNIQUE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn test_repo() -> UserRepository {
        let db = Database::in_memory().await.unwrap();
        UserRepository::new(db.pool().clone())
    }

    fn local_user(email: &str) -> NewLocalUser {
        NewLocalUser {
            email: email.to_string(),
            password_hash: "hashed".to_string(),
            display_name: "Test User".to_string(),
            avatar_url: None,
            github_username: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_local_user() {
        let repo = test_repo().await;

        let user = repo.create_local(local_user("test@example.com")).await.unwrap();
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.provider, "local");
        assert!(!user.email_verified);
        assert!(user.password_hash.is_some());

        let fetched = repo.get(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);

        let by_email = repo.get_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn test_create_federated_user() {
        let repo = test_repo().await;

        let user = repo
            .create_federated(NewFederatedUser {
                provider: "github".to_string(),
                provider_id: "42".to_string(),
                email: "gh@example.com".to_string(),
                display_name: "GH User".to_string(),
                avatar_url: Some("https://avatars.example/42".to_string()),
                github_username: Some("ghuser".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(user.provider, "github");
        assert!(user.email_verified);
        assert!(user.password_hash.is_none());

        let by_identity = repo
            .get_by_provider_identity("github", "42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_identity.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let repo = test_repo().await;

        repo.create_local(local_user("dup@example.com")).await.unwrap();
        let err = repo
            .create_local(local_user("dup@example.com"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_duplicate_provider_identity_is_unique_violation() {
        let repo = test_repo().await;

        let federated = NewFederatedUser {
            provider: "github".to_string(),
            provider_id: "42".to_string(),
            email: "one@example.com".to_string(),
            display_name: "One".to_string(),
            avatar_url: None,
            github_username: None,
        };
        repo.create_federated(federated.clone()).await.unwrap();

        let err = repo
            .create_federated(NewFederatedUser {
                email: "two@example.com".to_string(),
                ..federated
            })
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_update_profile_touches_only_given_fields() {
        let repo = test_repo().await;
        let user = repo.create_local(local_user("upd@example.com")).await.unwrap();

        let updated = repo
            .update_profile(
                user.id,
                ProfileUpdate {
                    display_name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.display_name, "Renamed");
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.avatar_url, user.avatar_url);
    }

    #[tokio::test]
    async fn test_update_profile_empty_is_noop() {
        let repo = test_repo().await;
        let user = repo.create_local(local_user("noop@example.com")).await.unwrap();

        let unchanged = repo
            .update_profile(user.id, ProfileUpdate::default())
            .await
            .unwrap();
        assert_eq!(unchanged.updated_at, user.updated_at);
    }

    #[tokio::test]
    async fn test_exists_checks() {
        let repo = test_repo().await;
        let mut new_user = local_user("exists@example.com");
        new_user.github_username = Some("octocat".to_string());
        repo.create_local(new_user).await.unwrap();

        assert!(repo.email_exists("exists@example.com").await.unwrap());
        assert!(!repo.email_exists("absent@example.com").await.unwrap());
        assert!(repo.github_username_exists("octocat").await.unwrap());
        assert!(!repo.github_username_exists("nobody").await.unwrap());
    }
}
