//! Application configuration.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables with the `DEVTRACK__` prefix (`__` separator).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub github: GithubConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means CORS is effectively disabled.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// SQLite database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path. Defaults to `<data dir>/devtrack/devtrack.db`.
    pub path: Option<PathBuf>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. REQUIRED. Supports `env:VAR_NAME` indirection
    /// so the secret itself never lives in the config file.
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,

    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_ttl_secs: 60 * 60 * 24,     // 24 hours
            refresh_ttl_secs: 60 * 60 * 24 * 7, // 7 days
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Validate the authentication configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self
            .resolve_jwt_secret()?
            .ok_or(ConfigError::MissingJwtSecret)?;

        if secret == "dev-secret-change-in-production" {
            return Err(ConfigError::InsecureJwtSecret);
        }
        if secret.len() < 32 {
            return Err(ConfigError::JwtSecretTooShort);
        }
        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= 0 {
            return Err(ConfigError::InvalidTokenTtl);
        }

        Ok(())
    }

    /// Generate a random JWT secret using the OS-backed RNG.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

/// GitHub OAuth2 provider configuration.
///
/// The endpoints default to github.com but are overridable so tests can point
/// at a local stub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub client_id: Option<String>,
    /// Supports `env:VAR_NAME` indirection like the JWT secret.
    pub client_secret: Option<String>,
    pub token_url: String,
    pub user_api_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            user_api_url: "https://api.github.com/user".to_string(),
        }
    }
}

impl GithubConfig {
    /// Whether GitHub login is configured at all.
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    pub fn resolve_client_secret(&self) -> Result<Option<String>, ConfigError> {
        match &self.client_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("auth.jwt_secret is required")]
    MissingJwtSecret,

    #[error("auth.jwt_secret is a known placeholder value; generate a real secret")]
    InsecureJwtSecret,

    #[error("auth.jwt_secret must be at least 32 bytes")]
    JwtSecretTooShort,

    #[error("token TTLs must be positive")]
    InvalidTokenTtl,

    #[error("environment variable not set: {0}")]
    EnvVarNotFound(String),

    #[error("environment variable is empty: {0}")]
    EnvVarEmpty(String),
}
