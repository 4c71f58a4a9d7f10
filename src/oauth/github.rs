//! GitHub OAuth2 HTTP client: code exchange and user fetch.

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::GithubConfig;

const USER_AGENT: &str = concat!("devtrack/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Client for GitHub's OAuth2 token endpoint and user API.
///
/// Endpoint URLs come from configuration so tests can point the client at a
/// local stub server.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    user_api_url: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| anyhow!("GitHub client id is not configured"))?;
        let client_secret = config
            .resolve_client_secret()
            .context("failed to resolve GitHub client secret")?
            .ok_or_else(|| anyhow!("GitHub client secret is not configured"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            token_url: config.token_url.clone(),
            user_api_url: config.user_api_url.clone(),
        })
    }

    /// Exchange an authorization code for an access token.
    ///
    /// The code is single-use and short-lived, so it is safe to pass around,
    /// but the resulting token never leaves this module's callers.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        debug!("exchanging GitHub authorization code");

        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .context("GitHub token request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("GitHub token endpoint returned {status}");
        }

        // GitHub reports errors with a 200 status and an error body.
        let body: TokenResponse = response
            .json()
            .await
            .context("GitHub token response is not valid JSON")?;

        if let Some(error) = body.error {
            let description = body.error_description.unwrap_or_default();
            bail!("GitHub refused the code exchange: {error} {description}");
        }

        body.access_token
            .ok_or_else(|| anyhow!("GitHub token response carries no access token"))
    }

    /// Fetch the authenticated user's raw attribute map.
    #[instrument(skip(self, access_token))]
    pub async fn fetch_user(&self, access_token: &str) -> Result<Map<String, Value>> {
        let response = self
            .http
            .get(&self.user_api_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .context("GitHub user request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("GitHub user endpoint returned {status}");
        }

        match response
            .json()
            .await
            .context("GitHub user response is not valid JSON")?
        {
            Value::Object(attrs) => Ok(attrs),
            other => bail!("GitHub user response is not an object: {other}"),
        }
    }
}
