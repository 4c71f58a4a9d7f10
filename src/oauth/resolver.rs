//! Mapping of provider-specific attribute maps to a common identity shape.

use std::collections::HashMap;

use anyhow::anyhow;
use serde_json::{Map, Value};

use crate::auth::AuthError;
use crate::user::GITHUB_PROVIDER;

/// Provider-neutral view of a federated login, extracted from the raw
/// attribute map a provider's user API returns.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub provider: String,
    /// The provider's stable id for this account, as a string.
    pub provider_id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// The provider-side username (GitHub login), where the provider has one.
    pub provider_username: Option<String>,
}

/// Extracts a [`FederatedIdentity`] from one provider's attribute map.
pub trait IdentityResolver: Send + Sync {
    /// Provider key this resolver handles, e.g. `"github"`.
    fn provider(&self) -> &'static str;

    fn resolve(&self, attributes: &Map<String, Value>) -> Result<FederatedIdentity, AuthError>;
}

/// Lookup table from provider key to resolver. Adding a provider means
/// registering a resolver here, nothing else in the login path changes.
pub struct ResolverRegistry {
    resolvers: HashMap<&'static str, Box<dyn IdentityResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Registry with every built-in resolver registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(GithubResolver);
        registry
    }

    pub fn register<R: IdentityResolver + 'static>(&mut self, resolver: R) {
        self.resolvers.insert(resolver.provider(), Box::new(resolver));
    }

    pub fn resolve(
        &self,
        provider: &str,
        attributes: &Map<String, Value>,
    ) -> Result<FederatedIdentity, AuthError> {
        let resolver = self
            .resolvers
            .get(provider)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.to_string()))?;
        resolver.resolve(attributes)
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Resolver for the GitHub user API payload.
pub struct GithubResolver;

impl IdentityResolver for GithubResolver {
    fn provider(&self) -> &'static str {
        GITHUB_PROVIDER
    }

    fn resolve(&self, attributes: &Map<String, Value>) -> Result<FederatedIdentity, AuthError> {
        // `id` is numeric in the GitHub payload; stored as its decimal string.
        let provider_id = match attributes.get("id") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => {
                return Err(AuthError::Internal(anyhow!(
                    "GitHub user payload has no usable id"
                )));
            }
        };

        let login = string_attr(attributes, "login");

        // The display name is optional on GitHub; fall back to the login.
        let display_name = string_attr(attributes, "name")
            .or_else(|| login.clone())
            .ok_or_else(|| {
                AuthError::Internal(anyhow!("GitHub user payload has neither name nor login"))
            })?;

        Ok(FederatedIdentity {
            provider: GITHUB_PROVIDER.to_string(),
            provider_id,
            email: string_attr(attributes, "email"),
            display_name,
            avatar_url: string_attr(attributes, "avatar_url"),
            provider_username: login,
        })
    }
}

fn string_attr(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    match attributes.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
