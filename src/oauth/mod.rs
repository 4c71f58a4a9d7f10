//! Federated login: provider attribute resolution, the GitHub HTTP client
//! and reconciliation of federated identities against local accounts.

mod github;
mod reconcile;
mod resolver;

pub use github::GithubClient;
pub use reconcile::IdentityReconciler;
pub use resolver::{FederatedIdentity, GithubResolver, IdentityResolver, ResolverRegistry};
