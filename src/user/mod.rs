//! User accounts: data models and database access.

mod models;
mod repository;

pub use models::{
    GITHUB_PROVIDER, LOCAL_PROVIDER, NewFederatedUser, NewLocalUser, ProfileUpdate, User,
    UserProfile,
};
pub use repository::UserRepository;
pub(crate) use repository::is_unique_violation;
