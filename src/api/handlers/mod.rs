//! Request handlers.

pub mod auth;
pub mod misc;
pub mod oauth;
