//! DevTrack Backend Library
//!
//! Core components for the DevTrack backend: user accounts, local and
//! GitHub-federated authentication, and the stateless JWT session layer.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod oauth;
pub mod user;
