//! Athenaeum Library Lending Server
//!
//! REST JSON API for a library catalogue (authors, books), member accounts
//! and profiles, and the borrowing lifecycle, secured by bearer tokens and a
//! route-level access policy.

use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub policy: Arc<auth::AccessPolicy>,
}
