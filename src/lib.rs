//! Audit Slice Library
//!
//! Paginated audit record service (axum + SQLite) and the typed HTTP client
//! that consumes it.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use client::{ApiClient, ApiError, ApiErrorKind, ClientConfig};
pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
}
