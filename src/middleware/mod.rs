//! Middleware components
//!
//! This module contains middleware for:
//! - Authentication (JWT bearer tokens)
//! - ProblemDetails `instance` stamping

pub mod auth;
pub mod problem;

pub use auth::{auth_middleware, create_access_token, AuthUser, Claims};
pub use problem::problem_instance_middleware;
