//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, Router};

use crate::{middleware, AppState};

mod audit;
mod health;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}

/// Protected API routes (authentication required when enabled)
pub fn protected_routes() -> Router<AppState> {
    Router::new().nest("/audit", audit::routes())
}

/// Create the full API router (public + protected; useful for tests)
pub fn routes() -> Router<AppState> {
    public_routes().merge(protected_routes())
}

/// The HTTP application without static hosting or transport layers.
///
/// Mounts the API under `/api/v1`, guards the protected routes with the
/// bearer-token middleware and stamps ProblemDetails with the request path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", public_routes())
        .nest(
            "/api/v1",
            protected_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth_middleware,
            )),
        )
        .layer(axum::middleware::from_fn(
            middleware::problem_instance_middleware,
        ))
        .with_state(state)
}
