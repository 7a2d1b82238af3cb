//! Health check endpoints
//!
//! Provides health check endpoints for monitoring and load balancers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};
use crate::{db, AppState};

/// Basic health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness check (for load balancers)
///
/// Returns 200 OK if the service is running.
/// Does not check component health.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Liveness probe (for Kubernetes)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe (for Kubernetes)
///
/// Returns 200 OK once the audit store answers queries, 503 ProblemDetails otherwise.
pub async fn readiness(State(state): State<AppState>) -> AppResult<StatusCode> {
    db::check_health(&state.db).await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::service_unavailable("Audit store is not available")
    })?;
    Ok(StatusCode::OK)
}
