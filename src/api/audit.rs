//! Audit listing endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Extension, Json, Router,
};
use tracing::debug;

use crate::{
    middleware::AuthUser,
    models::{AuditQuery, AuditRecord, PagedResponse},
    services::AuditService,
    utils::error::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_audit_records))
}

/// GET /api/v1/audit
async fn list_audit_records(
    State(state): State<AppState>,
    caller: Option<Extension<AuthUser>>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> AppResult<Json<PagedResponse<AuditRecord>>> {
    let Query(query) = query.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    if let Some(Extension(ref user)) = caller {
        debug!(subject = %user.subject, "Audit listing requested");
    }

    let page = AuditService::new(&state.db).get_records(&query).await?;
    Ok(Json(page))
}
