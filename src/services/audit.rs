//! Audit listing service
//!
//! Validates an [`AuditQuery`], runs the count and page queries against the
//! store and assembles the paged envelope.

use tracing::debug;

use crate::db::{AuditRepository, DbPool};
use crate::models::{AuditQuery, AuditRecord, PagedResponse};
use crate::utils::error::AppResult;

pub struct AuditService<'a> {
    pool: &'a DbPool,
}

impl<'a> AuditService<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// One page of audit records, newest first.
    ///
    /// A page past the end yields an empty `data` array with the real totals.
    #[tracing::instrument(skip(self), fields(page = query.page, page_size = query.page_size))]
    pub async fn get_records(&self, query: &AuditQuery) -> AppResult<PagedResponse<AuditRecord>> {
        query.validate()?;

        let repo = AuditRepository::new(self.pool);
        let total_items = repo.count(query).await?;

        let data = if query.offset() < total_items {
            repo.list(query).await?
        } else {
            Vec::new()
        };

        debug!(total_items, returned = data.len(), "Audit page assembled");
        Ok(PagedResponse::new(data, query.page, query.page_size, total_items))
    }
}
