//! Typed audit endpoint

use super::{encode_query, ApiClient, ApiError};
use crate::models::{AuditQuery, AuditRecord, PagedResponse};

/// `GET /audit` through an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct AuditEndpoint {
    client: ApiClient,
}

impl AuditEndpoint {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Path and query string for `query`.
    pub fn path_for(query: &AuditQuery) -> String {
        format!("/api/v1/audit?{}", encode_query(query.to_query_pairs()))
    }

    /// One page of audit records.
    ///
    /// Accepts the envelope either bare or wrapped in an outer `data` member.
    pub async fn get_records(&self, query: &AuditQuery) -> Result<PagedResponse<AuditRecord>, ApiError> {
        let response = self.client.get(&Self::path_for(query)).await?;
        response.extract()
    }
}
