//! Audit record models and the audit listing query

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Smallest page size accepted by the audit listing.
pub const MIN_PAGE_SIZE: i64 = 1;
/// Largest page size accepted by the audit listing.
pub const MAX_PAGE_SIZE: i64 = 100;
/// Page size used when the caller does not pass one.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// An immutable audit event as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub audit_id: i64,
    pub operation: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Previous state as opaque JSON text (UPDATE only)
    #[serde(default)]
    pub old_values: Option<String>,
    /// New state as opaque JSON text (CREATE and UPDATE only)
    #[serde(default)]
    pub new_values: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub is_success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// An audit event awaiting ingestion; the store assigns `audit_id`.
#[derive(Debug, Clone, Default)]
pub struct NewAuditRecord {
    pub operation: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub context: Option<String>,
    pub http_method: Option<String>,
    pub endpoint: Option<String>,
    pub is_success: bool,
    pub error_message: Option<String>,
    pub organization_id: Option<String>,
    pub tags: Option<String>,
    pub duration_ms: Option<i64>,
    pub correlation_id: Option<String>,
}

/// Reasons an [`AuditQuery`] is rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryValidationError {
    #[error("Page must be greater than 0")]
    PageOutOfRange,
    #[error("PageSize must be between 1 and 100")]
    PageSizeOutOfRange,
    #[error("StartDate must be before EndDate")]
    InvertedDateRange,
}

/// Parameters of `GET /api/v1/audit`.
///
/// All filters are ANDed together. String filters other than `search_term`
/// are case-sensitive substring matches; `search_term` is case-insensitive and
/// matches when any of operation, entity type, user name, endpoint or context
/// contains it. Blank string filters are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub organization_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "instant_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "instant_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            organization_id: None,
            operation: None,
            entity_type: None,
            user_id: None,
            user_name: None,
            start_date: None,
            end_date: None,
            is_success: None,
            search_term: None,
        }
    }
}

impl AuditQuery {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn organization_id(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn is_success(mut self, is_success: bool) -> Self {
        self.is_success = Some(is_success);
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// Check the paging bounds and the date range, in that order.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        if self.page < 1 {
            return Err(QueryValidationError::PageOutOfRange);
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(QueryValidationError::PageSizeOutOfRange);
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(QueryValidationError::InvertedDateRange);
            }
        }
        Ok(())
    }

    /// Number of filtered rows skipped before the requested page.
    ///
    /// Saturates at `i64::MAX`, which lies past the end of any store.
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size)
    }

    /// The organization filter in the decimal form used by the store.
    pub fn organization_filter(&self) -> Option<String> {
        self.organization_id.map(|id| id.to_string())
    }

    pub fn operation_filter(&self) -> Option<&str> {
        non_blank(&self.operation)
    }

    pub fn entity_type_filter(&self) -> Option<&str> {
        non_blank(&self.entity_type)
    }

    pub fn user_id_filter(&self) -> Option<&str> {
        non_blank(&self.user_id)
    }

    pub fn user_name_filter(&self) -> Option<&str> {
        non_blank(&self.user_name)
    }

    /// Lower-cased search term, if one was given.
    pub fn search_filter(&self) -> Option<String> {
        non_blank(&self.search_term).map(fold_case)
    }

    /// Whether a record passes every filter of this query.
    ///
    /// This is the reference predicate the SQL in `AuditRepository` implements.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(org) = self.organization_filter() {
            if record.organization_id.as_deref() != Some(org.as_str()) {
                return false;
            }
        }
        let substring_filters = [
            (self.operation_filter(), record.operation.as_str()),
            (self.entity_type_filter(), record.entity_type.as_str()),
            (self.user_id_filter(), record.user_id.as_str()),
            (self.user_name_filter(), record.user_name.as_str()),
        ];
        for (filter, value) in substring_filters {
            if let Some(needle) = filter {
                if !value.contains(needle) {
                    return false;
                }
            }
        }
        if let Some(start) = self.start_date {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if record.timestamp > end {
                return false;
            }
        }
        if let Some(is_success) = self.is_success {
            if record.is_success != is_success {
                return false;
            }
        }
        if let Some(term) = self.search_filter() {
            let haystacks = [
                Some(record.operation.as_str()),
                Some(record.entity_type.as_str()),
                Some(record.user_name.as_str()),
                record.endpoint.as_deref(),
                record.context.as_deref(),
            ];
            let hit = haystacks
                .into_iter()
                .flatten()
                .any(|field| fold_case(field).contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Encode the query as `name=value` pairs in wire (camelCase) form.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(org) = self.organization_id {
            pairs.push(("organizationId", org.to_string()));
        }
        let strings = [
            ("operation", &self.operation),
            ("entityType", &self.entity_type),
            ("userId", &self.user_id),
            ("userName", &self.user_name),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                pairs.push((name, value.clone()));
            }
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate", format_instant(&start)));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate", format_instant(&end)));
        }
        if let Some(is_success) = self.is_success {
            pairs.push(("isSuccess", is_success.to_string()));
        }
        if let Some(ref term) = self.search_term {
            pairs.push(("searchTerm", term.clone()));
        }
        pairs
    }
}

/// Total order of the listing: newest first, higher id first on ties.
pub fn listing_order(a: &AuditRecord, b: &AuditRecord) -> std::cmp::Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.audit_id.cmp(&a.audit_id))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Case folding used by `searchTerm` on both the term and the record fields.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// RFC 3339 with a `Z` suffix, as sent on the wire.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an instant from a query parameter.
///
/// Accepts RFC 3339, and naive date-times or dates which are taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn instant_or_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_instant(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date-time: {}", s))),
    }
}
