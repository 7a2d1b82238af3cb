//! Audit record repository

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::{
    query::{Query, QueryAs},
    sqlite::SqliteArguments,
    Sqlite, SqlitePool,
};
use tracing::debug;

use crate::models::{fold_case, AuditQuery, AuditRecord, NewAuditRecord};

const AUDIT_COLUMNS: &str = "audit_id, operation, entity_type, entity_id, user_id, user_name, \
    timestamp, ip_address, user_agent, old_values, new_values, context, http_method, endpoint, \
    is_success, error_message, organization_id, tags, duration_ms, correlation_id";

/// Case-folded copies of the columns searched by `searchTerm`
const SEARCH_COLUMNS: [&str; 5] = [
    "operation_lc",
    "entity_type_lc",
    "user_name_lc",
    "endpoint_lc",
    "context_lc",
];

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    audit_id: i64,
    operation: String,
    entity_type: String,
    entity_id: String,
    user_id: String,
    user_name: String,
    timestamp: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    old_values: Option<String>,
    new_values: Option<String>,
    context: Option<String>,
    http_method: Option<String>,
    endpoint: Option<String>,
    is_success: bool,
    error_message: Option<String>,
    organization_id: Option<String>,
    tags: Option<String>,
    duration_ms: Option<i64>,
    correlation_id: Option<String>,
}

/// A value bound into a filter clause
#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Text(String),
    Flag(bool),
}

/// WHERE clause (possibly empty) and its positional arguments
#[derive(Debug, Default)]
struct FilterClause {
    sql: String,
    args: Vec<FilterArg>,
}

impl FilterClause {
    fn from_query(query: &AuditQuery) -> Self {
        let mut conditions: Vec<String> = Vec::new();
        let mut args = Vec::new();

        if let Some(org) = query.organization_filter() {
            conditions.push("organization_id = ?".to_string());
            args.push(FilterArg::Text(org));
        }

        // instr() is case-sensitive, unlike LIKE
        let substring_filters = [
            ("operation", query.operation_filter()),
            ("entity_type", query.entity_type_filter()),
            ("user_id", query.user_id_filter()),
            ("user_name", query.user_name_filter()),
        ];
        for (column, value) in substring_filters {
            if let Some(value) = value {
                conditions.push(format!("instr({}, ?) > 0", column));
                args.push(FilterArg::Text(value.to_string()));
            }
        }

        if let Some(start) = query.start_date {
            conditions.push("timestamp >= ?".to_string());
            args.push(FilterArg::Text(format_db_timestamp(&ceil_to_micros(start))));
        }
        if let Some(end) = query.end_date {
            conditions.push("timestamp <= ?".to_string());
            args.push(FilterArg::Text(format_db_timestamp(&end)));
        }

        if let Some(is_success) = query.is_success {
            conditions.push("is_success = ?".to_string());
            args.push(FilterArg::Flag(is_success));
        }

        if let Some(term) = query.search_filter() {
            let any_column = SEARCH_COLUMNS
                .iter()
                .map(|column| format!("instr({}, ?) > 0", column))
                .collect::<Vec<_>>()
                .join(" OR ");
            conditions.push(format!("({})", any_column));
            for _ in SEARCH_COLUMNS {
                args.push(FilterArg::Text(term.clone()));
            }
        }

        let sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        Self { sql, args }
    }
}

fn bind_args<'q, O>(
    mut q: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    args: &[FilterArg],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for arg in args {
        q = match arg {
            FilterArg::Text(value) => q.bind(value.clone()),
            FilterArg::Flag(value) => q.bind(*value),
        };
    }
    q
}

fn insert_query(record: &NewAuditRecord) -> Result<Query<'_, Sqlite, SqliteArguments<'_>>> {
    if let Some(ms) = record.duration_ms {
        anyhow::ensure!(ms >= 0, "durationMs must be non-negative, got {}", ms);
    }

    Ok(sqlx::query(
        r#"
        INSERT INTO audit (operation, entity_type, entity_id, user_id, user_name, timestamp,
            ip_address, user_agent, old_values, new_values, context, http_method, endpoint,
            is_success, error_message, organization_id, tags, duration_ms, correlation_id,
            operation_lc, entity_type_lc, user_name_lc, endpoint_lc, context_lc)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.operation)
    .bind(&record.entity_type)
    .bind(&record.entity_id)
    .bind(&record.user_id)
    .bind(&record.user_name)
    .bind(format_db_timestamp(&record.timestamp))
    .bind(record.ip_address.as_deref())
    .bind(record.user_agent.as_deref())
    .bind(record.old_values.as_deref())
    .bind(record.new_values.as_deref())
    .bind(record.context.as_deref())
    .bind(record.http_method.as_deref())
    .bind(record.endpoint.as_deref())
    .bind(record.is_success)
    .bind(record.error_message.as_deref())
    .bind(record.organization_id.as_deref())
    .bind(record.tags.as_deref())
    .bind(record.duration_ms)
    .bind(record.correlation_id.as_deref())
    .bind(fold_case(&record.operation))
    .bind(fold_case(&record.entity_type))
    .bind(fold_case(&record.user_name))
    .bind(record.endpoint.as_deref().map(fold_case).unwrap_or_default())
    .bind(record.context.as_deref().map(fold_case).unwrap_or_default()))
}

pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a record; the store assigns the next `audit_id`.
    pub async fn insert(&self, record: &NewAuditRecord) -> Result<i64> {
        let result = insert_query(record)?
            .execute(self.pool)
            .await
            .context("Failed to insert audit record")?;
        Ok(result.last_insert_rowid())
    }

    /// Append many records in one transaction.
    pub async fn insert_many(&self, records: &[NewAuditRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for record in records {
            insert_query(record)?
                .execute(&mut *tx)
                .await
                .context("Failed to insert audit record")?;
        }
        tx.commit().await.context("Failed to commit audit records")?;
        Ok(records.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM audit)")
            .fetch_one(self.pool)
            .await
            .context("Failed to probe audit table")?;
        Ok(row.0 == 0)
    }

    /// Number of records matching the filters of `query` (paging ignored).
    pub async fn count(&self, query: &AuditQuery) -> Result<i64> {
        let filter = FilterClause::from_query(query);
        let sql = format!("SELECT COUNT(*) FROM audit{}", filter.sql);
        let row: (i64,) = bind_args(sqlx::query_as(&sql), &filter.args)
            .fetch_one(self.pool)
            .await
            .context("Failed to count audit records")?;
        Ok(row.0)
    }

    /// One page of matching records, newest first, ties by descending id.
    pub async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        let filter = FilterClause::from_query(query);
        let sql = format!(
            "SELECT {} FROM audit{} ORDER BY timestamp DESC, audit_id DESC LIMIT ? OFFSET ?",
            AUDIT_COLUMNS, filter.sql
        );
        debug!(sql = %sql, args = filter.args.len(), "Listing audit records");

        let rows = bind_args(sqlx::query_as::<_, AuditRow>(&sql), &filter.args)
            .bind(query.page_size)
            .bind(query.offset())
            .fetch_all(self.pool)
            .await
            .context("Failed to list audit records")?;

        rows.into_iter().map(row_to_record).collect()
    }
}

/// Fixed-width UTC text, so that lexical order is chronological order.
pub fn format_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Round up to the next whole microsecond, the precision of stored timestamps.
fn ceil_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let sub_micro = i64::from(ts.timestamp_subsec_nanos() % 1_000);
    if sub_micro == 0 {
        return ts;
    }
    ts.checked_add_signed(TimeDelta::nanoseconds(1_000 - sub_micro))
        .unwrap_or(ts)
}

fn parse_db_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in audit table: {}", ts))
}

fn row_to_record(row: AuditRow) -> Result<AuditRecord> {
    Ok(AuditRecord {
        audit_id: row.audit_id,
        operation: row.operation,
        entity_type: row.entity_type,
        entity_id: row.entity_id,
        user_id: row.user_id,
        user_name: row.user_name,
        timestamp: parse_db_timestamp(&row.timestamp)?,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        old_values: row.old_values,
        new_values: row.new_values,
        context: row.context,
        http_method: row.http_method,
        endpoint: row.endpoint,
        is_success: row.is_success,
        error_message: row.error_message,
        organization_id: row.organization_id,
        tags: row.tags,
        duration_ms: row.duration_ms,
        correlation_id: row.correlation_id,
    })
}
