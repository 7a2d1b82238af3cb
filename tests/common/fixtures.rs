//! Test fixtures for common test data
//!
//! Fixtures provide pre-defined audit records that can be used across
//! multiple tests. Timestamps are fixed so orderings are reproducible.

use chrono::{DateTime, Duration, TimeZone, Utc};

use audit_slice::models::NewAuditRecord;

/// 2025-01-01T00:00:00Z
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Minimal successful record at `base_time() + minutes`
pub fn record_at(minutes: i64, operation: &str) -> NewAuditRecord {
    NewAuditRecord {
        operation: operation.to_string(),
        entity_type: "Node".to_string(),
        entity_id: minutes.to_string(),
        user_id: "u-1".to_string(),
        user_name: "alice@example.com".to_string(),
        timestamp: base_time() + Duration::minutes(minutes),
        is_success: true,
        duration_ms: Some(12),
        ..Default::default()
    }
}

/// Hand-written records covering every filter
pub struct AuditFixtures;

impl AuditFixtures {
    /// Ten records; ids 1..=10 in insertion order.
    ///
    /// - ids 3 and 4 share a timestamp
    /// - "login" appears in operation (1), endpoint (5), context (6) and user name (7)
    /// - ids 2 and 8 failed
    /// - ids 2, 5 and 9 belong to organization 7
    pub fn sample() -> Vec<NewAuditRecord> {
        let mut records: Vec<NewAuditRecord> = (1..=10)
            .map(|i| record_at(i * 60, "UPDATE"))
            .collect();

        records[0].operation = "LOGIN".to_string();
        records[0].entity_type = "User".to_string();

        records[1].is_success = false;
        records[1].error_message = Some("Simulated failure".to_string());
        records[1].organization_id = Some("7".to_string());

        records[3].timestamp = records[2].timestamp;

        records[4].endpoint = Some("/api/v1/Login".to_string());
        records[4].organization_id = Some("7".to_string());

        records[5].context = Some("batch LOGIN replay".to_string());

        records[6].user_name = "login-bot".to_string();
        records[6].user_id = "u-9".to_string();

        records[7].is_success = false;
        records[7].error_message = Some("Simulated failure".to_string());
        records[7].operation = "DELETE".to_string();

        records[8].organization_id = Some("7".to_string());
        records[8].entity_type = "Organization".to_string();

        records
    }

    /// `count` records one minute apart
    pub fn linear(count: usize) -> Vec<NewAuditRecord> {
        (0..count as i64).map(|i| record_at(i, "READ")).collect()
    }
}
