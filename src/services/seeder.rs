//! Audit store seeding
//!
//! Fills an empty audit table with plausible generated events so the listing
//! has something to show in demos and end-to-end tests.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::SeedConfig;
use crate::db::{AuditRepository, DbPool};
use crate::models::NewAuditRecord;

const OPERATIONS: &[&str] = &[
    "CREATE", "UPDATE", "DELETE", "READ", "LOGIN", "LOGOUT", "IMPORT", "EXPORT", "PATCH",
];
const ENTITY_TYPES: &[&str] = &[
    "Node",
    "Organization",
    "User",
    "RiskLink",
    "NodeType",
    "Geography",
    "Alert",
    "Report",
];
const USERS: &[(&str, &str)] = &[
    ("u-1", "alice@example.com"),
    ("u-2", "bob@example.com"),
    ("u-3", "carol@example.com"),
    ("u-4", "dave@example.com"),
    ("u-5", "eve@example.com"),
];
const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];
const ENDPOINTS: &[&str] = &[
    "/api/v1/nodes",
    "/api/v1/organizations",
    "/api/v1/audit",
    "/api/v1/node-types",
    "/api/v1/risk-links",
];
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0",
    "curl/7.79.1",
    "PostmanRuntime/7.29.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
];

/// Seed the store when it is empty. Returns the number of records inserted.
pub async fn seed_if_empty(pool: &DbPool, config: &SeedConfig) -> Result<usize> {
    if !config.enabled {
        info!("Seeding disabled");
        return Ok(0);
    }

    let repo = AuditRepository::new(pool);
    if !repo.is_empty().await? {
        info!("Audit store already populated, skipping seed");
        return Ok(0);
    }

    let records = generate_records(&mut rand::thread_rng(), config.record_count, Utc::now());
    let inserted = repo.insert_many(&records).await?;
    info!(dataset = %config.dataset, inserted, "Seeded audit store");
    Ok(inserted)
}

/// Generate `count` events spread over the 90 days before `now`.
pub fn generate_records<R: Rng>(rng: &mut R, count: usize, now: DateTime<Utc>) -> Vec<NewAuditRecord> {
    (0..count).map(|_| generate_record(rng, now)).collect()
}

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn generate_record<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> NewAuditRecord {
    let operation = pick(rng, OPERATIONS);
    let entity_type = pick(rng, ENTITY_TYPES);
    let (user_id, user_name) = USERS.choose(rng).copied().unwrap_or(("u-0", "system"));

    let timestamp = now
        - Duration::days(rng.gen_range(0..90))
        - Duration::seconds(rng.gen_range(0..86_400));

    let mut snapshot = |label: &str, max: u32| {
        json!({ "name": format!("{}-{}-{}", entity_type, label, rng.gen_range(1..max)) }).to_string()
    };
    let (old_values, new_values) = match operation {
        "UPDATE" => (Some(snapshot("old", 1000)), Some(snapshot("new", 1000))),
        "CREATE" => (None, Some(snapshot("created", 10_000))),
        _ => (None, None),
    };

    let is_success = rng.gen_bool(0.95);

    NewAuditRecord {
        operation: operation.to_string(),
        entity_type: entity_type.to_string(),
        entity_id: rng.gen_range(1..2000).to_string(),
        user_id: user_id.to_string(),
        user_name: user_name.to_string(),
        timestamp,
        ip_address: Some(format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..255),
            rng.gen_range(0..255),
            rng.gen_range(0..255),
            rng.gen_range(0..255)
        )),
        user_agent: Some(pick(rng, USER_AGENTS).to_string()),
        old_values,
        new_values,
        context: rng.gen_bool(0.1).then(|| "batch-import".to_string()),
        http_method: Some(pick(rng, METHODS).to_string()),
        endpoint: Some(pick(rng, ENDPOINTS).to_string()),
        is_success,
        error_message: (!is_success).then(|| "Simulated failure: unexpected error".to_string()),
        organization_id: rng.gen_bool(0.3).then(|| rng.gen_range(1..20).to_string()),
        tags: rng.gen_bool(0.15).then(|| "automated,import".to_string()),
        duration_ms: Some(rng.gen_range(5..5000)),
        correlation_id: Some(Uuid::new_v4().to_string()),
    }
}
