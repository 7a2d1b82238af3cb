//! API integration tests
//!
//! Tests for the audit listing and health endpoints through the full router
//! (authentication, ProblemDetails rendering and the in-memory store).

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rstest::rstest;
use serde_json::Value;

use audit_slice::db::AuditRepository;
use audit_slice::models::{
    listing_order, AuditQuery, AuditRecord, NewAuditRecord, PagedResponse, ProblemDetails,
    DEFAULT_PROBLEM_TITLE,
};

use crate::common::{open_config, record_at, AuditFixtures, AuditRecordFactory, TestApp};

type Page = PagedResponse<AuditRecord>;

async fn fetch(app: &TestApp, query: &str) -> Page {
    let response = app.get_authed(&format!("/api/v1/audit{}", query)).await;
    response.assert_ok();
    response.json()
}

/// Every page for the `filters` query string, concatenated
async fn fetch_all(app: &TestApp, filters: &str, page_size: i64) -> (Page, Vec<AuditRecord>) {
    let page_query = |page: i64| {
        let mut query = format!("?page={}&pageSize={}", page, page_size);
        if !filters.is_empty() {
            query.push('&');
            query.push_str(filters);
        }
        query
    };

    let first = fetch(app, &page_query(1)).await;
    let mut all = first.data.clone();
    for page in 2..=first.pagination.total_pages {
        all.extend(fetch(app, &page_query(page)).await.data);
    }
    (first, all)
}

fn assert_ordered(records: &[AuditRecord]) {
    for pair in records.windows(2) {
        assert_eq!(
            listing_order(&pair[0], &pair[1]),
            std::cmp::Ordering::Less,
            "records {} and {} are out of order",
            pair[0].audit_id,
            pair[1].audit_id
        );
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let app = TestApp::new().await;

        let response = app.get("/health").await;

        response.assert_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_api_health_is_public() {
        let app = TestApp::new().await;

        app.get("/api/v1/health").await.assert_ok();
        app.get("/api/v1/health/live").await.assert_ok();
        app.get("/api/v1/health/ready").await.assert_ok();
    }

    #[tokio::test]
    async fn test_readiness_fails_without_database() {
        let app = TestApp::new().await;
        app.state.db.close().await;

        let response = app.get("/api/v1/health/ready").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.header("content-type"),
            Some("application/problem+json")
        );
        let problem: ProblemDetails = response.json();
        assert_eq!(problem.status, Some(503));
        assert_eq!(problem.detail.as_deref(), Some("Audit store is not available"));
        assert_eq!(problem.instance.as_deref(), Some("/api/v1/health/ready"));
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_challenged() {
        let app = TestApp::new().await;

        let response = app.get("/api/v1/audit").await;

        response.assert_unauthorized();
        assert_eq!(
            response.header("www-authenticate"),
            Some("Bearer realm=\"audit-slice\"")
        );
        let problem: ProblemDetails = response.json();
        assert_eq!(problem.status, Some(401));
        assert_eq!(problem.instance.as_deref(), Some("/api/v1/audit"));
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let app = TestApp::new().await;

        let response = app.get_with_token("/api/v1/audit", "not-a-jwt").await;

        response.assert_unauthorized();
        let challenge = response.header("www-authenticate").unwrap();
        assert!(challenge.starts_with("Bearer realm=\"audit-slice\""));
        assert!(challenge.contains("error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let app = TestApp::new().await;
        let mut other = app.state.config.auth.clone();
        other.jwt_secret = "another_secret_key_that_is_at_least_32_bytes".to_string();
        let token = audit_slice::middleware::create_access_token("mallory", &other).unwrap();

        app.get_with_token("/api/v1/audit", &token)
            .await
            .assert_unauthorized();
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        let app = TestApp::new().await;

        app.get_authed("/api/v1/audit").await.assert_ok();
    }

    #[tokio::test]
    async fn test_disabled_auth_opens_the_route() {
        let app = TestApp::with_config(open_config()).await;

        app.get("/api/v1/audit").await.assert_ok();
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn test_default_page_of_seeded_store() {
        let app = TestApp::seeded(500).await;

        let page = fetch(&app, "").await;

        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.page_size, 50);
        assert_eq!(page.pagination.total_pages, 10);
        assert_eq!(page.pagination.total_items, 500);
        assert!(page.pagination.has_next_page);
        assert!(!page.pagination.has_previous_page);
        assert_eq!(page.data.len(), 50);
        assert_ordered(&page.data);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let app = TestApp::new().await;

        let page = fetch(&app, "").await;

        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_items, 0);
        assert_eq!(page.pagination.total_pages, 0);
        assert!(!page.pagination.has_next_page);
        assert!(!page.pagination.has_previous_page);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let app = TestApp::with_records(&AuditFixtures::linear(12)).await;

        let page = fetch(&app, "?page=5&pageSize=5").await;

        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_items, 12);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(!page.pagination.has_next_page);
        assert!(page.pagination.has_previous_page);
    }

    #[tokio::test]
    async fn test_largest_page_number_is_past_the_end() {
        let app = TestApp::with_records(&AuditFixtures::linear(60)).await;

        let page = fetch(&app, &format!("?page={}&pageSize=50", i64::MAX)).await;

        assert!(page.data.is_empty());
        assert_eq!(page.pagination.page, i64::MAX);
        assert_eq!(page.pagination.total_items, 60);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(!page.pagination.has_next_page);
        assert!(page.pagination.has_previous_page);
        assert_eq!(page.pagination.expected_len(), 0);
    }

    #[tokio::test]
    async fn test_last_page_is_partial() {
        let app = TestApp::with_records(&AuditFixtures::linear(12)).await;

        let page = fetch(&app, "?page=3&pageSize=5").await;

        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.expected_len(), 2);
        assert_eq!(
            page.data.iter().map(|r| r.audit_id).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[tokio::test]
    async fn test_timestamp_ties_break_on_id() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let page = fetch(&app, "").await;

        let ids: Vec<i64> = page.data.iter().map(|r| r.audit_id).collect();
        assert_eq!(ids, vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(page.data[6].timestamp, page.data[7].timestamp);
    }

    #[tokio::test]
    async fn test_wire_format_is_camel_case() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let response = app.get_authed("/api/v1/audit?pageSize=1").await;
        let body: Value = response.json();

        let record = &body["data"][0];
        assert_eq!(record["auditId"], 10);
        assert!(record.get("entityType").is_some());
        assert!(record.get("isSuccess").is_some());
        let pagination = &body["pagination"];
        assert_eq!(pagination["pageSize"], 1);
        assert_eq!(pagination["totalItems"], 10);
        assert_eq!(pagination["hasNextPage"], true);
        assert_eq!(pagination["hasPreviousPage"], false);
    }
}

mod filters {
    use super::*;

    #[tokio::test]
    async fn test_search_matches_any_field_ignoring_case() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let page = fetch(&app, "?searchTerm=LOGIN").await;

        let mut ids: Vec<i64> = page.data.iter().map(|r| r.audit_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 5, 6, 7]);
        assert_eq!(page.pagination.total_items, 4);
        for record in &page.data {
            let haystack = [
                Some(record.operation.as_str()),
                Some(record.entity_type.as_str()),
                Some(record.user_name.as_str()),
                record.endpoint.as_deref(),
                record.context.as_deref(),
            ];
            assert!(haystack
                .iter()
                .flatten()
                .any(|field| field.to_lowercase().contains("login")));
        }

        let app = TestApp::with_records(&[
            NewAuditRecord {
                context: Some("ÜBERWEISUNG".to_string()),
                ..record_at(1, "EXPORT")
            },
            record_at(2, "READ"),
        ])
        .await;
        for term in ["ÜBERWEISUNG", "überweisung", "Überweisung"] {
            let page = fetch(&app, &format!("?searchTerm={}", urlencoding::encode(term))).await;
            assert_eq!(page.pagination.total_items, 1, "term {}", term);
            assert_eq!(page.data[0].audit_id, 1);
        }
    }

    #[tokio::test]
    async fn test_organization_is_exact_match() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let page = fetch(&app, "?organizationId=7").await;

        let mut ids: Vec<i64> = page.data.iter().map(|r| r.audit_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[tokio::test]
    async fn test_string_filters_are_case_sensitive() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        assert_eq!(fetch(&app, "?operation=LOG").await.pagination.total_items, 1);
        assert_eq!(fetch(&app, "?operation=log").await.pagination.total_items, 0);
        assert_eq!(fetch(&app, "?entityType=Organ").await.pagination.total_items, 1);
        assert_eq!(fetch(&app, "?userId=u-9").await.pagination.total_items, 1);
        assert_eq!(fetch(&app, "?userName=alice").await.pagination.total_items, 9);
    }

    #[tokio::test]
    async fn test_success_flag() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let failed = fetch(&app, "?isSuccess=false").await;

        assert_eq!(failed.pagination.total_items, 2);
        assert!(failed.data.iter().all(|r| !r.is_success));
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;
        // records 2..=4 sit at 02:00, 03:00 and 03:00
        let page = fetch(
            &app,
            "?startDate=2025-01-01T02:00:00Z&endDate=2025-01-01T03:00:00Z",
        )
        .await;

        let mut ids: Vec<i64> = page.data.iter().map(|r| r.audit_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_naive_dates_are_utc() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let page = fetch(&app, "?startDate=2025-01-01T09:00:00").await;

        let mut ids: Vec<i64> = page.data.iter().map(|r| r.audit_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![9, 10]);
    }

    #[tokio::test]
    async fn test_empty_parameters_are_ignored() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let page = fetch(
            &app,
            "?operation=&organizationId=&isSuccess=&searchTerm=&startDate=",
        )
        .await;

        assert_eq!(page.pagination.total_items, 10);
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let app = TestApp::with_records(&AuditFixtures::sample()).await;

        let page = fetch(&app, "?organizationId=7&isSuccess=true&searchTerm=login").await;

        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].audit_id, 5);
    }
}

mod validation {
    use super::*;

    #[rstest]
    #[case("?pageSize=101", "PageSize must be between 1 and 100")]
    #[case("?pageSize=0", "PageSize must be between 1 and 100")]
    #[case("?page=0", "Page must be greater than 0")]
    #[case("?page=-3", "Page must be greater than 0")]
    #[case(
        "?startDate=2025-01-10T00:00:00Z&endDate=2025-01-01T00:00:00Z",
        "StartDate must be before EndDate"
    )]
    #[tokio::test]
    async fn test_invalid_query_is_rejected(#[case] query: &str, #[case] detail: &str) {
        let app = TestApp::new().await;

        let response = app.get_authed(&format!("/api/v1/audit{}", query)).await;

        response.assert_bad_request();
        assert_eq!(
            response.header("content-type"),
            Some("application/problem+json")
        );
        let problem: ProblemDetails = response.json();
        assert_eq!(problem.title.as_deref(), Some(DEFAULT_PROBLEM_TITLE));
        assert_eq!(problem.status, Some(400));
        assert_eq!(problem.detail.as_deref(), Some(detail));
        assert_eq!(problem.instance.as_deref(), Some("/api/v1/audit"));
    }

    #[rstest]
    #[case("?page=abc")]
    #[case("?isSuccess=maybe")]
    #[case("?startDate=yesterday")]
    #[case("?organizationId=seven")]
    #[tokio::test]
    async fn test_unparseable_query_is_bad_request(#[case] query: &str) {
        let app = TestApp::new().await;

        let response = app.get_authed(&format!("/api/v1/audit{}", query)).await;

        response.assert_bad_request();
        let problem: ProblemDetails = response.json();
        assert_eq!(problem.status, Some(400));
        assert!(problem.detail.is_some());
    }

    #[tokio::test]
    async fn test_equal_dates_are_allowed() {
        let app = TestApp::new().await;

        app.get_authed("/api/v1/audit?startDate=2025-01-01T00:00:00Z&endDate=2025-01-01T00:00:00Z")
            .await
            .assert_ok();
    }
}

mod properties {
    use super::*;

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(50)]
    #[case(100)]
    #[tokio::test]
    async fn test_pages_partition_the_listing(#[case] page_size: i64) {
        let records = AuditRecordFactory::new().batch(230);
        let app = TestApp::with_records(&records).await;

        let (first, all) = fetch_all(&app, "", page_size).await;

        assert_eq!(all.len() as i64, first.pagination.total_items);
        assert_eq!(all.len(), 230);
        assert_ordered(&all);
        let mut ids: Vec<i64> = all.iter().map(|r| r.audit_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 230);
    }

    #[tokio::test]
    async fn test_filtered_pages_partition_the_filtered_listing() {
        let records = AuditRecordFactory::new().batch(300);
        let app = TestApp::with_records(&records).await;
        let query = AuditQuery::default().search("login");

        let (_, all) = fetch_all(&app, "searchTerm=login", 9).await;

        let repo = AuditRepository::new(&app.state.db);
        assert_eq!(repo.count(&query).await.unwrap(), all.len() as i64);
        assert!(all.iter().all(|r| query.matches(r)));
        assert_ordered(&all);
    }

    #[tokio::test]
    async fn test_adding_filters_never_grows_the_result() {
        let records = AuditRecordFactory::new().batch(300);
        let app = TestApp::with_records(&records).await;

        let chain = [
            "",
            "?searchTerm=o",
            "?searchTerm=o&isSuccess=true",
            "?searchTerm=o&isSuccess=true&entityType=Node",
            "?searchTerm=o&isSuccess=true&entityType=Node&userId=u-1",
        ];
        let mut previous = i64::MAX;
        for query in chain {
            let total = fetch(&app, query).await.pagination.total_items;
            assert!(total <= previous, "{} grew the result", query);
            previous = total;
        }
    }

    #[tokio::test]
    async fn test_envelope_arithmetic() {
        let app = TestApp::with_records(&AuditFixtures::linear(37)).await;

        for page_size in [1_i64, 5, 10, 36, 37, 100] {
            let total_pages = (37 + page_size - 1) / page_size;
            for page in 1..=total_pages + 1 {
                let result = fetch(&app, &format!("?page={}&pageSize={}", page, page_size)).await;
                let meta = result.pagination;
                assert_eq!(meta.total_pages, total_pages);
                assert_eq!(meta.has_next_page, page < total_pages);
                assert_eq!(meta.has_previous_page, page > 1);
                assert!(result.data.len() as i64 <= page_size);
                assert_eq!(result.data.len() as i64, meta.expected_len());
            }
        }
    }

    #[tokio::test]
    async fn test_store_and_predicate_agree() {
        let records = AuditRecordFactory::new().batch(200);
        let app = TestApp::with_records(&records).await;
        let repo = AuditRepository::new(&app.state.db);
        let everything = repo
            .list(&AuditQuery::new(1, 100))
            .await
            .unwrap()
            .into_iter()
            .chain(repo.list(&AuditQuery::new(2, 100)).await.unwrap())
            .collect::<Vec<_>>();
        let start: DateTime<Utc> = Utc::now() - chrono::Duration::days(1);

        let queries = [
            AuditQuery::default().operation("E"),
            AuditQuery::default().is_success(false),
            AuditQuery::default().organization_id(2),
            AuditQuery::default().search("NODE"),
            AuditQuery::default().between(start, Utc::now()),
            AuditQuery::default().user_id("u-3").entity_type("Alert"),
        ];
        for query in queries {
            let expected = everything.iter().filter(|r| query.matches(r)).count() as i64;
            assert_eq!(repo.count(&query).await.unwrap(), expected, "{:?}", query);
        }
    }
}
