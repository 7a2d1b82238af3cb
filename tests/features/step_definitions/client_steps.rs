//! Transport client step definitions

use std::time::{Duration, Instant};

use cucumber::{given, then, when};
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

use audit_slice::client::{ApiClient, AuditEndpoint, ClientConfig};
use audit_slice::models::AuditQuery;

use crate::common::{envelope_json, problem_json, request_count};
use crate::features::support::TestWorld;

fn failure(status: u16) -> ResponseTemplate {
    match status {
        400 => ResponseTemplate::new(400)
            .set_body_json(problem_json(400, "PageSize must be between 1 and 100")),
        _ => ResponseTemplate::new(status),
    }
}

#[given(expr = "an audit API that answers {int} {int} time(s) and then 200")]
async fn flaky_api(world: &mut TestWorld, status: u16, times: u64) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(failure(status))
        .up_to_n_times(times)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope_json(3, 1, 50, 3)))
        .mount(&server)
        .await;
    world.server = Some(server);
}

#[given(expr = "an audit API that always answers {int}")]
async fn failing_api(world: &mut TestWorld, status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(failure(status))
        .mount(&server)
        .await;
    world.server = Some(server);
}

#[given("a client with default retry settings")]
async fn default_client(world: &mut TestWorld) {
    let base_url = format!("{}/api/v1", world.server().uri());
    let config = ClientConfig::new(base_url).merged(world.recorder.update());
    world.client = Some(ApiClient::new(config).expect("Failed to build client"));
}

#[when(expr = "the client requests page {int} with page size {int}")]
async fn client_fetches(world: &mut TestWorld, page: i64, page_size: i64) {
    let path = AuditEndpoint::path_for(&AuditQuery::new(page, page_size));
    let started = Instant::now();
    let result = world.client().get(&path).await;
    world.elapsed = started.elapsed();
    world.client_result = Some(result);
}

#[then("the call should succeed")]
async fn call_succeeds(world: &mut TestWorld) {
    match world.client_result {
        Some(Ok(ref response)) => assert_eq!(response.status, 200),
        ref other => panic!("Expected success, got {:?}", other),
    }
}

#[then(expr = "the call should fail with status {int}")]
async fn call_fails(world: &mut TestWorld, status: u16) {
    assert_eq!(world.client_error().status_code(), status);
}

#[then("the error should be a bad request")]
async fn error_is_bad_request(world: &mut TestWorld) {
    assert!(world.client_error().is_bad_request());
}

#[then("the error should be unauthorized")]
async fn error_is_unauthorized(world: &mut TestWorld) {
    assert!(world.client_error().is_unauthorized());
}

#[then(expr = "the server should have received {int} request(s)")]
async fn server_received(world: &mut TestWorld, count: usize) {
    assert_eq!(request_count(world.server()).await, count);
}

#[then(expr = "onError should have fired {int} time(s)")]
async fn on_error_fired(world: &mut TestWorld, count: usize) {
    assert_eq!(world.recorder.errors().len(), count);
}

#[then(expr = "onUnauthorized should have fired {int} time(s)")]
async fn on_unauthorized_fired(world: &mut TestWorld, count: usize) {
    assert_eq!(world.recorder.unauthorized().len(), count);
}

#[then(expr = "the call should have taken at least {int} ms")]
async fn took_at_least(world: &mut TestWorld, millis: u64) {
    assert!(
        world.elapsed >= Duration::from_millis(millis),
        "took {:?}",
        world.elapsed
    );
}
