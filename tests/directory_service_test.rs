//! Integration tests for the directory cache service against a mock upstream.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use campushub::directory::{Clock, DirectoryService};

/// Test clock that only moves when told to.
#[derive(Debug)]
struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Instant::now()),
        })
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

fn students_body() -> serde_json::Value {
    serde_json::json!([
        { "studentId": 1, "firstName": "Ada", "lastName": "Lovelace", "school": "Analytical" },
        { "studentId": 2, "firstName": "Alan", "lastName": "Turing", "school": "Bletchley" },
        { "studentId": 3, "firstName": "Ada", "lastName": "Byron", "school": "Analytical" }
    ])
}

#[tokio::test]
async fn fresh_fetch_then_cache_hit_makes_one_upstream_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_body()))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::new();
    let svc = DirectoryService::with_clock(server.uri(), Duration::from_secs(600), clock);

    let first = svc.get_all().await;
    assert_eq!(first.len(), 3);

    // Second read within the freshness window must not hit the upstream;
    // the mock's expect(1) verifies this when the server drops.
    let second = svc.get_all().await;
    assert_eq!(second, first);
}

#[tokio::test]
async fn cache_refetches_after_ttl_expires() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_body()))
        .expect(2)
        .mount(&server)
        .await;

    let clock = ManualClock::new();
    let svc = DirectoryService::with_clock(
        server.uri(),
        Duration::from_secs(600),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    svc.get_all().await;
    clock.advance(Duration::from_secs(601));
    svc.get_all().await;
}

#[tokio::test]
async fn stale_records_served_when_upstream_fails() {
    let server = MockServer::start().await;
    // First request succeeds, everything after returns 500.
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let clock = ManualClock::new();
    let svc = DirectoryService::with_clock(
        server.uri(),
        Duration::from_secs(600),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    let fresh = svc.get_all().await;
    assert_eq!(fresh.len(), 3);

    // Expire the cache; the refresh fails and the stale content is served.
    clock.advance(Duration::from_secs(601));
    let stale = svc.get_all().await;
    assert_eq!(stale, fresh);

    // The cache stays expired, so the next read retries (and fails) again,
    // still serving the stale content.
    let stale_again = svc.get_all().await;
    assert_eq!(stale_again, fresh);
}

#[tokio::test]
async fn empty_list_returned_when_upstream_fails_with_no_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let svc = DirectoryService::new(server.uri(), Duration::from_secs(600));
    assert!(svc.get_all().await.is_empty());
    assert_eq!(svc.count().await, 0);
}

#[tokio::test]
async fn lookups_scan_the_cached_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_body()))
        .expect(1)
        .mount(&server)
        .await;

    let svc = DirectoryService::new(server.uri(), Duration::from_secs(600));

    let by_id = svc.get_by_id(2).await.unwrap();
    assert_eq!(by_id.first_name, "Alan");

    let by_name = svc.get_by_full_name("ada byron").await.unwrap();
    assert_eq!(by_name.student_id, 3);

    assert_eq!(svc.get_by_school("ANALYTICAL").await.len(), 2);
    assert_eq!(svc.get_by_first_name("Ada").await.len(), 2);
    assert_eq!(svc.get_by_last_name("Turing").await.len(), 1);

    assert!(svc.get_by_id(99).await.is_none());
    assert!(svc.get_by_full_name("Ada").await.is_none());
}

#[tokio::test]
async fn repeated_lookups_are_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(students_body()))
        .expect(1)
        .mount(&server)
        .await;

    let svc = DirectoryService::new(server.uri(), Duration::from_secs(600));

    let a = svc.get_by_school("Analytical").await;
    let b = svc.get_by_school("Analytical").await;
    let c = svc.get_by_school("Analytical").await;
    assert_eq!(a, b);
    assert_eq!(b, c);
}
