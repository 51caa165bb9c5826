//! Integration coverage for the invariants and scenarios of spec.md §8,
//! exercised end-to-end through [`CrawlEngine::crawl`] against a mock HTTP
//! server.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use politecrawl::{CrawlConfig, CrawlEngine, JsonlStorage, Storage};
use mockito::Server;

fn base_config() -> CrawlConfig {
    CrawlConfig::default()
        .with_max_concurrent(2)
        .with_per_host_concurrent(1)
        .with_respect_robots(false)
        .with_requests_per_second(1_000.0)
        .with_retry_max_retries(0)
        .with_retry_base_delay(0.01)
        .with_timeouts(1.0, 1.0, 1.0)
        .with_circuit_breaker(100, 60.0)
}

async fn jsonl_storage() -> (Arc<dyn Storage>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.jsonl");
    let storage: Arc<dyn Storage> = Arc::new(JsonlStorage::new(&path).await.expect("jsonl storage"));
    (storage, dir)
}

#[tokio::test]
async fn max_depth_zero_crawls_only_the_seed() {
    let mut server = Server::new_async().await;
    let page = common::create_html_mock(&mut server, "/", r#"<a href="/child">child</a>"#);

    let config = base_config().with_max_depth(0).with_same_host_only(true);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&[format!("{}/", server.url())]).await;

    page.assert_async().await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.stats.queued, 0);
}

#[tokio::test]
async fn max_depth_one_crawls_only_the_seed() {
    let mut server = Server::new_async().await;
    let root = common::create_html_mock(&mut server, "/", &format!(r#"<a href="{}/child">child</a>"#, server.url()));
    let child = server.mock("GET", "/child").expect(0).with_status(200).create_async().await;
    let grandchild = server.mock("GET", "/grandchild").expect(0).with_status(200).create_async().await;

    let config = base_config().with_max_depth(1).with_same_host_only(true);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&[format!("{}/", server.url())]).await;

    root.assert_async().await;
    child.assert_async().await;
    grandchild.assert_async().await;
    assert_eq!(report.processed, 1);
}

#[tokio::test]
async fn duplicate_links_are_only_fetched_once() {
    let mut server = Server::new_async().await;
    let target = format!("{}/once", server.url());
    let root = common::create_html_mock(
        &mut server,
        "/",
        &format!(r#"<a href="{target}">a</a><a href="{target}">b</a><a href="{target}/">c</a>"#),
    );
    let once = server
        .mock("GET", "/once")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>leaf</body></html>")
        .expect(1)
        .create_async()
        .await;

    let config = base_config().with_max_depth(5).with_same_host_only(true);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&[format!("{}/", server.url())]).await;

    root.assert_async().await;
    once.assert_async().await;
    assert_eq!(report.processed, 2);
}

#[tokio::test]
async fn permanent_error_is_not_retried() {
    let mut server = Server::new_async().await;
    let gone = server.mock("GET", "/gone").with_status(404).expect(1).create_async().await;

    let config = base_config();
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&[format!("{}/gone", server.url())]).await;

    gone.assert_async().await;
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn transient_error_retries_then_succeeds() {
    let mut server = Server::new_async().await;
    // mockito matches the most-recently-created mock first and falls
    // through to earlier ones once a mock's `expect` count is exhausted,
    // so the 200 is registered first as the eventual fallback.
    let success = server
        .mock("GET", "/flaky")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>ok</body></html>")
        .create_async()
        .await;
    let failure_a = server.mock("GET", "/flaky").with_status(503).expect(1).create_async().await;
    let failure_b = server.mock("GET", "/flaky").with_status(503).expect(1).create_async().await;

    let config = base_config().with_retry_max_retries(3).with_retry_base_delay(0.01).with_retry_backoff_factor(2.0);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&[format!("{}/flaky", server.url())]).await;

    failure_a.assert_async().await;
    failure_b.assert_async().await;
    success.assert_async().await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn circuit_opens_after_threshold_failures_for_a_host() {
    // No server ever listens on this port: every request is a connection
    // failure, the same Network classification a refused connection gets.
    let unreachable = ["http://127.0.0.1:1/a", "http://127.0.0.1:1/b", "http://127.0.0.1:1/c"]
        .map(str::to_string);

    let config = base_config().with_circuit_breaker(2, 60.0).with_timeouts(0.2, 0.2, 0.2).with_max_concurrent(1);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&unreachable).await;

    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 3);
}

#[tokio::test]
async fn robots_disallow_blocks_the_fetch() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body(common::create_robots_txt(&["/private"]))
        .create_async()
        .await;
    let private = server.mock("GET", "/private").expect(0).with_status(200).create_async().await;

    let config = base_config().with_respect_robots(true);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let report = engine.crawl(&[format!("{}/private", server.url())]).await;

    private.assert_async().await;
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn per_host_rate_limit_spaces_out_sequential_requests() {
    let mut server = Server::new_async().await;
    let a = common::create_html_mock(&mut server, "/a", "<html><body>a</body></html>");
    let b = common::create_html_mock(&mut server, "/b", "<html><body>b</body></html>");

    let config = base_config().with_requests_per_second(2.0).with_max_concurrent(1).with_per_host_concurrent(1);
    let (storage, _dir) = jsonl_storage().await;
    let engine = Arc::new(CrawlEngine::new(config, storage).expect("engine"));

    let start = Instant::now();
    let report = engine.crawl(&[format!("{}/a", server.url()), format!("{}/b", server.url())]).await;
    let elapsed = start.elapsed();

    a.assert_async().await;
    b.assert_async().await;
    assert_eq!(report.processed, 2);
    assert!(elapsed >= Duration::from_millis(450), "expected at least ~500ms between requests, got {elapsed:?}");
}
