//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with an in-memory fetch client so that
//! every render can be counted; the last one runs the full HTTP stack against
//! a wiremock server.

use async_trait::async_trait;
use chrono::NaiveDate;
use shelfscan::config::{
    CategoryRules, Config, CrawlerConfig, FieldRule, ItemRules, NextPageRules, OutputConfig,
    PaginationMode, SiteConfig, UserAgentConfig,
};
use shelfscan::crawler::{Coordinator, FetchClient, FetchError, FetchSession};
use shelfscan::model::RECORD_COLUMNS;
use shelfscan::output::{RecordSink, SinkError, SinkResult};
use shelfscan::state::PageState;
use shelfscan::url::logical_name;
use shelfscan::{CrawlError, Item};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "https://shop.example.com/";

/// In-memory site: serves fixed pages, counts renders, fails on demand
#[derive(Clone, Default)]
struct MapClient {
    pages: Arc<HashMap<String, String>>,
    failing: Arc<Mutex<HashSet<String>>>,
    slow: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<HashMap<String, u32>>>,
}

impl MapClient {
    fn new(pages: &[(&str, String)]) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.clone()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    fn heal(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    fn delay(&self, url: &str, by: Duration) {
        self.slow.lock().unwrap().insert(url.to_string(), by);
    }

    fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

struct MapSession {
    client: MapClient,
}

#[async_trait]
impl FetchClient for MapClient {
    type Session = MapSession;

    async fn open_session(&self) -> Result<MapSession, FetchError> {
        Ok(MapSession {
            client: self.clone(),
        })
    }
}

#[async_trait]
impl FetchSession for MapSession {
    async fn render(&mut self, url: &Url) -> Result<String, FetchError> {
        *self
            .client
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let delay = self.client.slow.lock().unwrap().get(url.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.client.failing.lock().unwrap().contains(url.as_str()) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        self.client
            .pages
            .get(url.as_str())
            .cloned()
            .ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Rejects every record
struct BrokenSink;

impl RecordSink for BrokenSink {
    fn append(&self, _item: &Item) -> SinkResult<()> {
        Err(SinkError::Poisoned)
    }

    fn written(&self) -> u64 {
        0
    }
}

/// Creates a test configuration writing below `dir`
fn create_test_config(dir: &Path, base_url: &str, workers: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            attempt_limit: 3,
            seed_attempt_limit: 2,
            retry_delay_ms: 0,
            fetch_timeout_ms: 5_000,
            run_deadline_secs: None,
            max_workers: workers,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            html_dir: dir.join("html").display().to_string(),
            csv_dir: dir.join("csv").display().to_string(),
        },
        sites: vec![SiteConfig {
            name: "shop".to_string(),
            base_url: base_url.to_string(),
            domain: None,
            ready_selector: None,
            seed_name: "All_cat".to_string(),
            categories: CategoryRules {
                selector: "nav a".to_string(),
                label_attr: None,
            },
            items: ItemRules {
                container: Some("ul.products".to_string()),
                selector: "li.product".to_string(),
                name: Some(FieldRule {
                    selector: Some("a".to_string()),
                    attr: Some("title".to_string()),
                }),
                price: Some(FieldRule {
                    selector: Some("span.price".to_string()),
                    attr: None,
                }),
                old_price: Some(FieldRule {
                    selector: Some("del".to_string()),
                    attr: None,
                }),
                id: Some(FieldRule {
                    selector: None,
                    attr: Some("data-sku".to_string()),
                }),
            },
            next_page: Some(NextPageRules {
                selector: "a.next".to_string(),
                mode: PaginationMode::Link,
                dismiss: None,
            }),
        }],
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 6, 1).unwrap()
}

fn top_page(links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, label)| format!(r#"<a href="{}">{}</a>"#, href, label))
        .collect();
    format!("<html><body><nav>{}</nav></body></html>", anchors)
}

fn listing(products: &[(&str, &str)], next: Option<&str>) -> String {
    let items: String = products
        .iter()
        .map(|(sku, name)| {
            format!(
                r#"<li class="product" data-sku="{}"><a title="{}">x</a><span class="price">10</span></li>"#,
                sku, name
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="next" href="{}">›</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><ul class="products">{}</ul>{}</body></html>"#,
        items, next
    )
}

fn records_path(dir: &Path) -> PathBuf {
    dir.join("csv").join("shop").join("shop_2018-06-01.csv")
}

fn read_records(dir: &Path) -> Vec<Item> {
    let mut reader = csv::Reader::from_path(records_path(dir)).expect("Failed to open records");
    reader
        .deserialize()
        .collect::<Result<Vec<Item>, _>>()
        .expect("Failed to read records")
}

/// Category /a has two pages; the top page links it twice
fn paginated_shop() -> MapClient {
    MapClient::new(&[
        (BASE, top_page(&[("/a", "Phones"), ("/a/", "Phones again")])),
        (
            "https://shop.example.com/a",
            listing(&[("p1", "Phone 1"), ("p2", "Phone 2")], Some("?page=2")),
        ),
        (
            "https://shop.example.com/a?page=2",
            listing(&[("p3", "Phone 3")], None),
        ),
    ])
}

#[tokio::test]
async fn test_category_with_pagination() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 1);
    let client = paginated_shop();

    let coordinator = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Crawl failed");

    assert_eq!(summary.categories_discovered, 1);
    assert_eq!(summary.items_written, 3);
    assert_eq!(summary.pages_visited(), 2);
    assert_eq!(summary.pages_failed(), 0);
    assert!(!summary.cancelled);

    let visited: HashSet<String> = coordinator
        .crawl_run()
        .frontier()
        .visited()
        .into_iter()
        .collect();
    let expected: HashSet<String> = [
        "https://shop.example.com/a",
        "https://shop.example.com/a?page=2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(visited, expected);

    let records = read_records(dir.path());
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.date == date()));
    assert!(records.iter().all(|r| r.category_label.as_deref() == Some("Phones")));
    assert_eq!(records[2].category_name, logical_name("/a?page=2"));
    assert_eq!(records[0].external_id.as_deref(), Some("p1"));
    assert_eq!(records[0].old_price, None);

    // One artifact per visited page plus the top-level page
    let artifacts = dir.path().join("html").join("shop");
    assert!(artifacts.join("All_cat_2018-06-01.html").exists());
    assert!(artifacts.join("a_2018-06-01.html").exists());
    assert!(artifacts
        .join(format!("{}_2018-06-01.html", logical_name("/a?page=2")))
        .exists());
}

#[tokio::test]
async fn test_cyclic_pagination_terminates() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 2);
    let client = MapClient::new(&[
        (BASE, top_page(&[("/a", "Phones")])),
        (
            "https://shop.example.com/a",
            listing(&[("p1", "Phone 1")], Some("?page=2")),
        ),
        (
            "https://shop.example.com/a?page=2",
            listing(&[("p2", "Phone 2")], Some("/a")),
        ),
    ]);

    let summary = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(summary.pages_visited(), 2);
    assert_eq!(summary.items_written, 2);
    assert_eq!(client.calls("https://shop.example.com/a"), 1);
    assert_eq!(client.calls("https://shop.example.com/a?page=2"), 1);
}

#[tokio::test]
async fn test_failing_page_is_bounded_and_skipped() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 1);
    let client = MapClient::new(&[
        (BASE, top_page(&[("/a", "Phones"), ("/b", "Tablets")])),
        ("https://shop.example.com/a", listing(&[("p1", "Phone 1")], None)),
        ("https://shop.example.com/b", listing(&[("t1", "Tablet 1")], None)),
    ]);
    client.fail("https://shop.example.com/a");

    let summary = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    // Exactly attempt-limit renders, then the run moves on
    assert_eq!(client.calls("https://shop.example.com/a"), 3);
    assert_eq!(summary.pages_failed(), 1);
    assert_eq!(summary.pages_visited(), 1);
    assert_eq!(summary.items_written, 1);

    let records = read_records(dir.path());
    assert_eq!(records[0].name.as_deref(), Some("Tablet 1"));
    assert!(!dir
        .path()
        .join("html")
        .join("shop")
        .join("a_2018-06-01.html")
        .exists());
}

#[tokio::test]
async fn test_rerun_fetches_only_missing_pages() {
    let interrupted = TempDir::new().unwrap();
    let config = create_test_config(interrupted.path(), BASE, 2);
    let client = MapClient::new(&[
        (BASE, top_page(&[("/a", "Phones"), ("/b", "Tablets")])),
        (
            "https://shop.example.com/a",
            listing(&[("p1", "Phone 1")], Some("?page=2")),
        ),
        (
            "https://shop.example.com/a?page=2",
            listing(&[("p2", "Phone 2")], None),
        ),
        ("https://shop.example.com/b", listing(&[("t1", "Tablet 1")], None)),
    ]);

    client.fail("https://shop.example.com/b");
    let first = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("First run failed");
    assert_eq!(first.pages_failed(), 1);

    client.heal("https://shop.example.com/b");
    client.reset_calls();
    let second = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Second run failed");

    // Only the page that failed before goes to the network
    assert_eq!(client.calls(BASE), 0);
    assert_eq!(client.calls("https://shop.example.com/a"), 0);
    assert_eq!(client.calls("https://shop.example.com/a?page=2"), 0);
    assert_eq!(client.calls("https://shop.example.com/b"), 1);
    assert_eq!(second.pages_reused(), 2);
    assert_eq!(second.pages_failed(), 0);

    // Same record set as a run that never failed
    let clean = TempDir::new().unwrap();
    let clean_config = create_test_config(clean.path(), BASE, 1);
    let fresh = MapClient::new(&[
        (BASE, top_page(&[("/a", "Phones"), ("/b", "Tablets")])),
        (
            "https://shop.example.com/a",
            listing(&[("p1", "Phone 1")], Some("?page=2")),
        ),
        (
            "https://shop.example.com/a?page=2",
            listing(&[("p2", "Phone 2")], None),
        ),
        ("https://shop.example.com/b", listing(&[("t1", "Tablet 1")], None)),
    ]);
    Coordinator::new(&clean_config, "shop", date(), fresh)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Clean run failed");

    let resumed: HashSet<Item> = read_records(interrupted.path()).into_iter().collect();
    let uninterrupted: HashSet<Item> = read_records(clean.path()).into_iter().collect();
    assert_eq!(resumed, uninterrupted);
    assert_eq!(resumed.len(), 3);
}

#[tokio::test]
async fn test_colliding_names_get_distinct_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 2);
    let pages = [
        (
            BASE,
            top_page(&[
                ("/rau-cu", "Veg"),
                ("/rau/cu", "Veg sub"),
                ("/All-cat", "Everything"),
            ]),
        ),
        ("https://shop.example.com/rau-cu", listing(&[("v1", "Carrot")], None)),
        ("https://shop.example.com/rau/cu", listing(&[("s1", "Cabbage")], None)),
        ("https://shop.example.com/All-cat", listing(&[("a1", "Apple")], None)),
    ];

    let client = MapClient::new(&pages);
    let first = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(first.count(PageState::Fetched), 3);
    assert_eq!(first.pages_reused(), 0);
    assert_eq!(client.calls("https://shop.example.com/rau-cu"), 1);
    assert_eq!(client.calls("https://shop.example.com/rau/cu"), 1);
    assert_eq!(client.calls("https://shop.example.com/All-cat"), 1);

    let records: HashSet<(String, String)> = read_records(dir.path())
        .into_iter()
        .map(|r| (r.name.unwrap(), r.category_label.unwrap()))
        .collect();
    let expected: HashSet<(String, String)> = [
        ("Carrot", "Veg"),
        ("Cabbage", "Veg sub"),
        ("Apple", "Everything"),
    ]
    .iter()
    .map(|(n, l)| (n.to_string(), l.to_string()))
    .collect();
    assert_eq!(records, expected);

    // Four artifacts: the top page and one per category
    let artifacts = std::fs::read_dir(dir.path().join("html").join("shop"))
        .unwrap()
        .count();
    assert_eq!(artifacts, 4);

    // A second run of the day finds every page under its own name
    client.reset_calls();
    let second = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Second run failed");
    assert_eq!(second.pages_reused(), 3);
    assert_eq!(client.calls("https://shop.example.com/rau/cu"), 0);
}

#[tokio::test]
async fn test_run_deadline_abandons_remaining_pages() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), BASE, 1);
    config.crawler.run_deadline_secs = Some(1);
    config.crawler.fetch_timeout_ms = 30_000;

    let client = MapClient::new(&[
        (BASE, top_page(&[("/a", "Phones"), ("/b", "Tablets"), ("/c", "Watches")])),
        ("https://shop.example.com/a", listing(&[("p1", "Phone 1")], None)),
        ("https://shop.example.com/b", listing(&[("t1", "Tablet 1")], None)),
        ("https://shop.example.com/c", listing(&[("w1", "Watch 1")], None)),
    ]);
    for url in ["/a", "/b", "/c"] {
        client.delay(&format!("https://shop.example.com{}", url), Duration::from_secs(20));
    }

    let started = Instant::now();
    let summary = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(summary.cancelled);
    assert_eq!(summary.count(PageState::Abandoned), 3);
    assert_eq!(summary.pages_visited(), 0);
    assert_eq!(summary.items_written, 0);
    assert_eq!(client.calls("https://shop.example.com/a"), 1);
    assert_eq!(client.calls("https://shop.example.com/b"), 0);

    // Nothing half-fetched was stored
    assert!(!dir
        .path()
        .join("html")
        .join("shop")
        .join("a_2018-06-01.html")
        .exists());
}

#[tokio::test]
async fn test_record_schema_is_stable() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 1);

    Coordinator::new(&config, "shop", date(), paginated_shop())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    let content = std::fs::read_to_string(records_path(dir.path())).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], RECORD_COLUMNS.join(","));
    for line in &lines[1..] {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.len(), RECORD_COLUMNS.len());
    }
}

#[tokio::test]
async fn test_sink_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 2);

    let result = Coordinator::new(&config, "shop", date(), paginated_shop())
        .expect("Failed to create coordinator")
        .with_sink(Arc::new(BrokenSink))
        .run()
        .await;

    assert!(matches!(result, Err(CrawlError::Persistence(_))));
}

#[tokio::test]
async fn test_seed_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), BASE, 1);
    let client = paginated_shop();
    client.fail(BASE);

    let result = Coordinator::new(&config, "shop", date(), client.clone())
        .expect("Failed to create coordinator")
        .run()
        .await;

    match result {
        Err(CrawlError::SeedFetch { site, attempts, .. }) => {
            assert_eq!(site, "shop");
            assert_eq!(attempts, 2);
        }
        other => panic!("Expected a seed failure, got {:?}", other.map(|s| s.items_written)),
    }
    assert_eq!(client.calls(BASE), 2);
    assert_eq!(client.calls("https://shop.example.com/a"), 0);
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    // Start a mock server
    let mock_server = MockServer::start().await;
    let base_url = format!("{}/", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(top_page(&[("/phones", "Phones"), ("/tablets/", "Tablets")]))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/phones"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing(&[("p1", "Phone 1")], Some("/phones/2")))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/phones/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing(&[("p2", "Phone 2")], None))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Never answers successfully
    // Requested as linked, trailing slash included
    Mock::given(method("GET"))
        .and(path("/tablets/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &base_url, 2);

    let summary = shelfscan::run_crawl(&config, "shop", date())
        .await
        .expect("Crawl failed");

    assert_eq!(summary.categories_discovered, 2);
    assert_eq!(summary.items_written, 2);
    assert_eq!(summary.pages_visited(), 2);
    assert_eq!(summary.pages_failed(), 1);

    let names: HashSet<String> = read_records(dir.path())
        .into_iter()
        .filter_map(|r| r.name)
        .collect();
    assert!(names.contains("Phone 1"));
    assert!(names.contains("Phone 2"));

    // Wiremock verifies the expected request counts when mock_server drops
}
