//! Integration tests for the crawler
//!
//! The HTTP tests use wiremock to stand in for the catalog's GraphQL gateway.
//! The scheduling tests swap the fetcher and sink for in-memory fakes and run
//! on a paused clock.

use async_trait::async_trait;
use catalog_crawler::config::{parse_config, Config};
use catalog_crawler::crawler::{
    Crawler, GraphqlPageFetcher, PageFetcher, PageRequest, ProductRecord, RawItem, SearchPage,
};
use catalog_crawler::output::{OutputResult, ProductSink};
use catalog_crawler::{FetchError, FetchResult};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GRAPHQL_PATH: &str = "/federation-gateway/graphql";

/// Creates a configuration pointed at `origin`
fn create_test_config(origin: &str, categories: &[&str], extra: &str) -> Config {
    let categories: Vec<String> = categories.iter().map(|c| format!("{c:?}")).collect();
    let content = format!(
        r#"
[crawler]
cycle-delay-ms = 10
launch-interval-ms = 10
cooldown-secs = 3600
max-backoff-ms = 100

[catalog]
origin = "{origin}"
store-id = "0915"
categories = [{}]
{extra}
"#,
        categories.join(", ")
    );
    parse_config(&content).expect("test config should be valid")
}

/// Builds a `searchModel` response with `count` products numbered from `first`
fn search_response(total: u64, prefix: &str, first: u64, count: u64) -> serde_json::Value {
    let products: Vec<_> = (first..first + count)
        .map(|n| {
            json!({
                "itemId": format!("{prefix}{n}"),
                "identifiers": {
                    "canonicalUrl": format!("/p/item-{n}/{prefix}{n}"),
                    "brandName": "Acme",
                    "productLabel": format!("Item {n}"),
                    "__typename": "Identifiers"
                },
                "media": {"images": [{"url": format!("https://images.example.com/{n}_<SIZE>.jpg")}]},
                "pricing": {"value": 9.0, "original": 10.6}
            })
        })
        .collect();

    json!({
        "data": {
            "searchModel": {
                "id": "search",
                "searchReport": {"totalProducts": total, "pageSize": 48, "startIndex": first},
                "products": products
            }
        }
    })
}

async fn mount_page(server: &MockServer, category: &str, start_index: u64, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(query_param("opname", "searchModel"))
        .and(body_partial_json(json!({
            "operationName": "searchModel",
            "variables": {"navParam": category, "startIndex": start_index, "storeId": "0915"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_page_against_gateway() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri(), &["C1"], "");

    // Warm-up request for session cookies
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("content-type", "application/json"))
        .and(header("x-experience-name", "b2b"))
        .and(body_partial_json(json!({
            "variables": {"navParam": "C1", "startIndex": 48, "pageSize": 48}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response(50, "C1-", 48, 2)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = GraphqlPageFetcher::new(
        &config.catalog,
        &config.transport,
        Duration::from_secs(5),
    )
    .unwrap();

    let page = fetcher
        .fetch_page(&PageRequest {
            category_id: "C1".to_string(),
            start_index: 48,
            store_id: "0915".to_string(),
            page_size: 48,
        })
        .await
        .unwrap();

    assert_eq!(page.total_products, 50);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].item_id, "C1-48");
    assert_eq!(page.items[0].canonical_url, "/p/item-48/C1-48");
    assert_eq!(page.items[1].original_price, Some(10.6));
}

#[tokio::test]
async fn test_fetch_page_rejected_status() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri(), &["C1"], "warm-up = false");

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access Denied"))
        .mount(&mock_server)
        .await;

    let fetcher = GraphqlPageFetcher::new(
        &config.catalog,
        &config.transport,
        Duration::from_secs(5),
    )
    .unwrap();

    let result = fetcher
        .fetch_page(&PageRequest {
            category_id: "C1".to_string(),
            start_index: 0,
            store_id: "0915".to_string(),
            page_size: 48,
        })
        .await;

    match result {
        Err(FetchError::Status { status, body }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "Access Denied");
        }
        other => panic!("expected status error, got {other:?}"),
    }

    // No warm-up request was made
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "POST"));
}

#[tokio::test]
async fn test_crawl_to_jsonl_file() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let out_path = temp_dir.path().join("products.jsonl");

    let config = create_test_config(
        &mock_server.uri(),
        &["C1", "C2"],
        &format!(
            "warm-up = false\n\n[output]\nkind = \"jsonl\"\npath = {:?}\n",
            out_path.display().to_string()
        ),
    );

    mount_page(&mock_server, "C1", 0, search_response(50, "C1-", 0, 48)).await;
    mount_page(&mock_server, "C1", 48, search_response(50, "C1-", 48, 2)).await;
    mount_page(&mock_server, "C2", 0, search_response(3, "C2-", 0, 3)).await;

    let crawler = Crawler::from_config(&config).await.unwrap();
    let supervisor = crawler.run(&config.catalog.categories, 0).await;

    let mut lines = Vec::new();
    for _ in 0..200 {
        let content = tokio::fs::read_to_string(&out_path).await.unwrap_or_default();
        lines = content.lines().map(String::from).collect();
        if lines.len() >= 53 && supervisor.stats().exhaustions >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let stats = supervisor.shutdown().await;

    assert_eq!(lines.len(), 53);
    let records: Vec<ProductRecord> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let first = records.iter().find(|r| r.sku == "C1-0").unwrap();
    assert_eq!(first.name, "Item 0");
    assert_eq!(first.brand, "Acme");
    assert_eq!(first.url, format!("{}/p/item-0/C1-0", mock_server.uri()));
    assert_eq!(first.image, "https://images.example.com/0_300.jpg");
    assert_eq!(first.price, Some(11));

    assert_eq!(stats.records_emitted, 53);
    assert_eq!(stats.exhaustions, 2);
}

// ===== In-memory fakes =====

/// Serves fixed pages keyed by category and offset, recording each request
struct CatalogFake {
    pages: HashMap<(String, u64), SearchPage>,
    requests: Mutex<Vec<(String, u64)>>,
}

impl CatalogFake {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_page(mut self, category: &str, start_index: u64, total: u64, ids: &[String]) -> Self {
        let items = ids
            .iter()
            .map(|id| RawItem {
                item_id: id.clone(),
                name: format!("Product {id}"),
                canonical_url: format!("/p/{id}"),
                ..RawItem::default()
            })
            .collect();
        self.pages.insert(
            (category.to_string(), start_index),
            SearchPage {
                items,
                total_products: total,
            },
        );
        self
    }

    fn offsets(&self, category: &str) -> Vec<u64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == category)
            .map(|(_, offset)| *offset)
            .collect()
    }
}

#[async_trait]
impl PageFetcher for CatalogFake {
    async fn fetch_page(&self, request: &PageRequest) -> FetchResult<SearchPage> {
        self.requests
            .lock()
            .unwrap()
            .push((request.category_id.clone(), request.start_index));
        self.pages
            .get(&(request.category_id.clone(), request.start_index))
            .cloned()
            .ok_or_else(|| FetchError::Payload("no such page".to_string()))
    }
}

#[derive(Default)]
struct CollectingSink {
    batches: Mutex<Vec<Vec<ProductRecord>>>,
}

impl CollectingSink {
    fn skus(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|r| r.sku.clone())
            .collect()
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl ProductSink for CollectingSink {
    async fn emit(&self, records: &[ProductRecord]) -> OutputResult<()> {
        if !records.is_empty() {
            self.batches.lock().unwrap().push(records.to_vec());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collecting"
    }
}

fn ids(prefix: &str, range: std::ops::Range<u64>) -> Vec<String> {
    range.map(|n| format!("{prefix}{n}")).collect()
}

#[tokio::test(start_paused = true)]
async fn test_two_categories_paginate_and_cool_down() {
    let config = create_test_config("https://www.example.com", &["C1", "C2"], "");
    let fetcher = Arc::new(
        CatalogFake::new()
            .with_page("C1", 0, 50, &ids("A", 0..48))
            .with_page("C1", 48, 50, &ids("A", 48..50))
            .with_page("C2", 0, 3, &ids("B", 0..3)),
    );
    let sink = Arc::new(CollectingSink::default());

    let crawler = Crawler::new(&config, fetcher.clone(), sink.clone());
    let supervisor = crawler.run(&config.catalog.categories, 0).await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    // C1 takes two pages, C2 one; both then sit in their cooldown
    assert_eq!(fetcher.offsets("C1"), vec![0, 48]);
    assert_eq!(fetcher.offsets("C2"), vec![0]);

    let skus = sink.skus();
    assert_eq!(skus.len(), 53);
    let mut sizes = sink.batch_sizes();
    sizes.sort();
    assert_eq!(sizes, vec![2, 3, 48]);

    // After the cooldown both categories start over at the initial offset,
    // and every item is still fresh in the dedup cache
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(&fetcher.offsets("C1")[..3], &[0, 48, 0]);
    assert_eq!(&fetcher.offsets("C2")[..2], &[0, 0]);
    assert_eq!(sink.skus().len(), 53);

    let stats = supervisor.shutdown().await;
    assert!(stats.records_suppressed >= 53);
    assert_eq!(crawler.dedup().len(), 53);
}

#[tokio::test(start_paused = true)]
async fn test_start_offset_applies_to_every_pass() {
    let config = create_test_config("https://www.example.com", &["C1"], "");
    let fetcher = Arc::new(
        CatalogFake::new()
            .with_page("C1", 48, 100, &ids("A", 48..96))
            .with_page("C1", 96, 100, &ids("A", 96..100)),
    );
    let sink = Arc::new(CollectingSink::default());

    let crawler = Crawler::new(&config, fetcher.clone(), sink.clone());
    let supervisor = crawler.run(&config.catalog.categories, 48).await;

    tokio::time::sleep(Duration::from_secs(3700)).await;
    supervisor.shutdown().await;

    let offsets = fetcher.offsets("C1");
    assert_eq!(&offsets[..3], &[48, 96, 48]);
    assert!(!offsets.contains(&0));
    assert_eq!(sink.skus().len(), 52);
}

#[tokio::test(start_paused = true)]
async fn test_shared_item_emitted_once_across_categories() {
    let config = create_test_config("https://www.example.com", &["C1", "C2"], "");
    let shared = vec!["X1".to_string(), "X2".to_string()];
    let fetcher = Arc::new(
        CatalogFake::new()
            .with_page("C1", 0, 2, &shared)
            .with_page("C2", 0, 2, &shared),
    );
    let sink = Arc::new(CollectingSink::default());

    let crawler = Crawler::new(&config, fetcher.clone(), sink.clone());
    let supervisor = crawler.run(&config.catalog.categories, 0).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    let stats = supervisor.shutdown().await;

    let mut skus = sink.skus();
    skus.sort();
    assert_eq!(skus, vec!["X1", "X2"]);
    assert_eq!(stats.records_emitted, 2);
    assert_eq!(stats.records_suppressed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_page_retries_same_offset() {
    let config = create_test_config("https://www.example.com", &["C1"], "");
    let fetcher = Arc::new(CatalogFake::new());
    let sink = Arc::new(CollectingSink::default());

    let crawler = Crawler::new(&config, fetcher.clone(), sink.clone());
    let supervisor = crawler.run(&config.catalog.categories, 0).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stats = supervisor.shutdown().await;

    let offsets = fetcher.offsets("C1");
    assert!(offsets.len() > 3);
    assert!(offsets.iter().all(|&o| o == 0));
    assert_eq!(stats.fetch_errors as usize, offsets.len());
    assert!(sink.skus().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_offset_at_end_of_range_cools_down() {
    let config = create_test_config("https://www.example.com", &["C1"], "");
    let offset = u64::MAX - 10;
    let fetcher = Arc::new(CatalogFake::new().with_page("C1", offset, u64::MAX, &ids("Z", 0..3)));
    let sink = Arc::new(CollectingSink::default());

    let crawler = Crawler::new(&config, fetcher.clone(), sink.clone());
    let supervisor = crawler.run(&config.catalog.categories, offset).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    let stats = supervisor.shutdown().await;

    assert_eq!(fetcher.offsets("C1"), vec![offset]);
    assert_eq!(stats.worker_restarts, 0);
    assert_eq!(stats.exhaustions, 1);
    assert_eq!(sink.skus().len(), 3);
}

#[tokio::test]
async fn test_oversized_freshness_window_does_not_panic() {
    let mut config = create_test_config("https://www.example.com", &["C1"], "");
    config.crawler.freshness_hours = 3_000_000_000_000_000;

    let crawler = Crawler::new(
        &config,
        Arc::new(CatalogFake::new()),
        Arc::new(CollectingSink::default()),
    );
    assert!(crawler.dedup().try_claim("X"));
    assert!(!crawler.dedup().try_claim("X"));
    assert_eq!(crawler.dedup().sweep(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_launching_stops_cleanly() {
    let config = create_test_config("https://www.example.com", &["C1", "C2", "C3", "C4"], "");
    let fetcher = Arc::new(
        CatalogFake::new()
            .with_page("C1", 0, 1, &ids("A", 0..1))
            .with_page("C2", 0, 1, &ids("B", 0..1))
            .with_page("C3", 0, 1, &ids("C", 0..1))
            .with_page("C4", 0, 1, &ids("D", 0..1)),
    );
    let sink = Arc::new(CollectingSink::default());
    let crawler = Crawler::new(&config, fetcher.clone(), sink.clone());

    // Launch interval is 10ms: launches at 0ms and 10ms, cancelled at 15ms
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        trigger.cancel();
    });

    let supervisor = crawler
        .run_with_cancellation(&config.catalog.categories, 0, cancel)
        .await;
    assert_eq!(supervisor.worker_count(), 2);
    let launched: Vec<String> = supervisor.categories().into_iter().map(String::from).collect();

    let stats = supervisor.wait().await;
    assert_eq!(stats.worker_restarts, 0);
    for category in &config.catalog.categories {
        assert_eq!(
            !fetcher.offsets(category).is_empty(),
            launched.contains(category),
            "{category}"
        );
    }
    assert_eq!(sink.skus().len(), 2);
}
