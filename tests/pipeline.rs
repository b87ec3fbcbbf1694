//! End-to-end runs of index → queue → fetch against an in-process archive stub.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;

use listing_history::admin::QueueAdmin;
use listing_history::classify::Classifier;
use listing_history::config::SiteProfile;
use listing_history::extract::Extractor;
use listing_history::fetch::{ArchiveClient, FetchOptions, FetchSummary, FetchWorkerPool};
use listing_history::http_client::HttpClient;
use listing_history::index::{page_file_name, pattern_dir, IndexFetcher, IndexReport};
use listing_history::models::{EventType, WorkItemStatus};
use listing_history::queue::{QueueBuilder, QueueError};
use listing_history::rate_limit::RetryPolicy;
use listing_history::repository::DbContext;

const PATTERN: &str = "streeteasy.com/*";

struct Stub {
    index_pages: Vec<String>,
    snapshots: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
    page_requests: Mutex<Vec<usize>>,
    /// Index page number -> number of 503s still to serve for it.
    page_failures: Mutex<HashMap<usize, u32>>,
}

impl Stub {
    fn requests_for(&self, original: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|path| path.ends_with(&format!("id_/{}", original)))
            .cloned()
            .collect()
    }

    fn page_requests_for(&self, page: usize) -> usize {
        self.page_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == page)
            .count()
    }
}

async fn cdx(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let matches = params.get("url").map(String::as_str) == Some(PATTERN);
    if params.contains_key("showNumPages") {
        let pages = if matches { stub.index_pages.len() } else { 0 };
        return pages.to_string().into_response();
    }
    let page: usize = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    if !matches {
        return String::new().into_response();
    }
    stub.page_requests.lock().unwrap().push(page);
    if let Some(remaining) = stub.page_failures.lock().unwrap().get_mut(&page) {
        if *remaining > 0 {
            *remaining -= 1;
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }
    stub.index_pages
        .get(page)
        .cloned()
        .unwrap_or_default()
        .into_response()
}

async fn snapshot(State(stub): State<Arc<Stub>>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    stub.requests.lock().unwrap().push(path.clone());
    let original = path.split_once("id_/").map(|(_, rest)| rest).unwrap_or("");
    match stub.snapshots.get(original) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_stub(stub: Arc<Stub>) -> String {
    let app = Router::new()
        .route("/cdx", get(cdx))
        .route("/web/*rest", get(snapshot))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn index_page(rows: &[(&str, &str)]) -> String {
    let mut table = vec![json!(["timestamp", "original", "statuscode", "mimetype", "length"])];
    table.extend(
        rows.iter()
            .map(|(ts, url)| json!([ts, url, "200", "text/html", "1234"])),
    );
    serde_json::Value::Array(table).to_string()
}

fn history_page(entries: serde_json::Value) -> String {
    format!(
        "<html><head><script>var props = {};</script></head><body></body></html>",
        json!({ "priceHistory": entries })
    )
}

/// Three index pages: four distinct unit listings (one captured twice) and
/// two non-content URLs.
fn fixture_stub() -> Stub {
    let index_pages = vec![
        index_page(&[
            ("20180101000000", "https://streeteasy.com/sale/100"),
            ("20170101000000", "http://streeteasy.com/rental/200/"),
            ("20170101000000", "https://streeteasy.com/search?area=nyc"),
        ]),
        index_page(&[
            ("20190101000000", "https://streeteasy.com/sale/100"),
            ("20180301000000", "https://streeteasy.com/sale/300/"),
            ("20170101000000", "https://streeteasy.com/for-rent/nyc"),
        ]),
        index_page(&[("20180601000000", "https://streeteasy.com/rental/400")]),
    ];

    let sale_100 = format!(
        r#"<html><head><script>window.dataLayer = [{{"event": "pageview", "listing": {{"price": "$950,000", "beds": 2, "address": "100 Main St #1A"}}}}];</script></head>
        <body>{}</body></html>"#,
        history_page(json!([
            {"date": "2018-03-01", "event": "Listed by Jane Doe", "price": 1000000},
            {"date": "2018-06-01", "event": "Price decreased", "price": 950000}
        ]))
    );

    let snapshots = HashMap::from([
        ("https://streeteasy.com/sale/100".to_string(), sale_100),
        (
            "https://streeteasy.com/rental/200".to_string(),
            history_page(json!([
                {"date": "2017-01-05", "event": "Listed", "price": 3200},
                {"date": "2017-02-10", "event": "Rented", "price": 3200}
            ])),
        ),
        (
            "https://streeteasy.com/sale/300".to_string(),
            history_page(json!([
                {"date": "2018-02-01", "event": "Listed", "price": 750000},
                {"date": "2018-09-01", "event": "Sold", "price": 740000}
            ])),
        ),
        (
            "https://streeteasy.com/rental/400".to_string(),
            history_page(json!([
                {"date": "2018-05-01", "event": "Listed", "price": 2800},
                {"event": "Browse Buildings"}
            ])),
        ),
    ]);

    Stub {
        index_pages,
        snapshots,
        requests: Mutex::new(Vec::new()),
        page_requests: Mutex::new(Vec::new()),
        page_failures: Mutex::new(HashMap::new()),
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    db: DbContext,
    db_path: std::path::PathBuf,
    index_dir: std::path::PathBuf,
    base: String,
    stub: Arc<Stub>,
}

impl Harness {
    async fn new(stub: Stub) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("listings.db");
        let db = DbContext::from_path(&db_path);
        db.migrate().await.unwrap();
        let stub = Arc::new(stub);
        let base = spawn_stub(stub.clone()).await;
        Self {
            index_dir: dir.path().join("index"),
            _dir: dir,
            db,
            db_path,
            base,
            stub,
        }
    }

    fn client() -> HttpClient {
        HttpClient::builder(Duration::from_secs(10)).build().unwrap()
    }

    fn index_fetcher(&self) -> IndexFetcher {
        IndexFetcher::new(
            Self::client(),
            format!("{}/cdx", self.base),
            &self.index_dir,
            1000,
            RetryPolicy::immediate(2),
        )
    }

    async fn try_index(&self) -> IndexReport {
        self.index_fetcher()
            .download_index(&[PATTERN.to_string()], 2)
            .await
            .unwrap()
    }

    async fn index(&self) {
        let report = self.try_index().await;
        assert!(report.is_complete(), "{:?}", report);
        assert_eq!(report.downloaded(), 3);
    }

    fn queue_builder(&self) -> QueueBuilder {
        let classifier = Classifier::new(&SiteProfile::default()).unwrap();
        QueueBuilder::new(self.db.clone(), classifier, &self.index_dir)
    }

    async fn fetch(&self) -> FetchSummary {
        let source = Arc::new(ArchiveClient::new(Self::client(), format!("{}/web", self.base)));
        let extractor = Arc::new(Extractor::for_site(&SiteProfile::default()).unwrap());
        let pool = FetchWorkerPool::new(self.db.clone(), source, extractor, RetryPolicy::immediate(3));
        pool.run(
            FetchOptions {
                concurrency: 2,
                rate: 200.0,
                limit: None,
                category: None,
                report_interval: Duration::from_secs(60),
            },
            None,
        )
        .await
        .unwrap()
    }
}

fn count_rows(db_path: &Path, sql: &str) -> i64 {
    let conn = rusqlite::Connection::open(db_path).unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[tokio::test]
async fn test_index_queue_fetch_end_to_end() {
    let h = Harness::new(fixture_stub()).await;
    h.index().await;

    let report = h.queue_builder().build_queue().await.unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.inserted, 4);

    let summary = h.fetch().await;
    assert_eq!(summary.claimed, 4);
    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.events, 7);

    let work_items = h.db.work_items();
    for url in [
        "https://streeteasy.com/sale/100",
        "https://streeteasy.com/rental/200",
        "https://streeteasy.com/sale/300",
        "https://streeteasy.com/rental/400",
    ] {
        let item = work_items.get_by_url(url).await.unwrap().unwrap();
        assert_eq!(item.status, WorkItemStatus::Fetched, "{}", url);
    }

    // The newest capture of a URL is the one fetched.
    let requested = h.stub.requests_for("https://streeteasy.com/sale/100");
    assert_eq!(requested.len(), 1);
    assert!(requested[0].contains("20190101000000id_/"));

    let extracted = h.db.extracted();
    let events = extracted
        .events_for_url("https://streeteasy.com/sale/100")
        .await
        .unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(kinds, vec![EventType::Listed, EventType::PriceChange]);
    assert_eq!(events[0].broker.as_deref(), Some("Jane Doe"));
    assert_eq!(events[0].event_date.as_deref(), Some("2018-03-01"));

    let metadata = extracted
        .metadata_for_url("https://streeteasy.com/sale/100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.facts.price, Some(950_000.0));
    assert_eq!(metadata.snapshot_timestamp.as_deref(), Some("20190101000000"));

    let rental = extracted
        .events_for_url("https://streeteasy.com/rental/400")
        .await
        .unwrap();
    assert_eq!(rental.len(), 1);

    // A second run finds nothing left to do.
    let again = h.fetch().await;
    assert_eq!(again.claimed, 0);

    let admin = QueueAdmin::new(h.db.clone(), &h.index_dir);
    let status = admin.status(10).await.unwrap();
    assert_eq!(status.count(WorkItemStatus::Fetched), 4);
    assert_eq!(status.extracted.price_events, 7);
    assert_eq!(status.index.len(), 1);
    assert_eq!(status.index[0].files, 3);

    let csv_path = h.index_dir.parent().unwrap().join("events.csv");
    assert_eq!(admin.export(&csv_path).await.unwrap(), 7);
}

#[tokio::test]
async fn test_index_skips_pages_on_disk() {
    let h = Harness::new(fixture_stub()).await;
    h.index().await;

    let dir = pattern_dir(&h.index_dir, PATTERN);
    std::fs::remove_file(dir.join(page_file_name(1))).unwrap();

    let report = h.try_index().await;
    assert!(report.is_complete(), "{:?}", report);
    assert_eq!(report.patterns[0].total_pages, 3);
    assert_eq!(report.patterns[0].already_present, 2);
    assert_eq!(report.downloaded(), 1);

    assert_eq!(h.stub.page_requests_for(0), 1);
    assert_eq!(h.stub.page_requests_for(1), 2);
    assert_eq!(h.stub.page_requests_for(2), 1);
    assert!(dir.join(page_file_name(1)).exists());
}

#[tokio::test]
async fn test_failed_index_page_is_fetched_next_run() {
    let stub = fixture_stub();
    // Fails every attempt of the first run.
    stub.page_failures.lock().unwrap().insert(1, 2);
    let h = Harness::new(stub).await;

    let first = h.try_index().await;
    assert!(!first.is_complete());
    assert_eq!(first.failed(), 1);
    assert_eq!(first.downloaded(), 2);
    let dir = pattern_dir(&h.index_dir, PATTERN);
    assert!(!dir.join(page_file_name(1)).exists());
    assert_eq!(h.stub.page_requests_for(1), 2);

    let second = h.try_index().await;
    assert!(second.is_complete(), "{:?}", second);
    assert_eq!(second.patterns[0].already_present, 2);
    assert_eq!(second.downloaded(), 1);
    assert_eq!(h.stub.page_requests_for(0), 1);
    assert_eq!(h.stub.page_requests_for(1), 3);
    assert_eq!(h.stub.page_requests_for(2), 1);

    let report = h.queue_builder().build_queue().await.unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.inserted, 4);
}

#[tokio::test]
async fn test_queue_is_idempotent() {
    let h = Harness::new(fixture_stub()).await;
    h.index().await;

    let first = h.queue_builder().build_queue().await.unwrap();
    assert_eq!(first.inserted, 4);
    let second = h.queue_builder().build_queue().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.advanced, 0);
    assert_eq!(count_rows(&h.db_path, "SELECT COUNT(*) FROM work_items"), 4);
}

#[tokio::test]
async fn test_queue_without_index_data() {
    let h = Harness::new(fixture_stub()).await;
    assert!(matches!(
        h.queue_builder().build_queue().await,
        Err(QueueError::NoIndexData(_))
    ));
}

#[tokio::test]
async fn test_rerun_after_partial_write() {
    let h = Harness::new(fixture_stub()).await;
    h.index().await;
    h.queue_builder().build_queue().await.unwrap();

    // Metadata left behind for an item that never reached `fetched`.
    let conn = rusqlite::Connection::open(&h.db_path).unwrap();
    conn.execute(
        "INSERT INTO extracted_metadata (url, price, extracted_at) VALUES (?1, 1.0, '2020-01-01T00:00:00+00:00')",
        ["https://streeteasy.com/sale/100"],
    )
    .unwrap();
    drop(conn);

    let summary = h.fetch().await;
    assert_eq!(summary.fetched, 4);

    assert_eq!(
        count_rows(
            &h.db_path,
            "SELECT COUNT(*) FROM extracted_metadata WHERE url = 'https://streeteasy.com/sale/100'"
        ),
        1
    );
    assert_eq!(
        count_rows(
            &h.db_path,
            "SELECT COUNT(*) FROM price_events WHERE url = 'https://streeteasy.com/sale/100'"
        ),
        2
    );
    let metadata = h
        .db
        .extracted()
        .metadata_for_url("https://streeteasy.com/sale/100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.facts.price, Some(950_000.0));
}

#[tokio::test]
async fn test_missing_snapshot_is_terminal() {
    let mut stub = fixture_stub();
    stub.snapshots.remove("https://streeteasy.com/sale/300");
    let h = Harness::new(stub).await;
    h.index().await;
    h.queue_builder().build_queue().await.unwrap();

    let summary = h.fetch().await;
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.failed, 1);

    // 404 is not retried.
    assert_eq!(h.stub.requests_for("https://streeteasy.com/sale/300").len(), 1);

    let item = h
        .db
        .work_items()
        .get_by_url("https://streeteasy.com/sale/300")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, WorkItemStatus::Error);
    assert_eq!(item.error_message.as_deref(), Some("not_found"));
    assert_eq!(item.attempt_count, 1);

    let admin = QueueAdmin::new(h.db.clone(), &h.index_dir);
    assert_eq!(admin.retry(3).await.unwrap(), 1);
    assert_eq!(
        h.db.work_items()
            .get_by_url("https://streeteasy.com/sale/300")
            .await
            .unwrap()
            .unwrap()
            .status,
        WorkItemStatus::Pending
    );
}
