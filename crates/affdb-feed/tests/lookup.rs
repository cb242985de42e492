//! Integration tests for `FeedIndex::lookup` against a wiremock feed endpoint.
//!
//! Each test gets its own temp cache directory and mock server, so no real
//! network traffic or shared state is involved.

use std::io::{Cursor, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use affdb_core::{FeedSource, LookupOutcome};
use affdb_feed::{FeedFetcher, FeedIndex, FeedStore, FetchSettings, DEFAULT_MAX_AGE};
use rust_decimal::Decimal;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const HEADER: &str = "ean,product_GTIN,product_name,description,aw_image_url,store_price,aw_deep_link,aw_product_id,search_price,merchant_name,merchant_id,currency,merchant_deep_link,last_updated,display_price,stock_status";

const WIDGET_ROW: &str = "4006381333931,,Widget,A nice widget,,9.99,http://x/deep,123,14.99,Acme,1,EUR,http://x/merchant,2020-01-01,14.99,in stock";

fn csv(rows: &[&str]) -> String {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out
}

fn zip_of(entries: &[(&str, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(body.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

fn source(cache_dir: &Path) -> FeedSource {
    FeedSource::new("test-key", "4711", "AWIN", cache_dir)
}

fn index(server: &MockServer, cache_dir: &Path, max_age: Duration) -> FeedIndex {
    let source = source(cache_dir);
    let settings = FetchSettings {
        timeout_secs: 5,
        user_agent: "affdb-test/0.1".to_string(),
    };
    let fetcher = FeedFetcher::with_base_url(&source, &settings, &server.uri())
        .expect("fetcher construction should not fail");
    let store = FeedStore::for_source(&source, max_age);
    FeedIndex::new(source, store, fetcher)
}

fn feed_path() -> wiremock::matchers::PathRegexMatcher {
    path_regex(r"^/datafeed/download/apikey/test-key/language/de/fid/4711/columns/.+/compression/zip/$")
}

async fn mount_feed(server: &MockServer, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(feed_path())
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn zip_files_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".zip"))
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lookup_downloads_missing_feed_and_finds_product() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_feed(&server, zip_of(&[("datafeed_4711.csv", csv(&[WIDGET_ROW]))])).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    let outcome = index.lookup("4006381333931").await;

    let result = match outcome {
        LookupOutcome::Found(result) => result,
        other => panic!("expected Found, got: {other:?}"),
    };
    assert_eq!(result.identifier, "4006381333931");
    assert_eq!(result.partner_name, "AWIN");
    assert_eq!(result.name, "Widget");
    assert_eq!(result.description, "A nice widget");
    assert_eq!(result.image_url, None);
    assert_eq!(result.deep_link, "http://x/merchant");
    assert_eq!(result.best_offer, Some(Decimal::from_str("14.99").unwrap()));
    assert_eq!(result.currency.as_deref(), Some("EUR"));

    assert!(dir.path().join("awin-4711.csv").exists());
    assert!(zip_files_in(dir.path()).is_empty(), "scratch archive left behind");
}

#[tokio::test]
async fn fresh_cache_is_served_without_contacting_the_endpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    index
        .store()
        .install(csv(&[WIDGET_ROW]).as_bytes())
        .await
        .unwrap();

    let outcome = index.lookup("4006381333931").await;
    assert_eq!(outcome.found().map(|r| r.name.as_str()), Some("Widget"));
}

#[tokio::test]
async fn gtin_identifier_and_image_url_are_returned() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let row = ",00012345678905,Gadget,Shiny,http://img/g.jpg,,,,0,,,,http://m/g,,,preorder";
    mount_feed(&server, zip_of(&[("feed.csv", csv(&[row]))])).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    let outcome = index.lookup("00012345678905").await;

    let result = outcome.found().expect("expected Found");
    assert_eq!(result.image_url.as_deref(), Some("http://img/g.jpg"));
    assert_eq!(result.best_offer, None, "zero price must not be offered");
}

#[tokio::test]
async fn out_of_stock_product_is_withheld() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let row = "5000000000001,,Sold Out,,,,,,9.99,,,,http://m/s,,,out of stock";
    mount_feed(&server, zip_of(&[("feed.csv", csv(&[row]))])).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    assert_eq!(
        index.lookup("5000000000001").await,
        LookupOutcome::OutOfStock
    );
}

#[tokio::test]
async fn unknown_identifier_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_feed(&server, zip_of(&[("feed.csv", csv(&[WIDGET_ROW]))])).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    assert_eq!(index.lookup("0000000000000").await, LookupOutcome::NotFound);
    assert_eq!(index.lookup("").await, LookupOutcome::NotFound);
}

#[tokio::test]
async fn duplicate_identifier_returns_last_row() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let rows = [
        "6000000000001,,Old Name,,,,,,1.00,,,,http://m/old,,,in stock",
        "6000000000001,,New Name,,,,,,2.00,,,,http://m/new,,,in stock",
    ];
    mount_feed(&server, zip_of(&[("feed.csv", csv(&rows))])).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    let outcome = index.lookup("6000000000001").await;

    let result = outcome.found().expect("expected Found");
    assert_eq!(result.name, "New Name");
    assert_eq!(result.deep_link, "http://m/new");
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remote_error_keeps_previous_cache() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(feed_path())
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    // Zero max age: every lookup considers the cache stale.
    let index = index(&server, dir.path(), Duration::ZERO);
    let previous = csv(&[WIDGET_ROW]);
    index.store().install(previous.as_bytes()).await.unwrap();

    let outcome = index.lookup("4006381333931").await;

    let reason = match outcome {
        LookupOutcome::FetchFailed(reason) => reason,
        other => panic!("expected FetchFailed, got: {other:?}"),
    };
    assert!(reason.contains("503"), "reason should carry status: {reason}");
    let cached = index.store().read_raw().await.unwrap().unwrap();
    assert_eq!(cached, previous.into_bytes());
    assert!(zip_files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn remote_error_without_cache_fails_lookup() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    let outcome = index.lookup("4006381333931").await;

    assert!(
        matches!(outcome, LookupOutcome::FetchFailed(ref r) if r.contains("401")),
        "expected FetchFailed(401), got: {outcome:?}"
    );
    assert!(!dir.path().join("awin-4711.csv").exists());
}

#[tokio::test]
async fn archive_with_two_files_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let body = zip_of(&[("a.csv", csv(&[WIDGET_ROW])), ("b.csv", csv(&[]))]);
    mount_feed(&server, body).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    let outcome = index.lookup("4006381333931").await;

    assert!(
        matches!(outcome, LookupOutcome::FetchFailed(ref r) if r.contains("exactly one")),
        "expected FetchFailed for multi-entry archive, got: {outcome:?}"
    );
    assert!(!dir.path().join("awin-4711.csv").exists());
    assert!(zip_files_in(dir.path()).is_empty(), "scratch archive left behind");
}

#[tokio::test]
async fn corrupt_archive_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_feed(&server, b"this is not a zip".to_vec()).await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    let outcome = index.lookup("4006381333931").await;

    assert!(
        matches!(outcome, LookupOutcome::FetchFailed(_)),
        "expected FetchFailed, got: {outcome:?}"
    );
    assert!(zip_files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_fetch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = source(dir.path());
    let settings = FetchSettings {
        timeout_secs: 2,
        user_agent: "affdb-test/0.1".to_string(),
    };
    let fetcher = FeedFetcher::with_base_url(&source, &settings, "http://127.0.0.1:1")
        .expect("fetcher construction should not fail");
    let store = FeedStore::for_source(&source, DEFAULT_MAX_AGE);
    let index = FeedIndex::new(source, store, fetcher);

    let outcome = index.lookup("4006381333931").await;
    assert!(
        matches!(outcome, LookupOutcome::FetchFailed(ref r) if r.starts_with("HTTP error")),
        "expected transport FetchFailed, got: {outcome:?}"
    );
}

// ---------------------------------------------------------------------------
// Refresh and parse cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reinstalled_feed_invalidates_parse_cache() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);

    index
        .store()
        .install(csv(&["7000000000001,,Before,,,,,,1,,,,http://m/7,,,in stock"]).as_bytes())
        .await
        .unwrap();
    let first = index.lookup("7000000000001").await;
    assert_eq!(first.found().map(|r| r.name.as_str()), Some("Before"));

    // Make sure the replacement gets a distinct mtime on coarse filesystems.
    tokio::time::sleep(Duration::from_millis(20)).await;
    index
        .store()
        .install(csv(&["7000000000001,,After,,,,,,1,,,,http://m/7,,,in stock"]).as_bytes())
        .await
        .unwrap();

    let second = index.lookup("7000000000001").await;
    assert_eq!(second.found().map(|r| r.name.as_str()), Some("After"));
}

#[tokio::test]
async fn stale_cache_is_replaced_by_fetched_feed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let first = csv(&["7000000000001,,Fetched once,,,,,,2.50,,,EUR,http://m/7,,,in stock"]);
    let second = csv(&["7000000000001,,Fetched twice over,,,,,,3.75,,,EUR,http://m/7b,,,in stock"]);
    Mock::given(method("GET"))
        .and(feed_path())
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_of(&[("feed.csv", first)])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(feed_path())
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_of(&[("feed.csv", second)])))
        .expect(1)
        .mount(&server)
        .await;

    // Zero max age: every lookup considers the cache stale.
    let index = index(&server, dir.path(), Duration::ZERO);
    index
        .store()
        .install(csv(&["7000000000001,,Cached,,,,,,1,,,EUR,http://m/old,,,in stock"]).as_bytes())
        .await
        .unwrap();

    let outcome = index.lookup("7000000000001").await;
    let result = outcome.found().expect("expected Found after refetch");
    assert_eq!(result.name, "Fetched once");
    assert_eq!(result.best_offer, Some(Decimal::from_str("2.50").unwrap()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let outcome = index.lookup("7000000000001").await;
    let result = outcome.found().expect("expected Found after second refetch");
    assert_eq!(result.name, "Fetched twice over");
    assert_eq!(result.deep_link, "http://m/7b");
    assert!(zip_files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn reinstall_with_same_mtime_but_new_length_is_reparsed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);

    index
        .store()
        .install(csv(&["7000000000001,,Short,,,,,,1,,,,http://m/7,,,in stock"]).as_bytes())
        .await
        .unwrap();
    let modified = index.store().modified().await.unwrap().expect("file exists");
    let first = index.lookup("7000000000001").await;
    assert_eq!(first.found().map(|r| r.name.as_str()), Some("Short"));

    index
        .store()
        .install(csv(&["7000000000001,,Considerably longer,,,,,,1,,,,http://m/7,,,in stock"]).as_bytes())
        .await
        .unwrap();
    // Simulate a filesystem whose timestamps did not tick between installs.
    std::fs::File::options()
        .write(true)
        .open(index.store().path())
        .unwrap()
        .set_modified(modified)
        .unwrap();
    assert_eq!(index.store().modified().await.unwrap(), Some(modified));

    let second = index.lookup("7000000000001").await;
    assert_eq!(second.found().map(|r| r.name.as_str()), Some("Considerably longer"));
}

#[tokio::test]
async fn refresh_downloads_even_when_cache_is_fresh() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(feed_path())
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_of(&[("feed.csv", csv(&[WIDGET_ROW]))])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let index = index(&server, dir.path(), DEFAULT_MAX_AGE);
    index.store().install(csv(&[]).as_bytes()).await.unwrap();
    assert_eq!(index.lookup("4006381333931").await, LookupOutcome::NotFound);

    tokio::time::sleep(Duration::from_millis(20)).await;
    index.refresh().await.expect("refresh should succeed");

    assert!(index.lookup("4006381333931").await.found().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stale_lookups_all_succeed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_feed(&server, zip_of(&[("feed.csv", csv(&[WIDGET_ROW]))])).await;

    let index = Arc::new(index(&server, dir.path(), DEFAULT_MAX_AGE));
    let lookups = (0..8).map(|_| {
        let index = Arc::clone(&index);
        tokio::spawn(async move { index.lookup("4006381333931").await })
    });

    for outcome in futures::future::join_all(lookups).await {
        let outcome = outcome.expect("lookup task panicked");
        assert!(outcome.found().is_some(), "expected Found, got: {outcome:?}");
    }
    assert!(zip_files_in(dir.path()).is_empty());
}
