use chrono::{TimeZone, Utc};
use sitemap_sync::cartography::sitemap::parse_urlset;
use sitemap_sync::storage::MemoryBlobStore;
use sitemap_sync::{DeployEnv, PageRecord, SyncConfig, SyncError, SyncPipeline};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn upstream(locs: &[&str]) -> String {
    let urls: String = locs
        .iter()
        .map(|loc| format!("<url><loc>{loc}</loc><lastmod>2024-01-01</lastmod></url>"))
        .collect();
    format!(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#)
}

async fn site(upstream_xml: String, live: &[&str], moved: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(upstream_xml))
        .mount(&server)
        .await;
    for route in live {
        Mock::given(method("HEAD"))
            .and(path(*route))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }
    for route in moved {
        Mock::given(method("HEAD"))
            .and(path(*route))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/"))
            .mount(&server)
            .await;
    }
    server
}

fn config(server: &MockServer) -> SyncConfig {
    SyncConfig::for_env(DeployEnv::Prod)
        .unwrap()
        .with_upstream(&format!("{}/sitemap.xml", server.uri()))
        .unwrap()
        .with_site_origin(&server.uri())
        .unwrap()
}

fn published(store: &MemoryBlobStore, object: &str) -> Vec<PageRecord> {
    let blob = store.get(object).expect("sitemap uploaded");
    let xml = String::from_utf8(blob.body).unwrap();
    parse_urlset(&xml)
        .unwrap()
        .into_iter()
        .map(|e| PageRecord::new(e.loc, e.lastmod))
        .collect()
}

#[tokio::test]
async fn test_merges_sources_and_drops_dead_pages() {
    let server = site(
        upstream(&[
            "https://edge.example/test/foo",
            "https://edge.example/docs/bar",
            "https://edge.example/docs/moved",
        ]),
        &["/docs/bar", "/docs/a/"],
        &["/docs/moved"],
    )
    .await;

    let store = MemoryBlobStore::with_page_size(2);
    let ts = Utc.with_ymd_and_hms(2023, 5, 5, 10, 0, 0).unwrap();
    store.insert("secured/a/index.html", ts);
    store.insert("docs/a/index.html", ts);
    store.insert("docs/gone/index.html", ts);
    store.insert("docs/1700000000/index.html", ts);

    let pipeline = SyncPipeline::new(config(&server).with_target_prefix("/blog/"), &store).unwrap();
    let (summary, _) = pipeline.run(false).await.unwrap();

    let origin = server.uri();
    assert_eq!(
        published(&store, "blog/sitemap.xml"),
        vec![
            PageRecord::new(format!("{origin}/docs/bar"), Some("2024-01-01".into())),
            PageRecord::new(format!("{origin}/docs/a/"), Some("2023-05-05".into())),
        ]
    );
    assert_eq!(summary.external_count, 2);
    assert_eq!(summary.inventory_count, 2);
    assert_eq!(summary.dropped_dead, 2);
    assert_eq!(summary.publish.object_path, "blog/sitemap.xml");
}

#[tokio::test]
async fn test_same_page_from_both_sources_is_kept_twice() {
    let server = site(
        upstream(&["https://edge.example/docs/a/"]),
        &["/docs/a/"],
        &[],
    )
    .await;

    let store = MemoryBlobStore::new();
    let ts = Utc.with_ymd_and_hms(2023, 5, 5, 10, 0, 0).unwrap();
    store.insert("docs/a/index.html", ts);

    let pipeline = SyncPipeline::new(config(&server), &store).unwrap();
    let (summary, _) = pipeline.run(false).await.unwrap();

    let records = published(&store, "sitemap.xml");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].loc, records[1].loc);
    assert_eq!(records[0].lastmod.as_deref(), Some("2024-01-01"));
    assert_eq!(records[1].lastmod.as_deref(), Some("2023-05-05"));
    assert_eq!(summary.duplicate_locs, 1);
}

#[tokio::test]
async fn test_rerun_overwrites_with_identical_bytes() {
    let server = site(upstream(&["https://edge.example/docs/bar"]), &["/docs/bar"], &[]).await;
    let store = MemoryBlobStore::new();

    let pipeline = SyncPipeline::new(config(&server), &store).unwrap();
    pipeline.run(false).await.unwrap();
    let first = store.get("sitemap.xml").unwrap().body;
    pipeline.run(false).await.unwrap();
    let second = store.get("sitemap.xml").unwrap().body;

    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_publishes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = MemoryBlobStore::new();
    let ts = Utc.with_ymd_and_hms(2023, 5, 5, 10, 0, 0).unwrap();
    store.insert("docs/a/index.html", ts);

    let pipeline = SyncPipeline::new(config(&server), &store).unwrap();
    let err = pipeline.run(false).await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch { .. }));
    assert!(store.get("sitemap.xml").is_none());
}

#[tokio::test]
async fn test_skip_liveness_and_dry_run() {
    let server = site(upstream(&["https://edge.example/docs/bar"]), &[], &[]).await;
    let store = MemoryBlobStore::new();

    let mut cfg = config(&server);
    cfg.skip_liveness = true;
    let pipeline = SyncPipeline::new(cfg, &store).unwrap();
    let (summary, xml) = pipeline.run(true).await.unwrap();

    assert!(!summary.publish.uploaded);
    assert!(store.is_empty());
    assert!(xml.contains("/docs/bar</loc>"));
}
