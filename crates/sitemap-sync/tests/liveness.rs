use sitemap_sync::acquisition::http_client::HttpClient;
use sitemap_sync::acquisition::liveness::filter_live;
use sitemap_sync::PageRecord;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_head(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn record(server: &MockServer, route: &str) -> PageRecord {
    PageRecord::new(format!("{}{route}", server.uri()), Some("2024-01-01".into()))
}

#[tokio::test]
async fn test_dead_and_redirected_pages_removed() {
    let server = MockServer::start().await;
    mount_head(&server, "/live/", ResponseTemplate::new(200)).await;
    mount_head(
        &server,
        "/moved/",
        ResponseTemplate::new(301).insert_header("Location", "/live/"),
    )
    .await;
    mount_head(
        &server,
        "/found/",
        ResponseTemplate::new(302).insert_header("Location", "/live/"),
    )
    .await;
    mount_head(&server, "/gone/", ResponseTemplate::new(404)).await;
    mount_head(&server, "/broken/", ResponseTemplate::new(500)).await;

    let records = vec![
        record(&server, "/moved/"),
        record(&server, "/live/"),
        record(&server, "/found/"),
        record(&server, "/gone/"),
        record(&server, "/broken/"),
    ];
    let client = HttpClient::new(Duration::from_secs(5)).unwrap();
    let (live, stats) = filter_live(records, &client, 4).await;

    assert_eq!(
        live,
        vec![record(&server, "/live/"), record(&server, "/broken/")]
    );
    assert_eq!(stats.probed, 5);
    assert_eq!(stats.dead, 3);
    assert_eq!(stats.unreachable, 0);
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    mount_head(
        &server,
        "/old/",
        ResponseTemplate::new(301).insert_header("Location", "/new/"),
    )
    .await;
    mount_head(&server, "/new/", ResponseTemplate::new(200)).await;

    let client = HttpClient::new(Duration::from_secs(5)).unwrap();
    let (live, _) = filter_live(vec![record(&server, "/old/")], &client, 1).await;
    assert!(live.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/old/");
}

#[tokio::test]
async fn test_failed_probe_does_not_abort_siblings() {
    let server = MockServer::start().await;
    mount_head(&server, "/a/", ResponseTemplate::new(200)).await;
    mount_head(
        &server,
        "/slow/",
        ResponseTemplate::new(200).set_delay(Duration::from_secs(2)),
    )
    .await;
    mount_head(&server, "/b/", ResponseTemplate::new(200)).await;

    let records = vec![
        record(&server, "/a/"),
        PageRecord::new("http://127.0.0.1:1/refused/", None),
        record(&server, "/slow/"),
        record(&server, "/b/"),
    ];
    let client = HttpClient::new(Duration::from_millis(200)).unwrap();
    let (live, stats) = filter_live(records, &client, 2).await;

    assert_eq!(live, vec![record(&server, "/a/"), record(&server, "/b/")]);
    assert_eq!(stats.unreachable, 2);
    assert_eq!(stats.live, 2);
}

#[tokio::test]
async fn test_empty_input() {
    let client = HttpClient::new(Duration::from_secs(1)).unwrap();
    let (live, stats) = filter_live(Vec::new(), &client, 4).await;
    assert!(live.is_empty());
    assert_eq!(stats.probed, 0);
}
