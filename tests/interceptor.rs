//! Request interception against a real HTTP server

use assert_matches::assert_matches;
use procurement_offline::client::offline::{MemoryQueueStore, QueueStore};
use procurement_offline::client::sync::{
    BackgroundSync, ConnectivityMonitor, HttpDelivery, SyncCoordinator,
};
use procurement_offline::client::Config;
use procurement_offline::interceptor::{
    InterceptedRequest, MemoryResponseCache, ReqwestNetwork, RequestInterceptor, ResponseSource,
};
use procurement_offline::shared::config::AppConfig;
use procurement_offline::shared::FetchError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes that are not valid UTF-8, to catch any lossy conversion
const LOGO: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0x00, 0xfe];

async fn app_server() -> MockServer {
    let server = MockServer::start().await;
    for (route, body) in [
        ("/", "<html>shell</html>"),
        ("/index.html", "<html>shell</html>"),
        ("/manifest.json", r#"{"name":"Procurement"}"#),
        ("/api/v1/catalog", r#"{"items":["A-1"]}"#),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(LOGO),
        )
        .mount(&server)
        .await;
    server
}

async fn active_interceptor(server: &MockServer) -> (Config, RequestInterceptor) {
    let config = Config::with_builder(AppConfig::builder().server_url(server.uri())).unwrap();
    let interceptor = RequestInterceptor::from_config(
        &config,
        Arc::new(MemoryResponseCache::new()),
        Arc::new(ReqwestNetwork::new(Duration::from_secs(5)).unwrap()),
    )
    .unwrap();
    interceptor.install().await.unwrap();
    (config, interceptor)
}

fn url(server_uri: &str, route: &str) -> Url {
    Url::parse(server_uri).unwrap().join(route).unwrap()
}

#[tokio::test]
async fn test_static_asset_served_byte_for_byte_offline() {
    let server = app_server().await;
    let uri = server.uri();
    let (_, interceptor) = active_interceptor(&server).await;
    let request = InterceptedRequest::get(url(&uri, "/img/logo.png"));

    let online = interceptor.handle_fetch(&request).await.unwrap();
    assert_eq!(online.source, ResponseSource::Network);
    assert_eq!(online.response.body.as_ref(), LOGO);

    drop(server);

    let offline = interceptor.handle_fetch(&request).await.unwrap();
    assert_eq!(offline.source, ResponseSource::Cache);
    assert_eq!(offline.response.body.as_ref(), LOGO);
    assert_eq!(offline.response.headers["content-type"], "image/png");
}

#[tokio::test]
async fn test_api_falls_back_to_cache_when_network_down() {
    let server = app_server().await;
    let uri = server.uri();
    let (_, interceptor) = active_interceptor(&server).await;
    let request = InterceptedRequest::get(url(&uri, "/api/v1/catalog"));

    assert_eq!(
        interceptor.handle_fetch(&request).await.unwrap().source,
        ResponseSource::Network
    );

    drop(server);

    let served = interceptor.handle_fetch(&request).await.unwrap();
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.body, r#"{"items":["A-1"]}"#);

    let uncached = InterceptedRequest::get(url(&uri, "/api/v1/projects"));
    assert_matches!(
        interceptor.handle_fetch(&uncached).await,
        Err(FetchError::Network { .. })
    );
}

#[tokio::test]
async fn test_navigation_served_from_shell_offline() {
    let server = app_server().await;
    let uri = server.uri();
    let (_, interceptor) = active_interceptor(&server).await;
    drop(server);

    let served = interceptor
        .handle_fetch(&InterceptedRequest::navigate(url(&uri, "/projects/17")))
        .await
        .unwrap();
    assert_eq!(served.source, ResponseSource::RootFallback);
    assert_eq!(served.response.body, "<html>shell</html>");
}

#[tokio::test]
async fn test_sync_event_drains_queue() {
    let server = app_server().await;
    Mock::given(method("POST"))
        .and(path("/api/brain/sync"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    let (config, interceptor) = active_interceptor(&server).await;

    let store = Arc::new(MemoryQueueStore::new());
    store.put("order-1", json!({ "sku": "A-1" })).await.unwrap();
    store.put("order-2", json!({ "sku": "B-2" })).await.unwrap();
    let coordinator = SyncCoordinator::new(
        store.clone(),
        ConnectivityMonitor::new(true),
        Arc::new(HttpDelivery::from_config(&config).unwrap()),
    );
    let background = BackgroundSync::new(
        config.app().sync_tag.clone(),
        coordinator,
        config.app().pending_refresh,
    );
    let interceptor = interceptor.with_background_sync(Arc::new(background));

    assert!(interceptor.handle_sync("sync-photos").await.is_none());
    let synced = interceptor.handle_sync("sync-orders").await.unwrap().unwrap();
    assert_eq!(synced, 2);
    assert_eq!(store.count_pending().await.unwrap(), 0);
}
