//! Upstream Catalog Integration Tests
//!
//! Exercises the reqwest catalog client and the retrieval service against a
//! mock HTTP upstream.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use timeseries_cache::{
    AppState, CacheConfig, HttpServer, HttpTimeSeriesSource, RetrievalError, RetrievalService,
    SeriesCache, SeriesKey, TimeRange, TimeSeriesSource, UpstreamConfig, UpstreamError,
};

fn catalog_body() -> serde_json::Value {
    json!([
        {
            "symbol": "AAPL",
            "period": "1min",
            "data": [
                {"time": "2024-05-14T10:00:00Z", "open": 150, "high": 151, "low": 149, "close": 150.5},
                {"time": "2024-05-14T10:01:00Z", "open": 150.5, "high": 152, "low": 150, "close": 151.75}
            ]
        },
        {
            "symbol": "MSFT",
            "period": "1min",
            "data": [
                {"time": "2024-05-14T10:00:00+02:00", "open": 410, "high": 411, "low": 409, "close": 410}
            ]
        }
    ])
}

async fn mount_catalog(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/timeseries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn source_for(server: &MockServer) -> HttpTimeSeriesSource {
    HttpTimeSeriesSource::new(&UpstreamConfig {
        url: format!("{}/timeseries", server.uri()),
        timeout: Some(Duration::from_secs(5)),
    })
    .unwrap()
}

fn whole_day() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 5, 14, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 14, 23, 59, 59).unwrap(),
    )
}

#[tokio::test]
async fn client_decodes_catalog() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;

    let catalog = source_for(&server).fetch_all().await.unwrap();

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0].key().cache_key(), "AAPL-1min");
    assert_eq!(catalog[0].data.len(), 2);
    assert_eq!(
        catalog[1].data[0].time,
        Utc.with_ymd_and_hms(2024, 5, 14, 8, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn client_reports_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeseries"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = source_for(&server).fetch_all().await.unwrap_err();

    assert!(matches!(err, UpstreamError::Status { status: 500 }));
}

#[tokio::test]
async fn client_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeseries"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch_all().await.unwrap_err();

    assert!(matches!(err, UpstreamError::InvalidPayload { .. }));
}

#[tokio::test]
async fn client_reports_unreachable_upstream() {
    let source = HttpTimeSeriesSource::new(&UpstreamConfig {
        url: "http://127.0.0.1:9/timeseries".to_string(),
        timeout: Some(Duration::from_secs(2)),
    })
    .unwrap();

    let err = source.fetch_all().await.unwrap_err();

    assert!(matches!(err, UpstreamError::Transport { .. }));
}

#[tokio::test]
async fn retrieval_fetches_catalog_once() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;

    let cache = Arc::new(SeriesCache::new(CacheConfig::default()));
    let retrieval = RetrievalService::new(Arc::clone(&cache), Arc::new(source_for(&server)));

    let aapl = retrieval
        .fetch_range(&SeriesKey::new("AAPL", "1min"), &whole_day())
        .await
        .unwrap();
    let msft = retrieval
        .fetch_range(&SeriesKey::new("MSFT", "1min"), &whole_day())
        .await
        .unwrap();

    assert_eq!(aapl.len(), 2);
    assert_eq!(msft.len(), 1);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn retrieval_surfaces_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeseries"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let cache = Arc::new(SeriesCache::new(CacheConfig::default()));
    let retrieval = RetrievalService::new(Arc::clone(&cache), Arc::new(source_for(&server)));
    let key = SeriesKey::new("AAPL", "1min");

    for _ in 0..2 {
        let err = retrieval.fetch_range(&key, &whole_day()).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Upstream(UpstreamError::Status { status: 502 })
        ));
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn server_serves_over_tcp() {
    let upstream = MockServer::start().await;
    mount_catalog(&upstream, 1).await;

    let cache = Arc::new(SeriesCache::new(CacheConfig::default()));
    let retrieval = Arc::new(RetrievalService::new(
        Arc::clone(&cache),
        Arc::new(source_for(&upstream)),
    ));

    let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), AppState::new(retrieval))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(server.run(cancel.clone()));

    let body: serde_json::Value = reqwest::get(format!(
        "http://{addr}/api?symbol=AAPL&period=1min&start=2024-05-14T10:01:00Z&end=2024-05-14T10:01:00Z"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(body["status"], true);
    assert_eq!(body["data"][0]["close"], 151.75);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_abandons_stalled_requests() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeseries"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(catalog_body())
                .set_delay(Duration::from_secs(3600)),
        )
        .mount(&upstream)
        .await;

    let cache = Arc::new(SeriesCache::new(CacheConfig::default()));
    let source = HttpTimeSeriesSource::new(&UpstreamConfig {
        url: format!("{}/timeseries", upstream.uri()),
        timeout: None,
    })
    .unwrap();
    let retrieval = Arc::new(RetrievalService::new(Arc::clone(&cache), Arc::new(source)));

    let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), AppState::new(retrieval))
        .await
        .unwrap()
        .with_shutdown_grace(Duration::from_millis(200));
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(server.run(cancel.clone()));

    let client = tokio::spawn(reqwest::get(format!(
        "http://{addr}/api?symbol=AAPL&period=1min&start=2024-05-14T00:00:00Z&end=2024-05-15T00:00:00Z"
    )));

    let mut waited = Duration::ZERO;
    while upstream
        .received_requests()
        .await
        .is_none_or(|requests| requests.is_empty())
    {
        assert!(waited < Duration::from_secs(5), "request never reached upstream");
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }

    cancel.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(5), handle).await;

    assert!(stopped.is_ok(), "server kept draining past the shutdown grace");
    stopped.unwrap().unwrap().unwrap();
    client.abort();
}
