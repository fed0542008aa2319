//! Outbound client behaviour against real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;

use service_mesh::config::{HttpClientConfig, RetryConfig};
use service_mesh::http::{ClientError, HttpClient, RequestOptions};

mod common;

use common::MockReply;

fn client(rate_limit: u32, rate_period_ms: u64) -> HttpClient {
    HttpClient::from_config(
        &HttpClientConfig {
            timeout_ms: 500,
            rate_limit,
            rate_period_ms,
        },
        &RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
        },
    )
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { MockReply::text(500, "boom") }
    })
    .await;

    let err = client(10, 100)
        .get(&format!("http://{}/", backend), RequestOptions::default())
        .await
        .unwrap_err();

    match err {
        ClientError::UpstreamStatus { status, body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "boom");
        }
        other => panic!("expected upstream status, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_refused_exhausts_attempts() {
    let down = common::unused_addr().await;
    let err = client(10, 100)
        .get(&format!("http://{}/", down), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::TransportExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_rate_limit_spaces_requests() {
    let backend = common::start_mock_backend(serde_json::json!({ "ok": true })).await;
    let period = Duration::from_millis(300);
    let client = client(2, period.as_millis() as u64);
    let url = format!("http://{}/", backend);

    let start = Instant::now();
    for _ in 0..3 {
        client.get(&url, RequestOptions::default()).await.unwrap();
    }
    assert!(start.elapsed() >= period);
}
