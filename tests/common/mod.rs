//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use service_mesh::config::MeshConfig;
use service_mesh::{HttpServer, MeshContext, Shutdown};

pub const API_KEY: &str = "test-key";

/// What the mock backend saw.
#[derive(Debug, Clone, Default)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the mock backend answers.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: Some("text/plain"),
            body: body.to_string(),
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

    Some(CapturedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let reply = f(request).await;
                let content_type = reply
                    .content_type
                    .map(|ct| format!("Content-Type: {}\r\n", ct))
                    .unwrap_or_default();
                let response = format!(
                    "HTTP/1.1 {} {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reason(reply.status),
                    content_type,
                    reply.body.len(),
                    reply.body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}

/// Start a mock backend that always returns the same JSON body.
pub async fn start_mock_backend(body: serde_json::Value) -> SocketAddr {
    start_programmable_backend(move |_| {
        let body = body.clone();
        async move { MockReply::json(200, body) }
    })
    .await
}

/// A backend that accepts and reads requests but never answers.
pub async fn start_hung_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                std::future::pending::<()>().await;
                drop(socket);
            });
        }
    });

    addr
}

/// An address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config that never reaches Redis and retries quickly.
pub fn test_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.cache.url = "redis://127.0.0.1:1/0".to_string();
    config.cache.connect_timeout_ms = 300;
    config.services.api_keys = vec![API_KEY.to_string()];
    config.http_client.timeout_ms = 500;
    config.http_client.rate_limit = 50;
    config.http_client.rate_period_ms = 100;
    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config
}

/// A running mesh server.
pub struct TestMesh {
    pub addr: SocketAddr,
    pub ctx: Arc<MeshContext>,
    shutdown: Shutdown,
}

impl TestMesh {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn services_url(&self, path: &str) -> String {
        self.url(&format!("/api/v1/services{}", path))
    }
}

impl Drop for TestMesh {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bootstrap a mesh from `config` and serve it on an ephemeral port.
pub async fn start_mesh(config: MeshConfig) -> TestMesh {
    let ctx = Arc::new(MeshContext::bootstrap(config).await);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(ctx.clone());
    let stop = shutdown.signalled();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    TestMesh { addr, ctx, shutdown }
}

/// Client that does not pool connections or honour proxy env vars.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
