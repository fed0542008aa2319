//! Transport seam for outbound HTTP.
//!
//! The client never talks to the network directly; it hands a fully built
//! [`OutboundRequest`] to a [`Transport`]. Production uses [`ReqwestTransport`].

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::resilience::Retryable;

/// A request ready to be put on the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

/// A fully received response.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl OutboundResponse {
    /// Body decoded as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Lower-cased `content-type`, empty when absent.
    pub fn content_type(&self) -> String {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

/// Connection-level failures. A received status code is never one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Io(String),

    /// The request could not be built; retrying cannot help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }
}

/// Something that can carry one request/response exchange.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<OutboundResponse, TransportError>>;
}

/// Transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Io(error.to_string())
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<OutboundResponse, TransportError>> {
        Box::pin(async move {
            let timeout = request.timeout;
            let mut builder = self
                .client
                .request(request.method, request.url)
                .headers(request.headers)
                .timeout(timeout);
            if let Some(body) = request.body {
                builder = builder.json(&body);
            }

            let response = builder.send().await.map_err(|e| classify(e, timeout))?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| classify(e, timeout))?
                .to_vec();

            Ok(OutboundResponse { status, headers, body })
        })
    }
}
