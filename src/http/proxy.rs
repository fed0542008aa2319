//! Proxying a request to a registered service.
//!
//! # Steps
//! ```text
//! service name ─→ registry.get ──(absent)──→ ServiceNotFound
//!                     │
//!                 base URL + relative path (one slash between)
//!                     │
//!                 HttpClient::request
//!                     │
//!     ┌───────────────┼────────────────────┐
//!   2xx/3xx       UpstreamStatus      TransportExhausted
//!  {status,data}  (status + body)         → 502
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::http::client::{ClientError, HttpClient, RequestOptions};
use crate::http::request::X_REQUEST_ID;
use crate::http::transport::OutboundResponse;
use crate::registry::ServiceRegistry;

/// What the caller wants sent to the target service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyRequest {
    /// HTTP method, any case.
    pub method: String,
    /// Path relative to the service's base URL.
    pub path: String,
    /// JSON body.
    pub payload: Option<Value>,
    pub headers: Option<HashMap<String, String>>,
    pub query: Option<serde_json::Map<String, Value>>,
}

impl Default for ProxyRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            payload: None,
            headers: None,
            query: None,
        }
    }
}

/// Downstream body, parsed when it declared JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyData {
    Json(Value),
    Text(String),
}

/// Uniform proxy result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub status_code: u16,
    pub data: ProxyData,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Service not registered: {0}")]
    ServiceNotFound(String),

    /// Downstream error status, passed through verbatim.
    #[error("upstream responded with status {status}")]
    Upstream { status: StatusCode, body: String },

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("invalid proxy request: {0}")]
    InvalidRequest(String),

    #[error("proxy is shutting down")]
    Unavailable,
}

impl From<ClientError> for ProxyError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::UpstreamStatus { status, body } => {
                // reqwest and axum share the `http` crate, so this is a plain copy.
                ProxyError::Upstream { status, body }
            }
            e @ ClientError::TransportExhausted { .. } => ProxyError::BadGateway(e.to_string()),
            ClientError::InvalidRequest(msg) => ProxyError::InvalidRequest(msg),
            ClientError::Closed => ProxyError::Unavailable,
        }
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ProxyError::ServiceNotFound(_) => "Service not registered".to_string(),
            ProxyError::Upstream { body, .. } => body,
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Parse a method name case-insensitively.
pub fn normalize_method(method: &str) -> Result<Method, ProxyError> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(ProxyError::InvalidRequest("empty method".to_string()));
    }
    Method::from_bytes(upper.as_bytes())
        .map_err(|_| ProxyError::InvalidRequest(format!("invalid method '{}'", method)))
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ProxyError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ProxyError::InvalidRequest(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ProxyError::InvalidRequest(format!("invalid value for header '{}'", name)))?;
        // Names are case-insensitive; two spellings of one header are ambiguous.
        if map.contains_key(&name) {
            return Err(ProxyError::InvalidRequest(format!("duplicate header '{}'", name)));
        }
        map.insert(name, value);
    }
    Ok(map)
}

/// Flatten JSON query values into string pairs. Arrays repeat the key.
fn query_pairs(query: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    fn scalar(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    let mut pairs = Vec::with_capacity(query.len());
    for (key, value) in query {
        match value {
            Value::Array(items) => pairs.extend(items.iter().map(|v| (key.clone(), scalar(v)))),
            other => pairs.push((key.clone(), scalar(other))),
        }
    }
    pairs
}

fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence == "application/json" || essence.ends_with("+json")
}

/// Turn a successful downstream response into the uniform result.
pub fn normalize_response(response: &OutboundResponse) -> ProxyResponse {
    let text = response.text();
    let data = if is_json_media_type(&response.content_type()) && !text.is_empty() {
        match serde_json::from_str(&text) {
            Ok(value) => ProxyData::Json(value),
            Err(e) => {
                tracing::debug!(error = %e, "Upstream declared JSON but body did not parse, passing text through");
                ProxyData::Text(text)
            }
        }
    } else {
        ProxyData::Text(text)
    };

    ProxyResponse {
        status_code: response.status.as_u16(),
        data,
    }
}

/// Resolves services and forwards requests to them.
#[derive(Debug, Clone)]
pub struct ServiceProxy {
    registry: Arc<ServiceRegistry>,
    client: Arc<HttpClient>,
}

impl ServiceProxy {
    pub fn new(registry: Arc<ServiceRegistry>, client: Arc<HttpClient>) -> Self {
        Self { registry, client }
    }

    /// Forward `request` to `service`. `request_id` is attached as
    /// `x-request-id` unless the caller supplied one.
    pub async fn forward(
        &self,
        service: &str,
        request: ProxyRequest,
        request_id: Option<&str>,
    ) -> Result<ProxyResponse, ProxyError> {
        let base_url = self
            .registry
            .get(service)
            .ok_or_else(|| ProxyError::ServiceNotFound(service.to_string()))?;

        let method = normalize_method(&request.method)?;
        let target = join_url(&base_url, &request.path);

        let mut headers = match &request.headers {
            Some(h) => header_map(h)?,
            None => HeaderMap::new(),
        };
        if let Some(id) = request_id {
            if !headers.contains_key(X_REQUEST_ID) {
                if let Ok(value) = HeaderValue::from_str(id) {
                    headers.insert(X_REQUEST_ID, value);
                }
            }
        }

        let options = RequestOptions {
            headers,
            query: request.query.as_ref().map(query_pairs).unwrap_or_default(),
            body: request.payload,
            timeout: None,
        };

        tracing::debug!(service = %service, method = %method, target = %target, "Proxying request");

        let response = self.client.request(method, &target, options).await?;
        Ok(normalize_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::{OutboundRequest, Transport, TransportError};
    use crate::registry::ServiceEntry;
    use crate::resilience::RetryPolicy;
    use crate::security::rate_limit::AdmissionGate;
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_join_url_slash_handling() {
        assert_eq!(join_url("http://svc", "/a/b"), "http://svc/a/b");
        assert_eq!(join_url("http://svc", "a/b"), "http://svc/a/b");
        assert_eq!(join_url("http://svc/", "/a/b"), "http://svc/a/b");
        assert_eq!(join_url("http://svc/api/", "a"), "http://svc/api/a");
        assert_eq!(join_url("http://svc", ""), "http://svc/");
    }

    #[test]
    fn test_header_names_differing_in_case_are_rejected() {
        let headers = HashMap::from([
            ("X-Trace".to_string(), "a".to_string()),
            ("x-trace".to_string(), "b".to_string()),
        ]);
        let err = header_map(&headers).unwrap_err();
        assert!(matches!(&err, ProxyError::InvalidRequest(m) if m == "duplicate header 'x-trace'"));

        let headers = HashMap::from([("X-Trace".to_string(), "a".to_string())]);
        assert_eq!(header_map(&headers).unwrap()["x-trace"], "a");
    }

    #[test]
    fn test_method_normalization() {
        assert_eq!(normalize_method("get").unwrap(), Method::GET);
        assert_eq!(normalize_method("Post").unwrap(), Method::POST);
        assert!(normalize_method("").is_err());
        assert!(normalize_method("GE T").is_err());
    }

    #[test]
    fn test_query_flattening() {
        let query: serde_json::Map<String, Value> = serde_json::from_str(
            r#"{"q": "x", "n": 3, "flag": true, "tags": ["a", "b"], "empty": null}"#,
        )
        .unwrap();
        let mut pairs = query_pairs(&query);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("empty".to_string(), "".to_string()),
                ("flag".to_string(), "true".to_string()),
                ("n".to_string(), "3".to_string()),
                ("q".to_string(), "x".to_string()),
                ("tags".to_string(), "a".to_string()),
                ("tags".to_string(), "b".to_string()),
            ]
        );
    }

    fn response(content_type: Option<&str>, body: &str) -> OutboundResponse {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(reqwest::header::CONTENT_TYPE, ct.parse().unwrap());
        }
        OutboundResponse {
            status: StatusCode::OK,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_normalize_json_and_text() {
        let json = normalize_response(&response(Some("application/json; charset=utf-8"), r#"{"ok":true}"#));
        assert_eq!(json.data, ProxyData::Json(serde_json::json!({"ok": true})));

        let problem = normalize_response(&response(Some("application/problem+json"), r#"[1,2]"#));
        assert_eq!(problem.data, ProxyData::Json(serde_json::json!([1, 2])));

        let text = normalize_response(&response(Some("text/plain"), r#"{"ok":true}"#));
        assert_eq!(text.data, ProxyData::Text(r#"{"ok":true}"#.to_string()));

        let empty = normalize_response(&response(Some("application/json"), ""));
        assert_eq!(empty.data, ProxyData::Text(String::new()));

        let broken = normalize_response(&response(Some("application/json"), "{not json"));
        assert_eq!(broken.data, ProxyData::Text("{not json".to_string()));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ProxyError::ServiceNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProxyError::Upstream { status: StatusCode::IM_A_TEAPOT, body: String::new() }.status(),
            StatusCode::IM_A_TEAPOT
        );
        let exhausted = ProxyError::from(ClientError::TransportExhausted {
            attempts: 3,
            source: TransportError::Connect("refused".into()),
        });
        assert_eq!(exhausted.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ProxyError::from(ClientError::Closed).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[derive(Debug, Default)]
    struct RecordingTransport {
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<OutboundResponse, TransportError>> {
            self.seen.lock().unwrap().push(request);
            Box::pin(async {
                let mut headers = HeaderMap::new();
                headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());
                Ok(OutboundResponse {
                    status: StatusCode::CREATED,
                    headers,
                    body: br#"{"id":7}"#.to_vec(),
                })
            })
        }
    }

    fn proxy_with(transport: Arc<RecordingTransport>) -> ServiceProxy {
        let registry = Arc::new(ServiceRegistry::with_entries([
            ServiceEntry::new("svc-a", "http://svc-a.local/base/").unwrap(),
        ]));
        let client = Arc::new(HttpClient::new(
            transport,
            AdmissionGate::new(10, Duration::from_millis(10)),
            RetryPolicy::single_attempt(),
            Duration::from_secs(1),
        ));
        ServiceProxy::new(registry, client)
    }

    #[tokio::test]
    async fn test_forward_builds_target_request() {
        let transport = Arc::new(RecordingTransport::default());
        let proxy = proxy_with(transport.clone());

        let request = ProxyRequest {
            method: "post".into(),
            path: "/items".into(),
            payload: Some(serde_json::json!({"name": "widget"})),
            headers: Some([("X-Trace".to_string(), "abc".to_string())].into_iter().collect()),
            query: Some(serde_json::from_str(r#"{"dry_run": false}"#).unwrap()),
        };
        let result = proxy.forward("svc-a", request, Some("req-1")).await.unwrap();

        assert_eq!(result.status_code, 201);
        assert_eq!(result.data, ProxyData::Json(serde_json::json!({"id": 7})));

        let seen = transport.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url.as_str(), "http://svc-a.local/base/items?dry_run=false");
        assert_eq!(sent.headers.get("x-trace").unwrap(), "abc");
        assert_eq!(sent.headers.get(X_REQUEST_ID).unwrap(), "req-1");
        assert_eq!(sent.body, Some(serde_json::json!({"name": "widget"})));
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let proxy = proxy_with(Arc::new(RecordingTransport::default()));
        let err = proxy
            .forward("missing", ProxyRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::ServiceNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_proxy_request_defaults() {
        let request: ProxyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/");
        assert!(request.payload.is_none());
    }
}
