//! API-key gate for mutating service routes.
//!
//! The key is read from the `X-API-Key` header, falling back to the
//! `api_key` query parameter. A missing key is rejected with 401. A key not
//! in the configured list is rejected with 403. An empty list accepts any
//! presented key.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY: &str = "api_key";

/// Accepted keys. Swapped atomically on config reload.
#[derive(Debug)]
pub struct ApiKeys {
    keys: ArcSwap<Vec<String>>,
}

impl ApiKeys {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: ArcSwap::from_pointee(keys),
        }
    }

    pub fn replace(&self, keys: Vec<String>) {
        tracing::info!(count = keys.len(), "API keys reloaded");
        self.keys.store(Arc::new(keys));
    }

    pub fn accepts(&self, presented: &str) -> bool {
        let keys = self.keys.load();
        keys.is_empty() || keys.iter().any(|k| k == presented)
    }

    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.load().is_empty()
    }
}

/// Pull the presented key out of a request, header first.
pub fn presented_key(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value.to_string());
    }

    request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == API_KEY_QUERY)
            .map(|(_, value)| value.into_owned())
    })
}

fn reject(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// Middleware guarding routes that mutate the registry.
pub async fn require_service_key(
    State(keys): State<Arc<ApiKeys>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(key) = presented_key(&request) else {
        tracing::warn!(path = %request.uri().path(), "Rejected request without API key");
        return reject(StatusCode::UNAUTHORIZED, "Missing API key");
    };

    if !keys.accepts(&key) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
        return reject(StatusCode::FORBIDDEN, "Invalid API key");
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::post, Router};
    use tower::ServiceExt;

    fn app(keys: Vec<String>) -> Router {
        let keys = Arc::new(ApiKeys::new(keys));
        Router::new()
            .route("/register", post(|| async { StatusCode::CREATED }))
            .layer(middleware::from_fn_with_state(keys, require_service_key))
    }

    fn request(uri: &str, header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(key) = header {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn detail(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["detail"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() {
        let response = app(vec!["secret".into()]).oneshot(request("/register", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(detail(response).await, "Missing API key");
    }

    #[tokio::test]
    async fn test_wrong_key_is_forbidden() {
        let response = app(vec!["secret".into()])
            .oneshot(request("/register", Some("guess")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(detail(response).await, "Invalid API key");
    }

    #[tokio::test]
    async fn test_header_and_query_keys_accepted() {
        let response = app(vec!["secret".into()])
            .oneshot(request("/register", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app(vec!["secret".into()])
            .oneshot(request("/register?api_key=secret", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_empty_list_accepts_any_presented_key() {
        let response = app(Vec::new()).oneshot(request("/register", Some("anything"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app(Vec::new()).oneshot(request("/register", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_replace_keys() {
        let keys = ApiKeys::new(vec!["old".into()]);
        assert!(keys.accepts("old"));
        keys.replace(vec!["new".into()]);
        assert!(!keys.accepts("old"));
        assert!(keys.accepts("new"));
        assert_eq!(keys.len(), 1);
    }
}
