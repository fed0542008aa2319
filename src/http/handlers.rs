//! Route handlers for the health check and the service routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::http::proxy::{ProxyError, ProxyRequest, ProxyResponse};
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::registry::{RegistryError, ServiceEntry};

/// Errors returned by the service routes, rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Service not registered")]
    NotFound,

    #[error("{0}")]
    InvalidEntry(#[from] RegistryError),

    #[error("{message}")]
    Body { status: StatusCode, message: String },

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Proxy(e) => return e.into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidEntry(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Body { status, .. } => status,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub cache: &'static str,
    pub broker: &'static str,
    pub services: HashMap<String, String>,
}

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub url: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let ctx = &state.ctx;
    let cache = if ctx.cache.ping().await { "ok" } else { "degraded" };
    let broker = match &ctx.broker {
        None => "disabled",
        Some(b) if b.is_available() => "ok",
        Some(_) => "degraded",
    };
    Json(HealthReport {
        status: "ok",
        cache,
        broker,
        services: ctx.registry.list(),
    })
}

pub async fn list_services(State(state): State<AppState>) -> Json<HashMap<String, String>> {
    Json(state.ctx.registry.list())
}

pub async fn register_service(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceEntry>), ApiError> {
    let Json(body) = body?;
    let entry = ServiceEntry::new(body.name, body.url)?;

    state.ctx.registry.register(entry.clone());
    state
        .ctx
        .announce("service.registered", &entry.name, Some(&entry.url));

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceEntry>, ApiError> {
    let url = state.ctx.registry.get(&name).ok_or(ApiError::NotFound)?;
    Ok(Json(ServiceEntry { name, url }))
}

pub async fn deregister_service(State(state): State<AppState>, Path(name): Path<String>) -> StatusCode {
    state.ctx.registry.deregister(&name);
    state.ctx.announce("service.deregistered", &name, None);
    StatusCode::NO_CONTENT
}

pub async fn proxy_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Json<ProxyResponse>, ApiError> {
    let Json(request) = body?;
    let response = state
        .ctx
        .proxy
        .forward(&name, request, request_id(&headers))
        .await?;
    Ok(Json(response))
}
