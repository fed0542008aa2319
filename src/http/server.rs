//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the health and service routes
//! - Guard registry writes with the API-key middleware
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::MeshContext;
use crate::security::require_service_key;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<MeshContext>,
}

/// HTTP server exposing the mesh.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(ctx: Arc<MeshContext>) -> Self {
        let router = Self::build_router(ctx);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(ctx: Arc<MeshContext>) -> Router {
        let prefix = format!("{}/services", ctx.config.listener.api_prefix.trim_end_matches('/'));
        let request_timeout = ctx.config.inbound_timeout();
        if request_timeout > Duration::from_secs(ctx.config.timeouts.request_secs) {
            tracing::warn!(
                configured_secs = ctx.config.timeouts.request_secs,
                effective = ?request_timeout,
                "Request timeout raised to outlast outbound retries"
            );
        }
        let max_body_size = ctx.config.security.max_body_size;
        let key_guard = middleware::from_fn_with_state(ctx.api_keys.clone(), require_service_key);

        Router::new()
            .route("/health", get(handlers::health))
            .route(&prefix, get(handlers::list_services))
            .route(
                &format!("{prefix}/register"),
                post(handlers::register_service).route_layer(key_guard.clone()),
            )
            .route(
                &format!("{prefix}/{{name}}"),
                get(handlers::get_service).merge(delete(handlers::deregister_service).route_layer(key_guard)),
            )
            .route(&format!("{prefix}/{{name}}/proxy"), post(handlers::proxy_service))
            .with_state(AppState { ctx })
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the server in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
