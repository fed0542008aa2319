//! HTTP subsystem: inbound routes and the outbound client.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     server.rs (Axum router, request ID, timeout, body limit)
//!     → security::api_key (registry writes only)
//!     → handlers.rs
//!     → proxy.rs (resolve service, build target URL)
//!
//! Outbound:
//!     proxy.rs → client.rs (admission gate, retry, deadline)
//!     → transport.rs (reqwest) → downstream service
//! ```

pub mod client;
pub mod handlers;
pub mod proxy;
pub mod request;
pub mod server;
pub mod transport;

pub use client::{ClientError, HttpClient, RequestOptions};
pub use proxy::{ProxyError, ProxyRequest, ProxyResponse, ServiceProxy};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
