//! Service mesh substrate library.
//!
//! A registry of logical service names, a rate-limited retrying HTTP
//! client, a proxy operation joining the two, and a Redis-backed cache and
//! broker that degrade to local stand-ins when Redis is unreachable.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::schema::MeshConfig;
pub use http::HttpServer;
pub use lifecycle::{MeshContext, Shutdown};
