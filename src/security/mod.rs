//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound mutating request:
//!     → api_key.rs (X-API-Key header or api_key query, 401/403)
//!     → handler
//!
//! Outbound request:
//!     → rate_limit.rs (admission gate, N per rolling period)
//!     → transport
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing key is always rejected
//! - Key list is swapped atomically, never locked on the request path

pub mod api_key;
pub mod rate_limit;

pub use api_key::{require_service_key, ApiKeys};
pub use rate_limit::{AdmissionGate, GateClosed};
