//! Networked stores with local fallbacks.
//!
//! # Data Flow
//! ```text
//! startup → Degradable::connect(probe, timeout)
//!     ├─ ok      → Redis-backed Cache / Broker
//!     └─ failure → in-memory Cache / no-op Broker (logged, never fatal)
//! ```
//!
//! # Design Decisions
//! - A store is probed once; mode is fixed for the process lifetime
//! - Cache errors never propagate to callers
//! - Broker publish in degraded mode is a successful no-op

pub mod broker;
pub mod cache;
pub mod degradable;

pub use broker::{Broker, BrokerError};
pub use cache::Cache;
pub use degradable::{BackendMode, Degradable};
