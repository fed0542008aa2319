//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Admin route / config seed
//!     → entry.rs (validate name + absolute URL)
//!     → store.rs (register / deregister under one lock)
//!
//! Proxy request
//!     → store.rs get(name) → base URL (resolve-then-use, not transactional)
//! ```
//!
//! # Design Decisions
//! - State lives only in memory and is lost on restart
//! - Validation happens before an entry reaches the table, so the table
//!   itself never fails

pub mod entry;
pub mod store;

pub use entry::{RegistryError, ServiceEntry};
pub use store::ServiceRegistry;
