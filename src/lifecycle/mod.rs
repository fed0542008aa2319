//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → cache probe → HTTP client → registry (seeded)
//!     → broker (if enabled) → MeshContext
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain in-flight → MeshContext::close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then stores, then listeners
//! - Ordered shutdown: stop accept, drain, close the client gate and broker

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::MeshContext;
