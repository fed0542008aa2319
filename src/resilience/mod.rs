//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound attempt:
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → On transport failure: retries.rs (retry with backoff.rs delays)
//!     → On error status or exhausted budget: typed error to the caller
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timeout is a transport failure and consumes one attempt
//! - Retries never follow a received HTTP error status

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry, RetryError, RetryPolicy, Retryable};
