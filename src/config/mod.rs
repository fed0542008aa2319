//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MeshConfig (validated, immutable)
//!     → read once by lifecycle::startup to build the MeshContext
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → MeshContext swaps API keys and re-seeds endpoints
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only keys and seed endpoints are hot-reloadable; the rest needs a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BrokerConfig, CacheConfig, HttpClientConfig, ListenerConfig, LogFormat, MeshConfig,
    ObservabilityConfig, RetryConfig, SecurityConfig, ServicesConfig, TimeoutConfig,
};
