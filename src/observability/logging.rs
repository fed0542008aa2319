//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Build the filter: `RUST_LOG` if set, else the configured level for this
/// crate and tower_http.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("service_mesh={level},tower_http={level}").into())
}

/// Install the global subscriber. Calling it twice is harmless; the second
/// call is ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = build_filter(&config.log_level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}
