//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rate limit >= 1, periods > 0)
//! - Inbound timeout must outlast a fully retried outbound call
//! - Check that seed endpoints are absolute http(s) URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MeshConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MeshConfig;
use crate::registry::ServiceEntry;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.api_prefix must start with '/' (got '{0}')")]
    ApiPrefix(String),

    #[error("http_client.rate_limit must be at least 1")]
    RateLimit,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("retries.max_attempts must be at least 1")]
    MaxAttempts,

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    DelayOrder { base: u64, max: u64 },

    #[error("services.endpoints.{name}: {reason}")]
    Endpoint { name: String, reason: String },

    #[error("timeouts.request_secs ({request_ms}ms) must exceed the outbound budget ({budget_ms}ms)")]
    RequestTimeoutBudget { request_ms: u64, budget_ms: u64 },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if !config.listener.api_prefix.starts_with('/') {
        errors.push(ValidationError::ApiPrefix(config.listener.api_prefix.clone()));
    }

    if config.http_client.rate_limit == 0 {
        errors.push(ValidationError::RateLimit);
    }
    if config.http_client.rate_period_ms == 0 {
        errors.push(ValidationError::ZeroDuration { field: "http_client.rate_period_ms" });
    }
    if config.http_client.timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration { field: "http_client.timeout_ms" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration { field: "timeouts.request_secs" });
    }

    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    let budget_ms = u64::try_from(config.outbound_budget().as_millis()).unwrap_or(u64::MAX);
    if config.timeouts.request_secs > 0 && request_ms <= budget_ms {
        errors.push(ValidationError::RequestTimeoutBudget { request_ms, budget_ms });
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::MaxAttempts);
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    // Sorted so the error list is stable across runs.
    let mut names: Vec<_> = config.services.endpoints.keys().collect();
    names.sort();
    for name in names {
        let url = &config.services.endpoints[name];
        if let Err(e) = ServiceEntry::new(name.clone(), url.clone()) {
            errors.push(ValidationError::Endpoint {
                name: name.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
