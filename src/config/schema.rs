//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mesh.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::RetryPolicy;

/// Root configuration for the service mesh substrate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    /// Listener configuration (bind address, API prefix).
    pub listener: ListenerConfig,

    /// Inbound timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Outbound HTTP client settings (timeout, admission gate).
    pub http_client: HttpClientConfig,

    /// Retry configuration for outbound calls.
    pub retries: RetryConfig,

    /// Seed endpoints and service API keys.
    pub services: ServicesConfig,

    /// Networked cache backend.
    pub cache: CacheConfig,

    /// Pub/sub broker.
    pub broker: BrokerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

impl MeshConfig {
    /// Longest an outbound call can take before the client gives up: one
    /// admission wait, every attempt timing out and maximal backoff between.
    pub fn outbound_budget(&self) -> Duration {
        RetryPolicy::from(&self.retries)
            .worst_case(self.http_client.timeout())
            .saturating_add(self.http_client.rate_period())
    }

    /// Inbound request timeout, never shorter than the outbound budget plus
    /// one second, so a proxied call ends as a gateway failure rather than
    /// an inbound timeout.
    pub fn inbound_timeout(&self) -> Duration {
        let configured = Duration::from_secs(self.timeouts.request_secs);
        let floor = self.outbound_budget().saturating_add(Duration::from_secs(1));
        configured.max(floor)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Prefix under which the service routes are mounted.
    pub api_prefix: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            api_prefix: "/api/v1".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds. Must
    /// exceed the outbound budget of a proxied call.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Default per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Requests that may be initiated per rate period.
    pub rate_limit: u32,

    /// Length of the rate period in milliseconds.
    pub rate_period_ms: u64,
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_period(&self) -> Duration {
        Duration::from_millis(self.rate_period_ms)
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            rate_limit: 5,
            rate_period_ms: 1_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

/// Registry seeding and write authorization.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServicesConfig {
    /// Endpoints registered at startup (name -> absolute base URL).
    pub endpoints: HashMap<String, String>,

    /// Keys accepted for registry writes. Empty accepts any presented key.
    pub api_keys: Vec<String>,
}

/// Cache backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection URL.
    pub url: String,

    /// How long the startup probe may take before the cache degrades.
    pub connect_timeout_ms: u64,
}

impl CacheConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            connect_timeout_ms: 2_000,
        }
    }
}

/// Message broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Enable the broker.
    pub enabled: bool,

    /// Redis connection URL. Falls back to the cache URL when unset.
    pub url: Option<String>,

    /// Channel every message is published to.
    pub channel: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            channel: "hardware-events".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeshConfig::default();
        assert_eq!(config.http_client.rate_limit, 5);
        assert_eq!(config.http_client.rate_period(), Duration::from_secs(1));
        assert_eq!(config.retries.max_attempts, 3);
        assert!(!config.broker.enabled);
        assert_eq!(config.broker.channel, "hardware-events");
        assert_eq!(config.listener.api_prefix, "/api/v1");
    }

    #[test]
    fn test_partial_toml() {
        let config: MeshConfig = toml::from_str(
            r#"
            [http_client]
            rate_limit = 20

            [services.endpoints]
            analytics = "http://analytics.local"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.http_client.rate_limit, 20);
        assert_eq!(config.http_client.timeout_ms, 10_000);
        assert_eq!(
            config.services.endpoints.get("analytics").map(String::as_str),
            Some("http://analytics.local")
        );
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
