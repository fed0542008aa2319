//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every shared component from a validated [`MeshConfig`]
//! - Seed the registry from configured endpoints
//! - Apply hot-reloaded configuration
//! - Close components on shutdown
//!
//! # Design Decisions
//! - One explicit context handle instead of process-wide singletons
//! - Subsystems initialize in order, not concurrently
//! - A store that cannot be reached degrades; it never fails startup

use std::sync::Arc;

use serde_json::json;

use crate::config::MeshConfig;
use crate::http::client::HttpClient;
use crate::http::proxy::ServiceProxy;
use crate::registry::{ServiceEntry, ServiceRegistry};
use crate::security::ApiKeys;
use crate::store::{Broker, Cache};

/// Shared components, constructed once and threaded through the HTTP state.
#[derive(Debug)]
pub struct MeshContext {
    pub config: MeshConfig,
    pub registry: Arc<ServiceRegistry>,
    pub client: Arc<HttpClient>,
    pub proxy: ServiceProxy,
    pub cache: Cache,
    pub broker: Option<Arc<Broker>>,
    pub api_keys: Arc<ApiKeys>,
}

impl MeshContext {
    /// Build the context over the reqwest transport.
    pub async fn bootstrap(config: MeshConfig) -> Self {
        let client = HttpClient::from_config(&config.http_client, &config.retries);
        Self::bootstrap_with_client(config, client).await
    }

    /// Build the context around an already constructed client.
    pub async fn bootstrap_with_client(config: MeshConfig, client: HttpClient) -> Self {
        let cache = Cache::connect(&config.cache).await;

        let client = Arc::new(client);

        let registry = Arc::new(ServiceRegistry::with_entries(seed_entries(&config)));

        let broker = if config.broker.enabled {
            Some(Arc::new(Broker::connect(&config.broker, &config.cache).await))
        } else {
            None
        };

        let proxy = ServiceProxy::new(registry.clone(), client.clone());
        let api_keys = Arc::new(ApiKeys::new(config.services.api_keys.clone()));

        tracing::info!(
            cache_available = cache.is_available(),
            broker_available = broker.as_ref().map(|b| b.is_available()),
            services = registry.len(),
            "application.startup.completed"
        );

        Self {
            config,
            registry,
            client,
            proxy,
            cache,
            broker,
            api_keys,
        }
    }

    /// Apply a reloaded configuration: swap API keys and re-register seed
    /// endpoints. Other settings need a restart.
    pub fn apply_reload(&self, config: &MeshConfig) {
        self.api_keys.replace(config.services.api_keys.clone());
        let entries = seed_entries(config);
        let count = entries.len();
        for entry in entries {
            self.registry.register(entry);
        }
        tracing::info!(endpoints = count, "Configuration reload applied");
    }

    /// Publish a registry change on the broker without blocking the caller.
    pub fn announce(&self, event: &'static str, name: &str, url: Option<&str>) {
        let Some(broker) = self.broker.clone() else {
            return;
        };
        let message = json!({ "event": event, "name": name, "url": url }).to_string();
        tokio::spawn(async move {
            tracing::debug!(event, "Announcing registry change");
            broker.publish(&message).await;
        });
    }

    /// Stop outbound traffic and the broker. Pending permit timers are
    /// cancelled.
    pub fn close(&self) {
        self.client.close();
        if let Some(broker) = &self.broker {
            broker.close();
        }
        tracing::info!("application.shutdown.completed");
    }
}

fn seed_entries(config: &MeshConfig) -> Vec<ServiceEntry> {
    let mut names: Vec<_> = config.services.endpoints.keys().collect();
    names.sort();
    names
        .into_iter()
        .filter_map(|name| {
            let url = &config.services.endpoints[name];
            match ServiceEntry::new(name.clone(), url.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Skipping invalid seed endpoint");
                    None
                }
            }
        })
        .collect()
}
