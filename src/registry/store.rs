//! Name → base URL table.
//!
//! # Design Decisions
//! - One mutex for every operation; the workload is small and low-contention
//! - No I/O under the lock, so callers on hot request paths never wait on the network
//! - `list` hands out a copy, never a view

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::observability::metrics;
use crate::registry::entry::ServiceEntry;

/// Tracks service endpoints for intra-service communication.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: Mutex<HashMap<String, String>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with validated entries.
    pub fn with_entries(entries: impl IntoIterator<Item = ServiceEntry>) -> Self {
        let services: HashMap<_, _> = entries.into_iter().map(|e| (e.name, e.url)).collect();
        metrics::set_registry_size(services.len());
        Self {
            services: Mutex::new(services),
        }
    }

    // A panic while holding the guard cannot leave the map half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite an entry. Last write wins.
    pub fn register(&self, entry: ServiceEntry) {
        let mut services = self.lock();
        tracing::info!(name = %entry.name, url = %entry.url, "service_registry.registered");
        services.insert(entry.name, entry.url);
        metrics::set_registry_size(services.len());
    }

    /// Remove an entry. Absent names are ignored.
    pub fn deregister(&self, name: &str) {
        let mut services = self.lock();
        if services.remove(name).is_some() {
            tracing::info!(name = %name, "service_registry.deregistered");
            metrics::set_registry_size(services.len());
        }
    }

    /// Look up the base URL of a service.
    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// Snapshot of every registered service.
    pub fn list(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
