//! Connect-or-degrade wrapper shared by the cache and the broker.
//!
//! # States
//! ```text
//! Disconnected ──probe ok──→ Connected (networked backend)
//!      │
//!      └──probe failed / timed out──→ Degraded (local stand-in)
//! ```
//! The decision is made once, at startup. A degraded store never tries to
//! reconnect during the process lifetime.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Which side of the wrapper is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    Networked,
    InMemory,
}

/// Either the networked backend `N` or the local fallback `L`.
pub enum Degradable<N, L> {
    Connected(N),
    Degraded(L),
}

impl<N, L> Degradable<N, L> {
    /// Run `probe` under `timeout`. Success keeps the networked backend; any
    /// error or an elapsed deadline engages `fallback`.
    pub async fn connect<E, Fut>(
        store: &'static str,
        timeout: Duration,
        probe: Fut,
        fallback: impl FnOnce() -> L,
    ) -> Self
    where
        E: fmt::Display,
        Fut: Future<Output = Result<N, E>>,
    {
        let probe = async move { probe.await.map_err(|e| e.to_string()) };
        match with_deadline(timeout, probe, |d| format!("probe timed out after {:?}", d)).await {
            Ok(backend) => {
                tracing::info!(store, "store.connected");
                metrics::record_store_available(store, true);
                Degradable::Connected(backend)
            }
            Err(error) => {
                tracing::warn!(store, error = %error, "store.unavailable, degrading to local mode");
                metrics::record_store_available(store, false);
                Degradable::Degraded(fallback())
            }
        }
    }

    pub fn mode(&self) -> BackendMode {
        match self {
            Degradable::Connected(_) => BackendMode::Networked,
            Degradable::Degraded(_) => BackendMode::InMemory,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Degradable::Connected(_))
    }
}

impl<N, L> fmt::Debug for Degradable<N, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Degradable").field("mode", &self.mode()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_probe_connects() {
        let store: Degradable<u8, ()> =
            Degradable::connect("test", Duration::from_secs(1), async { Ok::<_, String>(1) }, || ()).await;
        assert!(store.is_available());
        assert_eq!(store.mode(), BackendMode::Networked);
    }

    #[tokio::test]
    async fn test_failed_probe_degrades() {
        let store: Degradable<u8, &str> = Degradable::connect(
            "test",
            Duration::from_secs(1),
            async { Err::<u8, _>("connection refused") },
            || "local",
        )
        .await;
        assert!(!store.is_available());
        assert!(matches!(store, Degradable::Degraded("local")));
    }

    #[tokio::test]
    async fn test_slow_probe_degrades() {
        let store: Degradable<u8, ()> = Degradable::connect(
            "test",
            Duration::from_millis(20),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(1)
            },
            || (),
        )
        .await;
        assert_eq!(store.mode(), BackendMode::InMemory);
    }
}
