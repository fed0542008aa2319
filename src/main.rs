//! Service mesh substrate.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                  SERVICE MESH                     │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ─────────────────┼─▶│  http   │──▶│ api_key  │──▶│   registry   │   │
//!                    │  │ server  │   │  gate    │   │  name → URL  │   │
//!                    │  └────┬────┘   └──────────┘   └──────┬───────┘   │
//!                    │       │ proxy                        │ resolve   │
//!                    │       ▼                              ▼           │
//!   Client Response  │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ◀────────────────┼──│  proxy  │◀──│  client  │◀──│  admission   │◀──┼── Service
//!                    │  │normalize│   │ retries  │   │    gate      │   │
//!                    │  └─────────┘   └──────────┘   └──────────────┘   │
//!                    │                                                  │
//!                    │  ┌────────────────────────────────────────────┐  │
//!                    │  │ store: cache (Redis | memory)              │  │
//!                    │  │        broker (Redis pub/sub | no-op)      │  │
//!                    │  └────────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use service_mesh::config::watcher::ConfigWatcher;
use service_mesh::config::{load_config, MeshConfig};
use service_mesh::lifecycle::{wait_for_signal, MeshContext, Shutdown};
use service_mesh::observability::{logging, metrics};
use service_mesh::HttpServer;

#[derive(Parser)]
#[command(name = "service-mesh", version, about = "Service registry and resilient proxy")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MeshConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-mesh starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        api_prefix = %config.listener.api_prefix,
        rate_limit = config.http_client.rate_limit,
        rate_period_ms = config.http_client.rate_period_ms,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let ctx = Arc::new(MeshContext::bootstrap(config).await);
    let shutdown = Arc::new(Shutdown::new());

    // Hot reload of API keys and seed endpoints.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            };
            let ctx = ctx.clone();
            let stop = shutdown.signalled();
            tokio::spawn(async move {
                tokio::pin!(stop);
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(next) => ctx.apply_reload(&next),
                            None => break,
                        },
                        _ = &mut stop => break,
                    }
                }
            });
            handle
        }
        None => None,
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        });
    }

    let server = HttpServer::new(ctx.clone());
    server.run(listener, shutdown.signalled()).await?;

    ctx.close();
    tracing::info!("Shutdown complete");
    Ok(())
}
