//! Publish/subscribe over a single Redis channel.
//!
//! When Redis is unreachable at startup the broker degrades to a no-op:
//! publishes are logged and dropped, subscriptions are refused. Publish
//! failures never reach the caller.
//!
//! # Subscriptions
//! ```text
//! Redis pub/sub connection ─→ relay task ─→ mpsc ─→ caller's stream
//!                                 ▲
//!                  close() ───────┘ (task exits, connection dropped)
//! ```

use std::sync::{Mutex, PoisonError};

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::config::{BrokerConfig, CacheConfig};
use crate::observability::metrics;
use crate::store::cache::open_redis;
use crate::store::degradable::{BackendMode, Degradable};

const STORE: &str = "broker";

/// Messages buffered per subscriber before the relay waits on the reader.
const RELAY_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("message broker is unavailable")]
    Unavailable,

    #[error("message broker is closed")]
    Closed,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Networked side: a client for opening subscriber connections plus a
/// shared publisher connection, released on close.
pub struct RedisBroker {
    client: redis::Client,
    publisher: Mutex<Option<ConnectionManager>>,
}

impl RedisBroker {
    fn publisher(&self) -> Option<ConnectionManager> {
        self.publisher.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn release(&self) {
        self.publisher.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Degraded side. Holds nothing.
#[derive(Debug, Default)]
pub struct NoopBroker;

#[derive(Debug)]
pub struct Broker {
    channel: String,
    backend: Degradable<RedisBroker, NoopBroker>,
    closed: watch::Sender<bool>,
}

impl Broker {
    /// Connect to the broker URL, falling back to the cache URL when unset.
    pub async fn connect(config: &BrokerConfig, cache: &CacheConfig) -> Self {
        let url = config.url.as_deref().unwrap_or(&cache.url);
        let backend = Degradable::connect(
            STORE,
            cache.connect_timeout(),
            async {
                open_redis(url).await.map(|(client, publisher)| RedisBroker {
                    client,
                    publisher: Mutex::new(Some(publisher)),
                })
            },
            NoopBroker::default,
        )
        .await;

        Self::with_backend(config.channel.clone(), backend)
    }

    /// A broker that drops every message.
    pub fn noop(channel: impl Into<String>) -> Self {
        Self::with_backend(channel.into(), Degradable::Degraded(NoopBroker))
    }

    fn with_backend(channel: String, backend: Degradable<RedisBroker, NoopBroker>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            channel,
            backend,
            closed,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available() && !self.is_closed()
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    /// Publish one message to the configured channel.
    ///
    /// Best effort: a degraded or closed broker drops the message, and a
    /// Redis error is logged and counted.
    pub async fn publish(&self, message: &str) {
        if self.is_closed() {
            tracing::debug!(channel = %self.channel, "broker.closed, message dropped");
            metrics::record_broker_publish("dropped");
            return;
        }

        let publisher = match &self.backend {
            Degradable::Connected(redis) => redis.publisher(),
            Degradable::Degraded(_) => None,
        };
        let Some(mut conn) = publisher else {
            tracing::debug!(channel = %self.channel, "broker.unavailable, message dropped");
            metrics::record_broker_publish("dropped");
            return;
        };

        let result: redis::RedisResult<i64> = conn.publish(&self.channel, message).await;
        settle_publish(&self.channel, result);
    }

    /// Subscribe to the configured channel. Yields message payloads as
    /// strings; payloads that are not valid UTF-8 are skipped. The stream
    /// ends when the broker is closed.
    pub async fn subscribe(&self) -> Result<BoxStream<'static, String>, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let redis = match &self.backend {
            Degradable::Connected(redis) => redis,
            Degradable::Degraded(_) => return Err(BrokerError::Unavailable),
        };

        let mut pubsub = redis.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        tracing::info!(channel = %self.channel, "broker.subscribed");

        let messages = pubsub
            .into_on_message()
            .filter_map(|msg| futures_util::future::ready(msg.get_payload::<String>().ok()));
        Ok(relay(messages, self.closed.subscribe()))
    }

    /// Refuse further publishes and subscriptions, end every subscriber
    /// stream and drop the Redis connections.
    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        if let Degradable::Connected(redis) = &self.backend {
            redis.release();
        }
        tracing::info!(channel = %self.channel, "broker.closed");
    }
}

/// Log and count a publish outcome. Errors stop here.
fn settle_publish(channel: &str, result: redis::RedisResult<i64>) -> Option<i64> {
    match result {
        Ok(receivers) => {
            tracing::debug!(channel, receivers, "broker.published");
            metrics::record_broker_publish("ok");
            Some(receivers)
        }
        Err(e) => {
            tracing::warn!(channel, error = %e, "broker.publish_failed");
            metrics::record_broker_publish("error");
            None
        }
    }
}

/// Forward `messages` to a fresh stream until the source ends, the reader
/// goes away or `closed` flips. The source (and its connection) is dropped
/// when the relay stops.
fn relay<S>(messages: S, mut closed: watch::Receiver<bool>) -> BoxStream<'static, String>
where
    S: Stream<Item = String> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);

    tokio::spawn(async move {
        tokio::pin!(messages);
        loop {
            tokio::select! {
                // Also fires when the broker itself is dropped.
                _ = async { let _ = closed.wait_for(|closed| *closed).await; } => break,
                _ = tx.closed() => break,
                next = messages.next() => match next {
                    Some(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("broker.subscription_ended");
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|message| (message, rx)) }).boxed()
}
