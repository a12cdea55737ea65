//! Redis-backed document backend.
//!
//! Uses `SET key value NX PX ttl` for atomic reservation with native
//! expiration and a plain `GET` for reads. Every round trip (connecting
//! included) is bounded by the configured timeout; timeouts and connection
//! failures surface as [`Error::StoreUnavailable`], never as a missing key.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::backend::{DocumentBackend, SetOutcome};
use crate::config::RedisStoreConfig;
use crate::error::{Error, Result};

const NAME: &str = "redis";

/// Redis document backend.
///
/// The connection is opened on first use and shared by all requests through
/// a multiplexed [`ConnectionManager`], which reconnects on its own after
/// the server drops. A failed first connection is retried on the next call.
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
    /// TTL re-applied on reads when sliding expiration is on.
    sliding_ttl: Option<Duration>,
}

impl RedisStore {
    /// Creates a backend for the configured server without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL cannot be parsed.
    pub fn new(config: &RedisStoreConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| Error::Config(format!("invalid redis url '{}': {e}", config.url)))?;

        let sliding_ttl = config
            .sliding_expiration
            .then_some(config.expire_secs)
            .flatten()
            .map(Duration::from_secs);

        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout: Duration::from_millis(config.timeout_ms),
            sliding_ttl,
        })
    }

    /// Awaits a redis future under the configured timeout.
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::unavailable(NAME, format!("{op}: {e}"))),
            Err(_) => Err(Error::unavailable(
                NAME,
                format!("{op}: timed out after {}ms", self.timeout.as_millis()),
            )),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let connection = self
            .bounded(
                "connect",
                self.connection
                    .get_or_try_init(|| ConnectionManager::new(self.client.clone())),
            )
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl DocumentBackend for RedisStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, content: &str, ttl: Option<Duration>) -> Result<SetOutcome> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(content).arg("NX");
        if let Some(ttl) = ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }

        // "OK" when written, nil when NX found an existing key
        let reply: Option<String> = self.bounded("SET", cmd.query_async(&mut conn)).await?;
        Ok(if reply.is_some() {
            SetOutcome::Stored
        } else {
            SetOutcome::Collision
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;

        let content: Option<String> = self
            .bounded("GET", redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;

        if content.is_some()
            && let Some(ttl) = self.sliding_ttl
        {
            // XX only touches keys that already expire, so permanent documents stay permanent
            let mut cmd = redis::cmd("EXPIRE");
            cmd.arg(key).arg(ttl.as_secs().max(1)).arg("XX");
            match self
                .bounded::<i64, _>("EXPIRE", cmd.query_async(&mut conn))
                .await
            {
                Ok(refreshed) => debug!(key, refreshed, "Refreshed document expiration"),
                Err(e) => warn!(key, error = %e, "Failed to refresh document expiration"),
            }
        }

        Ok(content)
    }
}
