//! High-level `DocumentStore` wrapper over backend implementations.
//!
//! Applies the parts of the contract that are identical for every backend:
//! key validation and the default-expiration / permanent policy.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{DocumentBackend, SetOutcome};
use super::file::FileStore;
use super::memory::MemoryStore;
use super::redis::RedisStore;
use super::validation::validate_key;
use crate::config::StorageConfig;
use crate::error::Result;

/// Document store shared by all request handlers.
///
/// # Thread Safety
///
/// `DocumentStore` is `Clone` and can be shared across threads. The
/// underlying backend handles concurrent access safely.
///
/// # Example
///
/// ```
/// # async fn example() -> haste::Result<()> {
/// use haste::store::{DocumentStore, SetOutcome};
///
/// let store = DocumentStore::memory();
/// assert_eq!(store.set("abc", "hello", false).await?, SetOutcome::Stored);
/// assert_eq!(store.get("abc").await?.as_deref(), Some("hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    expiration: Option<Duration>,
    sweep_interval: Option<Duration>,
}

impl DocumentStore {
    /// Builds the backend selected by configuration.
    ///
    /// Nothing here touches the network; a redis store connects on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the file store directory cannot be created or the
    /// redis URL is invalid.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let expiration = config.expire_secs().map(Duration::from_secs);

        let store = match config {
            StorageConfig::File(file) => {
                let mut store = Self::custom(FileStore::open(&file.path)?);
                store.sweep_interval = file.sweep_interval_secs.map(Duration::from_secs);
                store
            },
            StorageConfig::Redis(redis) => Self::custom(RedisStore::new(redis)?),
            StorageConfig::Memory(_) => Self::memory(),
        };

        info!(
            backend = store.backend_name(),
            expire_secs = config.expire_secs(),
            "Document store ready"
        );

        Ok(store.with_expiration(expiration))
    }

    /// Creates a store backed by process memory with no expiration.
    pub fn memory() -> Self {
        Self::custom(MemoryStore::new())
    }

    /// Creates a store with a custom backend and no expiration.
    pub fn custom<B: DocumentBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            expiration: None,
            sweep_interval: None,
        }
    }

    /// Sets the expiration applied to non-permanent documents.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Option<Duration>) -> Self {
        self.expiration = expiration;
        self
    }

    /// Enables a periodic sweep of expired documents.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    /// Atomically reserves `key` for `content`.
    ///
    /// Non-permanent documents get the store's default expiration; permanent
    /// ones never expire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`](crate::Error::InvalidKey) before touching
    /// the backend, or the backend's own error.
    pub async fn set(&self, key: &str, content: &str, permanent: bool) -> Result<SetOutcome> {
        validate_key(key)?;
        let ttl = if permanent { None } else { self.expiration };
        self.backend.set(key, content, ttl).await
    }

    /// Retrieves a live document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`](crate::Error::InvalidKey) or the
    /// backend's own error. A missing or expired key is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        self.backend.get(key).await
    }

    /// Runs one expiration sweep on the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it cannot be scanned.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.backend.sweep_expired().await
    }

    /// Spawns the periodic sweep task, if a sweep interval is configured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let interval = self.sweep_interval?;
        let store = self.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.sweep_expired().await {
                    Ok(0) => {},
                    Ok(removed) => debug!(removed, "Swept expired documents"),
                    Err(e) => warn!(error = %e, "Expiration sweep failed"),
                }
            }
        }))
    }
}
