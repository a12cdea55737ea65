//! Backend trait for the document store.
//!
//! Defines the interface that all document storage backends must implement,
//! enabling pluggable storage (filesystem, redis, memory).

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Result of an atomic reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key was free and now holds the new content.
    Stored,
    /// The key already holds a live document; nothing was written.
    Collision,
}

impl SetOutcome {
    pub fn is_stored(self) -> bool {
        self == Self::Stored
    }
}

/// Backend trait for document storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
/// Keys have been validated by [`DocumentStore`](super::DocumentStore)
/// before they reach a backend.
///
/// # Example
///
/// ```ignore
/// use haste::store::{DocumentBackend, MemoryStore, SetOutcome};
///
/// let backend = MemoryStore::new();
/// assert_eq!(backend.set("key", "value", None).await?, SetOutcome::Stored);
/// assert_eq!(backend.set("key", "other", None).await?, SetOutcome::Collision);
/// ```
#[async_trait]
pub trait DocumentBackend: Send + Sync + 'static {
    /// Backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Reserves `key` for `content` if no live document holds it.
    ///
    /// Must be atomic: of any number of concurrent calls for the same free
    /// key, exactly one returns [`SetOutcome::Stored`]. Never overwrites a
    /// live document. If `ttl` is `Some`, the document expires after it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`](crate::Error::StoreUnavailable)
    /// if the backend cannot complete the write.
    async fn set(&self, key: &str, content: &str, ttl: Option<Duration>) -> Result<SetOutcome>;

    /// Retrieves a document by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`](crate::Error::StoreUnavailable)
    /// if the backend cannot be read. Absence is never an error.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Deletes expired documents, returning how many were removed.
    ///
    /// Backends with native expiration keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be scanned.
    async fn sweep_expired(&self) -> Result<usize> {
        Ok(0)
    }
}
