//! In-memory document backend.
//!
//! Provides a fast, non-persistent document store using DashMap for
//! concurrent access. Ideal for testing, development, and single-process
//! deployments where losing documents on restart is acceptable.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

use super::backend::{DocumentBackend, SetOutcome};
use crate::error::Result;

/// Entry stored in the memory backend with optional expiration.
#[derive(Clone)]
struct MemoryEntry {
    content: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(content: String, ttl: Option<Duration>) -> Self {
        Self {
            content,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// In-memory document backend using DashMap.
///
/// # Thread Safety
///
/// Reservation goes through DashMap's entry API, which holds the shard lock
/// for the key while it decides between [`SetOutcome::Stored`] and
/// [`SetOutcome::Collision`].
#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in the store (including expired).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.data.len())
    }
}

#[async_trait]
impl DocumentBackend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn set(&self, key: &str, content: &str, ttl: Option<Duration>) -> Result<SetOutcome> {
        let entry = MemoryEntry::new(content.to_string(), ttl);
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_expired() {
                    existing.insert(entry);
                    Ok(SetOutcome::Stored)
                } else {
                    Ok(SetOutcome::Collision)
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(SetOutcome::Stored)
            },
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.data.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.content.clone()));
            }
        } else {
            return Ok(None);
        }

        // Expired: drop it unless a writer replaced it in the meantime
        self.data.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn sweep_expired(&self) -> Result<usize> {
        Ok(self.cleanup_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let backend = MemoryStore::new();

        let outcome = backend.set("key1", "value1", None).await.unwrap();
        assert_eq!(outcome, SetOutcome::Stored);
        assert_eq!(backend.get("key1").await.unwrap().as_deref(), Some("value1"));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let backend = MemoryStore::new();
        assert_eq!(backend.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_never_overwrites() {
        let backend = MemoryStore::new();

        backend.set("key", "first", None).await.unwrap();
        let outcome = backend.set("key", "second", None).await.unwrap();
        assert_eq!(outcome, SetOutcome::Collision);

        assert_eq!(backend.get("key").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let backend = MemoryStore::new();

        backend
            .set("expiring", "value", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(backend.get("expiring").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(backend.get("expiring").await.unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_expired_key_can_be_reserved_again() {
        let backend = MemoryStore::new();

        backend
            .set("key", "old", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        let outcome = backend.set("key", "new", None).await.unwrap();
        assert_eq!(outcome, SetOutcome::Stored);
        assert_eq!(backend.get("key").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let backend = MemoryStore::new();

        backend
            .set("short", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        backend.set("forever", "v", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        assert_eq!(backend.sweep_expired().await.unwrap(), 1);
        assert_eq!(backend.len(), 1);
    }
}
