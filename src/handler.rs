//! Document handler: the write, read and preload paths.
//!
//! The handler owns no per-request state. Writes validate the body, draw
//! candidate keys from the [`KeyGenerator`] and let the [`DocumentStore`]
//! arbitrate uniqueness; a collision just means "draw again", up to a fixed
//! number of attempts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::keygen::KeyGenerator;
use crate::store::{DocumentStore, SetOutcome};

/// Content type of raw document responses.
pub const RAW_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Response to a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedDocument {
    pub key: String,
}

/// Document wrapped for the web UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrappedDocument {
    pub data: String,
    pub key: String,
}

/// Document returned verbatim for tooling and embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub key: String,
    pub content: String,
}

impl RawDocument {
    pub fn content_type(&self) -> &'static str {
        RAW_CONTENT_TYPE
    }
}

/// Outcome of loading the configured static documents.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PreloadReport {
    /// Documents written by this run.
    pub loaded: usize,
    /// Documents already present in the store from an earlier run.
    pub existing: usize,
    /// Names that could not be loaded.
    pub failed: Vec<String>,
}

/// Strips an extension hint (`abc.rs` -> `abc`) from a request id.
pub fn document_key(id: &str) -> &str {
    id.split_once('.').map_or(id, |(key, _)| key)
}

/// Orchestrates key generation, storage and retrieval.
pub struct DocumentHandler {
    store: DocumentStore,
    key_generator: KeyGenerator,
    max_length: usize,
    max_key_attempts: u32,
}

impl DocumentHandler {
    pub fn new(store: DocumentStore, key_generator: KeyGenerator, max_length: usize) -> Self {
        Self {
            store,
            key_generator,
            max_length,
            max_key_attempts: crate::constants::DEFAULT_MAX_KEY_ATTEMPTS,
        }
    }

    /// Builds the handler, key generator and store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key generator or the store cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key_generator = KeyGenerator::from_config(&config.key_generator, config.key_length)?;
        let store = DocumentStore::from_config(&config.storage)?;

        info!(
            generator = key_generator.kind(),
            key_length = config.key_length,
            max_length = config.max_length,
            "Document handler ready"
        );

        Ok(Self::new(store, key_generator, config.max_length)
            .with_max_key_attempts(config.max_key_attempts))
    }

    #[must_use]
    pub fn with_max_key_attempts(mut self, attempts: u32) -> Self {
        self.max_key_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Stores a new document under a freshly generated key.
    ///
    /// # Errors
    ///
    /// - [`Error::DocumentEmpty`], [`Error::DocumentTooLarge`] or
    ///   [`Error::DocumentNotText`] for a bad body
    /// - [`Error::KeyGenerationExhausted`] if every candidate collided
    /// - [`Error::StoreUnavailable`] straight from the store, without retry
    pub async fn handle_post(&self, body: &[u8]) -> Result<CreatedDocument> {
        if body.is_empty() {
            return Err(Error::DocumentEmpty);
        }

        if body.len() > self.max_length {
            return Err(Error::DocumentTooLarge {
                len: body.len(),
                max: self.max_length,
            });
        }

        let content = std::str::from_utf8(body).map_err(|_| Error::DocumentNotText)?;

        for attempt in 1..=self.max_key_attempts {
            let key = self.key_generator.generate();
            match self.store.set(&key, content, false).await? {
                SetOutcome::Stored => {
                    info!(key = %key, length = content.len(), "Added document");
                    return Ok(CreatedDocument { key });
                },
                SetOutcome::Collision => {
                    debug!(key = %key, attempt, "Key collision, drawing another");
                },
            }
        }

        error!(
            attempts = self.max_key_attempts,
            generator = self.key_generator.kind(),
            "No free key found"
        );
        Err(Error::KeyGenerationExhausted {
            attempts: self.max_key_attempts,
        })
    }

    /// Fetches a document wrapped as `{ data, key }`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentNotFound`] if absent or expired.
    pub async fn handle_get(&self, id: &str) -> Result<WrappedDocument> {
        let (key, content) = self.lookup(id).await?;
        Ok(WrappedDocument {
            data: content,
            key,
        })
    }

    /// Fetches a document for verbatim plain-text delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentNotFound`] if absent or expired.
    pub async fn handle_raw_get(&self, id: &str) -> Result<RawDocument> {
        let (key, content) = self.lookup(id).await?;
        Ok(RawDocument { key, content })
    }

    async fn lookup(&self, id: &str) -> Result<(String, String)> {
        let key = document_key(id);
        match self.store.get(key).await? {
            Some(content) => {
                debug!(key, "Retrieved document");
                Ok((key.to_string(), content))
            },
            None => {
                debug!(key, "Document not found");
                Err(Error::not_found(key))
            },
        }
    }

    /// Loads operator-provided static documents as permanent entries.
    ///
    /// Never fails: an unreadable file, an invalid name or a store error is
    /// logged as a warning and startup carries on without that document.
    pub async fn preload(&self, documents: &BTreeMap<String, PathBuf>) -> PreloadReport {
        let mut report = PreloadReport::default();

        for (name, path) in documents {
            info!(name = %name, path = %path.display(), "Loading static document");

            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) if !content.is_empty() => content,
                Ok(_) => {
                    warn!(name = %name, path = %path.display(), "Failed to load static document: file is empty");
                    report.failed.push(name.clone());
                    continue;
                },
                Err(e) => {
                    warn!(name = %name, path = %path.display(), error = %e, "Failed to load static document");
                    report.failed.push(name.clone());
                    continue;
                },
            };

            match self.store.set(name, &content, true).await {
                Ok(SetOutcome::Stored) => {
                    debug!(name = %name, success = true, "Loaded static document");
                    report.loaded += 1;
                },
                Ok(SetOutcome::Collision) => {
                    info!(name = %name, success = false, "Static document already stored, keeping existing copy");
                    report.existing += 1;
                },
                Err(e) => {
                    warn!(name = %name, path = %path.display(), success = false, error = %e, "Failed to load static document");
                    report.failed.push(name.clone());
                },
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyGeneratorConfig;
    use crate::keygen::RandomGenerator;
    use std::time::Duration;

    fn handler(max_length: usize) -> DocumentHandler {
        let generator =
            KeyGenerator::from_config(&KeyGeneratorConfig::Random { keyspace: None }, 5).unwrap();
        DocumentHandler::new(DocumentStore::memory(), generator, max_length)
    }

    #[test]
    fn test_document_key_strips_extension() {
        assert_eq!(document_key("abc"), "abc");
        assert_eq!(document_key("abc.rs"), "abc");
        assert_eq!(document_key("abc.tar.gz"), "abc");
        assert_eq!(document_key(".hidden"), "");
    }

    #[tokio::test]
    async fn test_post_then_get_round_trip() {
        let handler = handler(100);

        let created = handler.handle_post(b"hello world").await.unwrap();
        assert_eq!(created.key.len(), 5);
        assert!(created.key.chars().all(|c| c.is_ascii_alphanumeric()));

        let raw = handler.handle_raw_get(&created.key).await.unwrap();
        assert_eq!(raw.content, "hello world");
        assert_eq!(raw.content_type(), "text/plain; charset=utf-8");

        let wrapped = handler
            .handle_get(&format!("{}.txt", created.key))
            .await
            .unwrap();
        assert_eq!(
            wrapped,
            WrappedDocument {
                data: "hello world".to_string(),
                key: created.key.clone(),
            }
        );
    }

    #[tokio::test]
    async fn test_post_boundaries() {
        let handler = handler(10);

        assert!(handler.handle_post(&[b'x'; 10]).await.is_ok());

        let err = handler.handle_post(&[b'x'; 11]).await.unwrap_err();
        assert!(matches!(err, Error::DocumentTooLarge { len: 11, max: 10 }));

        let err = handler.handle_post(b"").await.unwrap_err();
        assert!(matches!(err, Error::DocumentEmpty));

        let err = handler.handle_post(&[0xff, 0xfe]).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotText));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let handler = handler(10);
        let err = handler.handle_get("doesnotexist").await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { ref key } if key == "doesnotexist"));

        let err = handler.handle_raw_get("nope.md").await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { ref key } if key == "nope"));
    }

    #[tokio::test]
    async fn test_traversal_in_id_is_rejected() {
        let handler = handler(10);
        let err = handler.handle_raw_get("..").await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_key_generation_exhausted() {
        // A one-key space: the second write can never find a free key
        let generator = KeyGenerator::Random(RandomGenerator::new("a", 1).unwrap());
        let handler = DocumentHandler::new(DocumentStore::memory(), generator, 100)
            .with_max_key_attempts(3);

        assert_eq!(handler.handle_post(b"first").await.unwrap().key, "a");

        let err = handler.handle_post(b"second").await.unwrap_err();
        assert!(matches!(err, Error::KeyGenerationExhausted { attempts: 3 }));
        assert_eq!(err.status_code(), 500);

        assert_eq!(handler.handle_raw_get("a").await.unwrap().content, "first");
    }

    #[tokio::test]
    async fn test_preload_replaces_expired_record() {
        let dir = tempfile::tempdir().unwrap();
        let about = dir.path().join("about.md");
        std::fs::write(&about, "current").unwrap();

        let file = crate::store::FileStore::open(dir.path().join("data")).unwrap();
        let store = DocumentStore::custom(file).with_expiration(Some(Duration::from_millis(20)));
        store.set("about", "leftover", false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let generator = KeyGenerator::from_config(&KeyGeneratorConfig::Phonetic, 6).unwrap();
        let handler = DocumentHandler::new(store, generator, 100);

        let mut documents = BTreeMap::new();
        documents.insert("about".to_string(), about);
        let report = handler.preload(&documents).await;

        assert_eq!(report.loaded, 1);
        assert_eq!(report.existing, 0);
        assert_eq!(handler.handle_raw_get("about").await.unwrap().content, "current");
    }

    #[test]
    fn test_oversized_dictionary_keys_fail_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let words = dir.path().join("words.txt");
        std::fs::write(&words, "internationalization\n").unwrap();

        let config = Config {
            key_length: 30,
            key_generator: KeyGeneratorConfig::Dictionary { path: words },
            storage: crate::config::StorageConfig::Memory(Default::default()),
            ..Config::default()
        };

        let err = DocumentHandler::from_config(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_preload() {
        let dir = tempfile::tempdir().unwrap();
        let about = dir.path().join("about.md");
        std::fs::write(&about, "# About\n").unwrap();
        let empty = dir.path().join("empty.md");
        std::fs::write(&empty, "").unwrap();

        let mut documents = BTreeMap::new();
        documents.insert("about".to_string(), about);
        documents.insert("empty".to_string(), empty);
        documents.insert("missing".to_string(), dir.path().join("missing.md"));
        documents.insert("../evil".to_string(), dir.path().join("missing.md"));

        let store = DocumentStore::memory().with_expiration(Some(Duration::from_millis(10)));
        let generator = KeyGenerator::from_config(&KeyGeneratorConfig::Phonetic, 6).unwrap();
        let handler = DocumentHandler::new(store, generator, 100);

        let report = handler.preload(&documents).await;
        assert_eq!(report.loaded, 1);
        assert_eq!(report.existing, 0);
        assert_eq!(report.failed.len(), 3);

        // Permanent despite the store's short default expiration
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(handler.handle_raw_get("about").await.unwrap().content, "# About\n");

        // A second run finds the document already in place
        let report = handler.preload(&documents).await;
        assert_eq!(report.loaded, 0);
        assert_eq!(report.existing, 1);
    }
}
