//! Filesystem-backed document backend.
//!
//! Each document is one file under the root directory, named after its key.
//! The file holds a small JSON record with the content and an optional
//! expiry timestamp. Files in the directory that are not records (dropped in
//! by an operator) are served verbatim and never expire.
//!
//! # Atomicity
//!
//! A write goes to a uniquely named temporary file first and is then
//! published with `hard_link`, which fails if the key already exists. That
//! makes the reservation exclusive across threads and processes, and readers
//! never see a half-written document.
//!
//! An expired record still occupies its name. Whoever removes it (a writer
//! reclaiming the key, or the sweeper) first takes the key's `.lock-` file
//! and re-reads the record under it, so a fresh record published in the
//! meantime is never deleted.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::backend::{DocumentBackend, SetOutcome};
use crate::error::{Error, Result};

const NAME: &str = "file";

/// Record format version written into every document file.
const RECORD_VERSION: u32 = 1;

/// Prefix of in-flight temporary files. Keys can never start with a dot.
const TEMP_PREFIX: &str = ".tmp-";

/// Prefix of per-key reclaim locks.
const LOCK_PREFIX: &str = ".lock-";

/// Longest key suffix used in a lock name, keeping it under `NAME_MAX`.
/// Keys sharing a truncated prefix just share a lock.
const LOCK_KEY_BYTES: usize = 240;

/// Temporary and lock files older than this are leftovers from a crash.
const STALE_TEMP_AGE: Duration = Duration::from_secs(3600);

/// On-disk document record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    version: u32,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredDocument {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// What a document file turned out to contain.
enum Loaded {
    Live(String),
    Expired,
}

/// Exclusive right to delete an expired record, released on drop.
struct KeyLock {
    path: PathBuf,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "Failed to release key lock");
        }
    }
}

/// Filesystem-backed document backend.
///
/// # Thread Safety
///
/// `FileStore` is `Clone` and can be shared across threads. All filesystem
/// work runs on tokio's blocking pool.
#[derive(Clone)]
pub struct FileStore {
    root: Arc<PathBuf>,
}

impl FileStore {
    /// Opens (creating if needed) a file store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            Error::io(format!("creating document directory {}", root.display()), e)
        })?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn set_sync(&self, key: &str, content: &str, ttl: Option<Duration>) -> Result<SetOutcome> {
        let expires_at = ttl
            .map(|ttl| {
                TimeDelta::from_std(ttl)
                    .ok()
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or_else(|| Error::Config(format!("expiration {ttl:?} is out of range")))
            })
            .transpose()?;

        let record = StoredDocument {
            version: RECORD_VERSION,
            content: content.to_string(),
            expires_at,
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| Error::unavailable(NAME, format!("encoding {key}: {e}")))?;

        let temp_path = self.root.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let result = write_new(&temp_path, &bytes).and_then(|()| self.publish(key, &temp_path));

        if let Err(e) = fs::remove_file(&temp_path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(path = %temp_path.display(), error = %e, "Failed to remove temporary file");
        }

        result.map_err(|e| Error::unavailable(NAME, format!("writing {key}: {e}")))
    }

    /// Links the written temp file to the key name, reclaiming the name once
    /// if it is held by an expired record.
    fn publish(&self, key: &str, temp_path: &Path) -> std::io::Result<SetOutcome> {
        let path = self.document_path(key);
        if link_new(temp_path, &path)?.is_stored() {
            return Ok(SetOutcome::Stored);
        }

        if !matches!(self.load_sync(&path)?, Some(Loaded::Expired)) {
            return Ok(SetOutcome::Collision);
        }

        // Another writer is reclaiming the same key and will win it
        let Some(_lock) = self.try_lock(key)? else {
            return Ok(SetOutcome::Collision);
        };

        if self.remove_if_expired(&path)? {
            debug!(key, "Reclaimed expired document key");
        }
        link_new(temp_path, &path)
    }

    /// Takes the reclaim lock for `key`, or `None` if someone else holds it.
    ///
    /// A lock older than [`STALE_TEMP_AGE`] was left by a crashed process and
    /// is broken once.
    fn try_lock(&self, key: &str) -> std::io::Result<Option<KeyLock>> {
        let end = (0..=key.len().min(LOCK_KEY_BYTES))
            .rev()
            .find(|&i| key.is_char_boundary(i))
            .unwrap_or(0);
        let path = self.root.join(format!("{LOCK_PREFIX}{}", &key[..end]));

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Some(KeyLock { path })),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_older_than(&path, STALE_TEMP_AGE) {
                        return Ok(None);
                    }
                    warn!(path = %path.display(), "Breaking abandoned key lock");
                    if let Err(e) = fs::remove_file(&path)
                        && e.kind() != ErrorKind::NotFound
                    {
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Deletes the record at `path` if it is expired. Caller holds its lock.
    fn remove_if_expired(&self, path: &Path) -> std::io::Result<bool> {
        if !matches!(self.load_sync(path)?, Some(Loaded::Expired)) {
            return Ok(false);
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn load_sync(&self, path: &Path) -> std::io::Result<Option<Loaded>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let loaded = match serde_json::from_slice::<StoredDocument>(&bytes) {
            Ok(record) if record.is_expired(Utc::now()) => Loaded::Expired,
            Ok(record) => Loaded::Live(record.content),
            Err(_) => match String::from_utf8(bytes) {
                Ok(content) => Loaded::Live(content),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        "Document file is not valid UTF-8, serving with replacement characters"
                    );
                    Loaded::Live(String::from_utf8_lossy(e.as_bytes()).into_owned())
                },
            },
        };
        Ok(Some(loaded))
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>> {
        match self.load_sync(&self.document_path(key)) {
            Ok(Some(Loaded::Live(content))) => Ok(Some(content)),
            Ok(Some(Loaded::Expired) | None) => Ok(None),
            Err(e) => Err(Error::unavailable(NAME, format!("reading {key}: {e}"))),
        }
    }

    /// Deletes expired records and stale temporary and lock files.
    ///
    /// Records are removed under their key lock, like a reclaiming writer,
    /// so a sweep is safe alongside writes and other sweeps.
    fn sweep_sync(&self) -> Result<usize> {
        let entries = fs::read_dir(self.root.as_path())
            .map_err(|e| Error::unavailable(NAME, format!("scanning directory: {e}")))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.starts_with(TEMP_PREFIX) || name.starts_with(LOCK_PREFIX) {
                if is_older_than(&path, STALE_TEMP_AGE) && fs::remove_file(&path).is_ok() {
                    debug!(path = %path.display(), "Removed stale leftover file");
                }
                continue;
            }

            if name.starts_with('.') || !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }

            if !matches!(self.load_sync(&path), Ok(Some(Loaded::Expired))) {
                continue;
            }

            let outcome = self
                .try_lock(&name)
                .and_then(|lock| match lock {
                    Some(_lock) => self.remove_if_expired(&path),
                    None => Ok(false),
                });
            match outcome {
                Ok(true) => removed += 1,
                Ok(false) => {},
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove expired document");
                },
            }
        }

        Ok(removed)
    }
}

fn is_older_than(path: &Path, age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|elapsed| elapsed > age)
}

/// Hard-links `from` to `to`; an existing `to` is a collision.
fn link_new(from: &Path, to: &Path) -> std::io::Result<SetOutcome> {
    match fs::hard_link(from, to) {
        Ok(()) => Ok(SetOutcome::Stored),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(SetOutcome::Collision),
        Err(e) => Err(e),
    }
}

/// Writes `bytes` to a file that must not exist yet.
fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[async_trait]
impl DocumentBackend for FileStore {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, content: &str, ttl: Option<Duration>) -> Result<SetOutcome> {
        let backend = self.clone();
        let key = key.to_string();
        let content = content.to_string();
        tokio::task::spawn_blocking(move || backend.set_sync(&key, &content, ttl))
            .await
            .map_err(|e| Error::unavailable(NAME, format!("task join error: {e}")))?
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.get_sync(&key))
            .await
            .map_err(|e| Error::unavailable(NAME, format!("task join error: {e}")))?
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.sweep_sync())
            .await
            .map_err(|e| Error::unavailable(NAME, format!("task join error: {e}")))?
    }
}
