//! Document store with pluggable backends.
//!
//! Every backend implements the same contract: an atomic set-if-absent that
//! reports [`SetOutcome::Collision`] instead of overwriting, and a get that
//! treats expired documents as missing. Supported backends:
//!
//! - **FileStore**: one file per document under a root directory
//! - **RedisStore**: `SET NX` with native TTLs on a redis server
//! - **MemoryStore**: process-local map, for tests and throwaway instances
//!
//! # Example
//!
//! ```ignore
//! use haste::store::{DocumentStore, FileStore};
//!
//! let store = DocumentStore::custom(FileStore::open("./data")?)
//!     .with_expiration(Some(Duration::from_secs(3600)));
//! store.set("abc", "hello", false).await?;
//! ```
//!
//! # Custom Backends
//!
//! Implement the `DocumentBackend` trait and wrap it with
//! [`DocumentStore::custom`].

mod backend;
mod document_store;
mod file;
mod memory;
mod redis;
mod validation;


// Re-export the public API
pub use backend::{DocumentBackend, SetOutcome};
pub use document_store::DocumentStore;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use validation::validate_key;
pub(crate) use validation::is_key_char;
