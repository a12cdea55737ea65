//! haste: a short-text snippet storage service.
//!
//! Clients POST text and get back a short key; the text is later served,
//! wrapped as JSON or raw, by that key. The crate is split into:
//!
//! - [`keygen`] - Random, phonetic and dictionary key generators
//! - [`store`] - Document store contract with file, redis and memory backends
//! - [`handler`] - Write/read orchestration and static document preload
//! - [`http`] - axum router, rate limiting and server lifecycle
//! - [`config`] - TOML/JSON configuration with environment overrides

pub mod config;
pub mod constants;
pub mod error;
pub mod handler;
pub mod http;
pub mod keygen;
pub mod logging;
pub mod store;

pub use error::{Error, Result};
