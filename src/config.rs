//! Configuration types for the haste service.
//!
//! This module loads the service configuration from a TOML or JSON file
//! and validates it once at startup. It includes:
//!
//! - [`Config`] - Root configuration struct
//! - [`KeyGeneratorConfig`] - Which key generator to build
//! - [`StorageConfig`] - Which document store backend to build
//! - [`RateLimitConfig`] - Per-client request quota
//! - [`LoggingConfig`] - Log level and output format
//!
//! Unknown `type` tags for the key generator or storage fail parsing, so a
//! misconfigured backend stops the process before it binds a port. A
//! storage block without a `type` is a file store.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root configuration, loaded once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum document size in bytes.
    #[serde(default = "default_max_length", alias = "maxLength")]
    pub max_length: usize,
    /// Length of generated keys (characters, or words for the dictionary generator).
    #[serde(default = "default_key_length", alias = "keyLength")]
    pub key_length: usize,
    /// Candidate keys tried per write before giving up.
    #[serde(default = "default_max_key_attempts")]
    pub max_key_attempts: u32,
    #[serde(default, alias = "keyGenerator")]
    pub key_generator: KeyGeneratorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Static documents preloaded at startup: key -> source file.
    #[serde(default)]
    pub documents: BTreeMap<String, PathBuf>,
    #[serde(default, alias = "rateLimits")]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key generator selection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KeyGeneratorConfig {
    /// Uniform characters from a keyspace.
    Random {
        #[serde(default)]
        keyspace: Option<String>,
    },
    /// Alternating consonants and vowels.
    Phonetic,
    /// Words drawn from a newline-separated word list.
    Dictionary { path: PathBuf },
}

impl Default for KeyGeneratorConfig {
    fn default() -> Self {
        Self::Random { keyspace: None }
    }
}

/// Document store backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File(FileStoreConfig),
    Redis(RedisStoreConfig),
    Memory(MemoryStoreConfig),
}

/// Wire form of [`StorageConfig`]; the `type` tag is filled in before this
/// is parsed.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedStorage {
    File(FileStoreConfig),
    Redis(RedisStoreConfig),
    Memory(MemoryStoreConfig),
}

impl<'de> Deserialize<'de> for StorageConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        if let Some(table) = value.as_object_mut() {
            table
                .entry("type")
                .or_insert_with(|| serde_json::Value::from("file"));
        }

        let tagged = TaggedStorage::deserialize(value).map_err(serde::de::Error::custom)?;
        Ok(match tagged {
            TaggedStorage::File(c) => Self::File(c),
            TaggedStorage::Redis(c) => Self::Redis(c),
            TaggedStorage::Memory(c) => Self::Memory(c),
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::File(FileStoreConfig::default())
    }
}

impl StorageConfig {
    /// Backend tag as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    /// Default expiration for non-permanent documents, in seconds.
    pub fn expire_secs(&self) -> Option<u64> {
        match self {
            Self::File(c) => c.expire_secs,
            Self::Redis(c) => c.expire_secs,
            Self::Memory(c) => c.expire_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileStoreConfig {
    #[serde(default = "default_file_store_path")]
    pub path: PathBuf,
    #[serde(default, alias = "expire")]
    pub expire_secs: Option<u64>,
    /// How often expired records are deleted from disk. No sweep when unset.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: default_file_store_path(),
            expire_secs: None,
            sweep_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RedisStoreConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default, alias = "expire")]
    pub expire_secs: Option<u64>,
    /// Bound on every redis round trip, including connecting.
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
    /// Refresh the TTL of expiring documents on every read.
    #[serde(default)]
    pub sliding_expiration: bool,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            expire_secs: None,
            timeout_ms: default_redis_timeout_ms(),
            sliding_expiration: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct MemoryStoreConfig {
    #[serde(default, alias = "expire")]
    pub expire_secs: Option<u64>,
}

/// Per-client-IP request quota.
///
/// Also accepts express-rate-limit style keys: `max` or `limit` for the
/// request count and `windowMs` for the window (rounded up to seconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RateLimitFile")]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

#[derive(Deserialize)]
struct RateLimitFile {
    #[serde(alias = "max", alias = "limit")]
    max_requests: u32,
    window_secs: Option<u64>,
    #[serde(alias = "windowMs")]
    window_ms: Option<u64>,
}

impl TryFrom<RateLimitFile> for RateLimitConfig {
    type Error = String;

    fn try_from(file: RateLimitFile) -> std::result::Result<Self, Self::Error> {
        let window_secs = match (file.window_secs, file.window_ms) {
            (Some(_), Some(_)) => {
                return Err("rate limit sets both window_secs and windowMs".to_string());
            },
            (Some(secs), None) => secs,
            (None, Some(ms)) => ms.div_ceil(1000),
            (None, None) => constants::DEFAULT_RATE_LIMIT_WINDOW_SECS,
        };

        Ok(Self {
            max_requests: file.max_requests,
            window_secs,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    constants::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    constants::DEFAULT_PORT
}

fn default_max_length() -> usize {
    constants::DEFAULT_MAX_LENGTH
}

fn default_key_length() -> usize {
    constants::DEFAULT_KEY_LENGTH
}

fn default_max_key_attempts() -> u32 {
    constants::DEFAULT_MAX_KEY_ATTEMPTS
}

fn default_file_store_path() -> PathBuf {
    PathBuf::from(constants::DEFAULT_FILE_STORE_PATH)
}

fn default_redis_url() -> String {
    constants::DEFAULT_REDIS_URL.to_string()
}

fn default_redis_timeout_ms() -> u64 {
    constants::DEFAULT_REDIS_TIMEOUT_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_length: default_max_length(),
            key_length: default_key_length(),
            max_key_attempts: default_max_key_attempts(),
            key_generator: KeyGeneratorConfig::default(),
            storage: StorageConfig::default(),
            documents: BTreeMap::new(),
            rate_limit: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML/JSON syntax
    /// - A `type` tag names an unknown key generator or storage backend
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or unknown backend tags.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid JSON or unknown backend tags.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply `HOST`, `PORT` and `REDIS_URL` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is not a valid port number.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is not a valid port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            self.host = host;
        }

        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            self.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: '{port}'"))?;
        }

        if let StorageConfig::Redis(redis) = &mut self.storage
            && let Some(url) = lookup("REDIS_URL").filter(|u| !u.is_empty())
        {
            redis.url = url;
        }

        Ok(())
    }

    /// Validate configuration with comprehensive checks.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error listing every fatal problem:
    /// - Zero port, `max_length`, `key_length` or `max_key_attempts`
    /// - `key_length` above the supported maximum
    /// - Empty, non-ASCII-alphanumeric or duplicated random keyspace
    /// - Zero rate limit quota or window
    /// - Zero redis timeout
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Server
        if self.port == 0 {
            errors.push("port cannot be 0. Use a valid port number (1-65535)".to_string());
        } else if self.port < 1024 {
            warnings.push(format!(
                "port {} is a system/privileged port (< 1024)",
                self.port
            ));
        }

        // 2. Document limits
        if self.max_length == 0 {
            errors.push("max_length cannot be 0".to_string());
        }

        if self.max_key_attempts == 0 {
            errors.push("max_key_attempts cannot be 0".to_string());
        }

        // 3. Key generation
        if self.key_length == 0 {
            errors.push("key_length cannot be 0".to_string());
        } else if self.key_length > constants::MAX_KEY_LENGTH {
            errors.push(format!(
                "key_length {} exceeds the maximum of {}",
                self.key_length,
                constants::MAX_KEY_LENGTH
            ));
        }

        match &self.key_generator {
            KeyGeneratorConfig::Random {
                keyspace: Some(keyspace),
            } => {
                if let Err(e) = validate_keyspace(keyspace) {
                    errors.push(e);
                } else if keyspace.len() < 10 && self.key_length < 8 {
                    warnings.push(format!(
                        "keyspace of {} characters with key_length {} leaves little room \
                         before writes start colliding",
                        keyspace.len(),
                        self.key_length
                    ));
                }
            },
            KeyGeneratorConfig::Dictionary { .. } => {},
            _ => {
                if (1..4).contains(&self.key_length) {
                    warnings.push(format!(
                        "key_length {} is short; writes will start colliding quickly",
                        self.key_length
                    ));
                }
            },
        }

        // 4. Storage
        if let StorageConfig::Redis(redis) = &self.storage
            && redis.timeout_ms == 0
        {
            errors.push("storage.timeout_ms cannot be 0".to_string());
        }

        if self.storage.expire_secs() == Some(0) {
            errors.push("storage.expire_secs cannot be 0 (omit it to disable expiration)".into());
        }

        // 5. Rate limiting
        if let Some(limit) = &self.rate_limit {
            if limit.max_requests == 0 {
                errors.push("rate_limit.max_requests cannot be 0".to_string());
            }
            if limit.window_secs == 0 {
                errors.push("rate_limit.window_secs cannot be 0".to_string());
            }
        }

        if !errors.is_empty() {
            bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }

        Ok(ValidationResult { warnings })
    }
}

/// Checks that a keyspace is non-empty, unique, and only uses key-safe characters.
fn validate_keyspace(keyspace: &str) -> std::result::Result<(), String> {
    if keyspace.is_empty() {
        return Err("key_generator.keyspace cannot be empty".to_string());
    }

    if let Some(c) = keyspace
        .chars()
        .find(|c| !crate::store::is_key_char(*c))
    {
        return Err(format!(
            "key_generator.keyspace contains '{c}'; only [A-Za-z0-9_-] are allowed"
        ));
    }

    let mut seen = std::collections::HashSet::new();
    if let Some(c) = keyspace.chars().find(|c| !seen.insert(*c)) {
        return Err(format!("key_generator.keyspace repeats '{c}'"));
    }

    Ok(())
}
