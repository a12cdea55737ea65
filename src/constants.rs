//! Default values shared by configuration and the document core.

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 7777;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default maximum document size in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 400_000;

/// Default generated key length.
pub const DEFAULT_KEY_LENGTH: usize = 10;

/// Upper bound on configured key length.
pub const MAX_KEY_LENGTH: usize = 64;

/// Maximum length of any stored key (generated or preloaded).
pub const MAX_KEY_BYTES: usize = 255;

/// Default number of key candidates tried before giving up on a write.
pub const DEFAULT_MAX_KEY_ATTEMPTS: u32 = 8;

/// Default keyspace for the random key generator.
pub const DEFAULT_KEYSPACE: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default directory for the file store.
pub const DEFAULT_FILE_STORE_PATH: &str = "./data";

/// Default redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default timeout for a single redis operation, in milliseconds.
pub const DEFAULT_REDIS_TIMEOUT_MS: u64 = 2_000;

/// Default config file when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "haste.toml";

/// Rate limit window when the config gives only a request count.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
