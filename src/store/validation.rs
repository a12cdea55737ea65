//! Key validation for the document store.
//!
//! Keys become file names in the file store, so anything that could name a
//! different file (separators, `..`, dotfiles, control characters) is
//! rejected before a backend sees it.

use tracing::warn;

use crate::constants::MAX_KEY_BYTES;
use crate::error::{Error, KeyError, Result};

/// Returns true for characters allowed in a key.
pub(crate) fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Validates a document key.
///
/// Valid keys:
/// - Must not be empty or longer than 255 bytes
/// - Must not contain path separators (`/`, `\`)
/// - Must not start with `.` (covers `.` and `..`)
/// - Must only contain `[A-Za-z0-9_-]`
///
/// # Errors
///
/// Returns [`Error::InvalidKey`] with the matching [`KeyError`].
pub fn validate_key(key: &str) -> Result<()> {
    check_key(key).map_err(|reason| {
        warn!(
            security_event = "invalid_key",
            key = %key.chars().filter(|c| !c.is_control()).take(64).collect::<String>(),
            %reason,
            "Blocked invalid document key"
        );
        Error::invalid_key(key, reason)
    })
}

fn check_key(key: &str) -> std::result::Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(KeyError::TooLong);
    }

    if key.contains('/') || key.contains('\\') {
        return Err(KeyError::PathSeparator);
    }

    if key.starts_with('.') {
        return Err(KeyError::SpecialDirectory);
    }

    if !key.chars().all(is_key_char) {
        return Err(KeyError::InvalidCharacter);
    }

    Ok(())
}
