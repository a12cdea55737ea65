//! Document key generation.
//!
//! A [`KeyGenerator`] produces candidate keys of a configured length. It
//! never talks to the document store: uniqueness is enforced by the store's
//! atomic reservation, so a generator may hand out the same key twice.
//!
//! Variants:
//!
//! - **Random**: characters drawn uniformly from a keyspace
//! - **Phonetic**: alternating consonants and vowels, easy to read aloud
//! - **Dictionary**: concatenated words from a word list
//!
//! # Example
//!
//! ```
//! use haste::config::KeyGeneratorConfig;
//! use haste::keygen::KeyGenerator;
//!
//! let generator = KeyGenerator::from_config(&KeyGeneratorConfig::Phonetic, 6).unwrap();
//! assert_eq!(generator.generate().len(), 6);
//! ```

mod dictionary;
mod phonetic;
mod random;

pub use dictionary::DictionaryGenerator;
pub use phonetic::PhoneticGenerator;
pub use random::RandomGenerator;

use crate::config::KeyGeneratorConfig;
use crate::constants;
use crate::error::{Error, Result};

/// Key generator selected by configuration.
#[derive(Debug, Clone)]
pub enum KeyGenerator {
    Random(RandomGenerator),
    Phonetic(PhoneticGenerator),
    Dictionary(DictionaryGenerator),
}

impl KeyGenerator {
    /// Builds the generator described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero or oversized `key_length` or an
    /// unusable keyspace, and [`Error::Io`] if a dictionary cannot be read.
    pub fn from_config(config: &KeyGeneratorConfig, key_length: usize) -> Result<Self> {
        if key_length == 0 || key_length > constants::MAX_KEY_LENGTH {
            return Err(Error::Config(format!(
                "key_length must be between 1 and {}, got {key_length}",
                constants::MAX_KEY_LENGTH
            )));
        }

        match config {
            KeyGeneratorConfig::Random { keyspace } => {
                let keyspace = keyspace.as_deref().unwrap_or(constants::DEFAULT_KEYSPACE);
                Ok(Self::Random(RandomGenerator::new(keyspace, key_length)?))
            },
            KeyGeneratorConfig::Phonetic => Ok(Self::Phonetic(PhoneticGenerator::new(key_length))),
            KeyGeneratorConfig::Dictionary { path } => Ok(Self::Dictionary(
                DictionaryGenerator::from_file(path, key_length)?,
            )),
        }
    }

    /// Produces one candidate key.
    pub fn generate(&self) -> String {
        match self {
            Self::Random(g) => g.generate(),
            Self::Phonetic(g) => g.generate(),
            Self::Dictionary(g) => g.generate(),
        }
    }

    /// Short name of the algorithm, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Random(_) => "random",
            Self::Phonetic(_) => "phonetic",
            Self::Dictionary(_) => "dictionary",
        }
    }
}
