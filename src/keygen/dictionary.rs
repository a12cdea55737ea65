//! Keys made of words drawn from a word list.

use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::Arc;

use crate::constants::MAX_KEY_BYTES;
use crate::error::{Error, Result};

/// Concatenates `key_length` random words, e.g. `applemoonriver`.
///
/// Words are reduced to their ASCII alphanumeric characters when the list is
/// loaded, so every key is safe to use as a file name. Words long enough
/// that `key_length` of them could exceed the key size limit are dropped.
#[derive(Debug, Clone)]
pub struct DictionaryGenerator {
    words: Arc<Vec<String>>,
    key_length: usize,
}

impl DictionaryGenerator {
    /// Loads a newline-separated word list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it contains no usable words.
    pub fn from_file(path: &Path, key_length: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading dictionary {}", path.display()), e))?;
        Self::from_words(content.lines(), key_length)
            .map_err(|e| Error::Config(format!("dictionary {}: {e}", path.display())))
    }

    /// Builds a generator from an in-memory word list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no word survives normalisation or every
    /// word is too long for `key_length` of them to form a valid key.
    pub fn from_words<'a, I>(words: I, key_length: usize) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let max_word_len = MAX_KEY_BYTES / key_length.max(1);

        let (words, too_long): (Vec<String>, Vec<String>) = words
            .into_iter()
            .map(|w| w.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
            .filter(|w| !w.is_empty())
            .partition(|w| w.len() <= max_word_len);

        if words.is_empty() {
            return Err(Error::Config(if too_long.is_empty() {
                "word list is empty".to_string()
            } else {
                format!(
                    "every word is longer than {max_word_len} characters, \
                     so {key_length} of them exceed the {MAX_KEY_BYTES} byte key limit"
                )
            }));
        }

        if !too_long.is_empty() {
            tracing::warn!(
                dropped = too_long.len(),
                kept = words.len(),
                max_word_len,
                "Dropped dictionary words too long for key_length"
            );
        }

        Ok(Self {
            words: Arc::new(words),
            key_length,
        })
    }

    /// Number of usable words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let mut key = String::new();
        for _ in 0..self.key_length {
            if let Some(word) = self.words.choose(&mut rng) {
                key.push_str(word);
            }
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_normalised() {
        let generator = DictionaryGenerator::from_words(["don't", "", "  ", "a/b"], 1).unwrap();
        assert_eq!(generator.len(), 2);

        for _ in 0..20 {
            let key = generator.generate();
            assert!(key == "dont" || key == "ab", "unexpected key {key}");
        }
    }

    #[test]
    fn test_concatenates_key_length_words() {
        let generator = DictionaryGenerator::from_words(["ox"], 3).unwrap();
        assert_eq!(generator.generate(), "oxoxox");
    }

    #[test]
    fn test_empty_word_list_rejected() {
        assert!(DictionaryGenerator::from_words(["", "!!"], 2).is_err());
    }

    #[test]
    fn test_words_too_long_for_key_length_rejected() {
        let err = DictionaryGenerator::from_words(["internationalization"], 30).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_long_words_dropped_and_keys_stay_valid() {
        // 255 / 30 = 8 characters per word at most
        let generator =
            DictionaryGenerator::from_words(["internationalization", "moon", "eightchr"], 30)
                .unwrap();
        assert_eq!(generator.len(), 2);

        for _ in 0..50 {
            let key = generator.generate();
            assert!(key.len() <= MAX_KEY_BYTES);
            assert!(crate::store::validate_key(&key).is_ok());
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "apple\nmoon\nriver\n").unwrap();

        let generator = DictionaryGenerator::from_file(&path, 2).unwrap();
        assert_eq!(generator.len(), 3);
        assert!(!generator.generate().is_empty());
    }
}
