//! Uniform random keys over a configurable keyspace.

use rand::Rng;

use crate::error::{Error, Result};
use crate::store::is_key_char;

/// Draws each key character independently from a fixed keyspace.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    keyspace: Vec<char>,
    key_length: usize,
}

impl RandomGenerator {
    /// Creates a generator over `keyspace`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the keyspace is empty or contains a
    /// character that cannot appear in a document key.
    pub fn new(keyspace: &str, key_length: usize) -> Result<Self> {
        let keyspace: Vec<char> = keyspace.chars().collect();
        if keyspace.is_empty() {
            return Err(Error::Config("random keyspace cannot be empty".to_string()));
        }
        if let Some(c) = keyspace.iter().find(|c| !is_key_char(**c)) {
            return Err(Error::Config(format!(
                "random keyspace contains '{c}', which is not allowed in keys"
            )));
        }
        Ok(Self {
            keyspace,
            key_length,
        })
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.key_length)
            .map(|_| self.keyspace[rng.gen_range(0..self.keyspace.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_keyspace_rejected() {
        assert!(RandomGenerator::new("", 5).is_err());
    }

    #[test]
    fn test_unsafe_keyspace_rejected() {
        assert!(RandomGenerator::new("abc/", 5).is_err());
        assert!(RandomGenerator::new("ab.c", 5).is_err());
    }

    #[test]
    fn test_single_char_keyspace() {
        let generator = RandomGenerator::new("x", 4).unwrap();
        assert_eq!(generator.generate(), "xxxx");
    }

    #[test]
    fn test_keys_vary() {
        let generator = RandomGenerator::new("abcdefghijklmnopqrstuvwxyz", 10).unwrap();
        let keys: HashSet<String> = (0..100).map(|_| generator.generate()).collect();
        // 26^10 space; a repeat within 100 draws would mean a broken rng
        assert_eq!(keys.len(), 100);
    }

    proptest! {
        #[test]
        fn prop_length_and_charset(len in 1usize..=64, keyspace in "[a-zA-Z0-9]{1,20}") {
            let generator = RandomGenerator::new(&keyspace, len).unwrap();
            let key = generator.generate();
            prop_assert_eq!(key.chars().count(), len);
            prop_assert!(key.chars().all(|c| keyspace.contains(c)));
        }
    }
}
