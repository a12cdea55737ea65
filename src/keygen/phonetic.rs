//! Pronounceable keys built from alternating consonants and vowels.

use rand::Rng;
use rand::seq::SliceRandom;

const CONSONANTS: &[u8] = b"bcdfghjklmnpqrstvwxyz";
const VOWELS: &[u8] = b"aeiou";

/// Generates keys like `dokatu` or `ubiref`.
///
/// The first character is a consonant or a vowel with equal probability;
/// after that the two classes alternate.
#[derive(Debug, Clone)]
pub struct PhoneticGenerator {
    key_length: usize,
}

impl PhoneticGenerator {
    pub fn new(key_length: usize) -> Self {
        Self { key_length }
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let start = rng.gen_range(0..2);

        (0..self.key_length)
            .map(|i| {
                let class = if i % 2 == start { CONSONANTS } else { VOWELS };
                // Both classes are non-empty constants
                char::from(*class.choose(&mut rng).unwrap_or(&b'a'))
            })
            .collect()
    }
}
