//! Random word lines.

use crate::{check_range, Result};
use linestream_server::LineProducer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Produces lines of random lowercase words separated by single spaces.
#[derive(Debug, Clone)]
pub struct RandomWords {
    min_words: usize,
    max_words: usize,
    min_len: usize,
    max_len: usize,
    rng: StdRng,
}

impl Default for RandomWords {
    fn default() -> Self {
        Self {
            min_words: 1,
            max_words: 8,
            min_len: 3,
            max_len: 10,
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomWords {
    /// Create a generator with 1 to 8 words of 3 to 10 letters per line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many words a line holds.
    pub fn with_word_count(mut self, min: usize, max: usize) -> Result<Self> {
        check_range("word count", min, max)?;
        self.min_words = min;
        self.max_words = max;
        Ok(self)
    }

    /// Set how many letters a word holds.
    pub fn with_word_length(mut self, min: usize, max: usize) -> Result<Self> {
        check_range("word length", min, max)?;
        self.min_len = min;
        self.max_len = max;
        Ok(self)
    }

    /// Use a fixed seed for reproducible lines.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn word(&mut self) -> String {
        let len = self.rng.gen_range(self.min_len..=self.max_len);
        (0..len)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

impl LineProducer for RandomWords {
    fn build_line(&mut self) -> String {
        let count = self.rng.gen_range(self.min_words..=self.max_words);
        let words: Vec<String> = (0..count).map(|_| self.word()).collect();
        words.join(" ")
    }
}
