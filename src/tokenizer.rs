//! Deterministic token counting used to size chunks

use tiktoken_rs::CoreBPE;

use crate::error::{Result, RobertaError};

/// Counts tokens in a piece of text. Implementations must be deterministic.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Tokenizer backed by the `cl100k_base` BPE encoding
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RobertaError::Tokenizer(format!("Failed to load cl100k_base: {}", e)))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}
