//! Token-window chunking.
//!
//! Text is tokenized once, cut into windows of at most `max_tokens` ids that
//! advance by `max_tokens - overlap`, and each window is decoded back to text.
//! The output is a pure function of (tokenizer, text, max_tokens, overlap).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap: 50 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_tokens: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(max_tokens: usize, overlap: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_tokens must be greater than zero".into()));
        }
        if overlap >= max_tokens {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({overlap}) must be smaller than chunking.max_tokens ({max_tokens})"
            )));
        }
        Ok(Self { max_tokens, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> { Self::new(config.max_tokens, config.overlap) }

    pub fn max_tokens(&self) -> usize { self.max_tokens }

    pub fn overlap(&self) -> usize { self.overlap }

    /// Token offsets `[start, end)` of every window for a text of `token_count` tokens.
    pub fn windows(&self, token_count: usize) -> Vec<(usize, usize)> {
        let stride = self.max_tokens - self.overlap;
        let mut out = Vec::new();
        let mut start = 0;
        while start < token_count {
            out.push((start, (start + self.max_tokens).min(token_count)));
            start += stride;
        }
        out
    }

    pub fn chunk(&self, tokenizer: &dyn Tokenizer, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = tokenizer.encode(text).map_err(|e| Error::operation("tokenization failed", e))?;
        self.windows(tokens.len())
            .into_iter()
            .map(|(start, end)| {
                tokenizer.decode(&tokens[start..end]).map_err(|e| Error::operation("detokenization failed", e))
            })
            .collect()
    }
}
