//! Collaborator seams. Implementations live in `docqa-embed` (models) and
//! `docqa-core::extract` (plain text).

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> anyhow::Result<String>;
}

/// Text to vector. Outputs are raw: callers normalize at the index boundary.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub trait TextExtractor: Send + Sync {
    /// May return an empty string when nothing usable could be extracted.
    fn extract(&self, bytes: &[u8], filename: &str) -> String;
}
