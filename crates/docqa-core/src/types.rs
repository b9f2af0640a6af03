//! Domain types shared by the index, the corpus store and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque chunk identity. Assigned once at ingestion, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(Uuid);

impl ChunkId {
    pub fn new_random() -> Self { Self(Uuid::new_v4()) }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// A chunk of a source document that is independently embedded and retrieved.
///
/// - `id`: unique chunk identity
/// - `text`: the decoded text of the token window
/// - `source`: the document identifier (file name) the chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
}

/// A chunk that has not been assigned an identity yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChunk {
    pub text: String,
    pub source: String,
}

impl NewChunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into() }
    }
}

/// One nearest-neighbour hit. `score` is the cosine similarity; higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub row: usize,
    pub score: f32,
    pub chunk: Chunk,
}

/// Result of a top-k retrieval: hits in rank order plus the distinct
/// sources among them in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Retrieval {
    pub hits: Vec<ScoredChunk>,
    pub sources: Vec<String>,
}

impl Retrieval {
    pub fn from_hits(hits: Vec<ScoredChunk>) -> Self {
        let mut sources: Vec<String> = Vec::new();
        for hit in &hits {
            if !sources.iter().any(|s| s == &hit.chunk.source) {
                sources.push(hit.chunk.source.clone());
            }
        }
        Self { hits, sources }
    }

    pub fn texts(&self) -> Vec<String> { self.hits.iter().map(|h| h.chunk.text.clone()).collect() }
}
