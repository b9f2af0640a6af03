//! Chunk identities in index row order, plus text and source per identity.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use docqa_core::error::{Error, Result};
use docqa_core::types::{Chunk, ChunkId, NewChunk};

/// What is recorded per identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStore {
    chunk_ids: Vec<ChunkId>,
    chunks: HashMap<ChunkId, ChunkRecord>,
}

impl CorpusStore {
    pub fn new() -> Self { Self::default() }

    /// Rebuild from persisted parts. Every id must be unique and have a record.
    pub(crate) fn from_parts(chunk_ids: Vec<ChunkId>, mut chunks: HashMap<ChunkId, ChunkRecord>) -> Result<Self> {
        if chunks.len() != chunk_ids.len() {
            return Err(Error::PersistenceCorruption(format!(
                "{} chunk ids but {} chunk records",
                chunk_ids.len(),
                chunks.len()
            )));
        }
        if chunk_ids.iter().collect::<HashSet<_>>().len() != chunk_ids.len() {
            return Err(Error::PersistenceCorruption("duplicate chunk ids".into()));
        }
        if let Some(missing) = chunk_ids.iter().find(|id| !chunks.contains_key(id)) {
            return Err(Error::PersistenceCorruption(format!("chunk {missing} has no record")));
        }
        chunks.shrink_to_fit();
        Ok(Self { chunk_ids, chunks })
    }

    /// Assign a fresh identity to each chunk, in input order.
    pub fn append(&mut self, batch: Vec<NewChunk>) -> Vec<ChunkId> {
        let mut ids = Vec::with_capacity(batch.len());
        for NewChunk { text, source } in batch {
            let id = ChunkId::new_random();
            self.chunk_ids.push(id.clone());
            self.chunks.insert(id.clone(), ChunkRecord { text, source });
            ids.push(id);
        }
        ids
    }

    pub fn resolve(&self, id: &ChunkId) -> Result<Chunk> {
        let record = self.chunks.get(id).ok_or_else(|| Error::NotFound(format!("chunk {id}")))?;
        Ok(Chunk { id: id.clone(), text: record.text.clone(), source: record.source.clone() })
    }

    /// Identity whose embedding occupies `row` of the index.
    pub fn id_at(&self, row: usize) -> Option<&ChunkId> { self.chunk_ids.get(row) }

    pub fn chunk_ids(&self) -> &[ChunkId] { &self.chunk_ids }

    pub(crate) fn records(&self) -> &HashMap<ChunkId, ChunkRecord> { &self.chunks }

    pub fn len(&self) -> usize { self.chunk_ids.len() }

    pub fn is_empty(&self) -> bool { self.chunk_ids.is_empty() }

    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.chunk_ids.len() {
            return;
        }
        for id in self.chunk_ids.drain(len..) {
            self.chunks.remove(&id);
        }
    }
}
