//! The vector index and the corpus store behind one owner, so that row `i`
//! of the index and `chunk_ids[i]` can only move together.

use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::types::{Chunk, ChunkId, NewChunk, ScoredChunk};

use crate::corpus::CorpusStore;
use crate::index::{UnitVector, VectorIndex};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedCorpus {
    index: VectorIndex,
    corpus: CorpusStore,
}

impl IndexedCorpus {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn from_parts(index: VectorIndex, corpus: CorpusStore) -> Result<Self> {
        if index.len() != corpus.len() {
            return Err(Error::PersistenceCorruption(format!(
                "index has {} rows but corpus has {} chunk ids",
                index.len(),
                corpus.len()
            )));
        }
        Ok(Self { index, corpus })
    }

    pub(crate) fn index(&self) -> &VectorIndex { &self.index }

    pub(crate) fn corpus(&self) -> &CorpusStore { &self.corpus }

    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    pub fn dim(&self) -> Option<usize> { self.index.dim() }

    /// Fix the dimensionality before the first append.
    pub fn ensure(&mut self, dim: usize) -> Result<()> { self.index.create(dim) }

    /// Append vectors and their chunks as one step. On error nothing changes.
    pub fn append(&mut self, batch: Vec<(UnitVector, NewChunk)>) -> Result<Vec<ChunkId>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let (vectors, chunks): (Vec<UnitVector>, Vec<NewChunk>) = batch.into_iter().unzip();
        self.index.add(&vectors)?;
        let ids = self.corpus.append(chunks);
        debug_assert_eq!(self.index.len(), self.corpus.len());
        Ok(ids)
    }

    /// Top-k chunks for `query`, most similar first.
    pub fn search(&self, query: &UnitVector, k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.index.search(query, k)?;
        debug!(k, hits = hits.len(), rows = self.len(), "vector search");
        hits.into_iter()
            .map(|(row, score)| {
                let id = self
                    .corpus
                    .id_at(row)
                    .ok_or_else(|| Error::NotFound(format!("no chunk id for index row {row}")))?;
                Ok(ScoredChunk { row, score, chunk: self.corpus.resolve(id)? })
            })
            .collect()
    }

    pub fn chunk_ids(&self) -> &[ChunkId] { self.corpus.chunk_ids() }

    pub fn resolve(&self, id: &ChunkId) -> Result<Chunk> { self.corpus.resolve(id) }

    /// Undo appends back to `rows` rows, e.g. after a failed persist.
    pub fn rollback(&mut self, rows: usize) {
        self.index.truncate(rows);
        self.corpus.truncate(rows);
    }
}
