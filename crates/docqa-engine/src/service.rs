//! `IndexService`: the single owner of the indexed corpus.
//!
//! Writers (ingestion) hold the write lock across append + persist, so a
//! reader never sees index rows without their chunk ids or a state that was
//! not persisted. Chunking and embedding happen before the lock is taken.

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{Embedder, TextExtractor, Tokenizer};
use docqa_core::types::{NewChunk, Retrieval};
use docqa_vector::{IndexedCorpus, PersistenceManager, UnitVector};

/// What happened to one uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed(usize),
    /// Extraction produced no text; nothing was indexed.
    Skipped,
}

impl IngestOutcome {
    pub fn chunks(self) -> usize {
        match self {
            Self::Indexed(n) => n,
            Self::Skipped => 0,
        }
    }
}

pub struct IndexService {
    state: RwLock<IndexedCorpus>,
    persistence: PersistenceManager,
    embedder: Box<dyn Embedder>,
    tokenizer: Box<dyn Tokenizer>,
    chunker: Chunker,
}

impl IndexService {
    /// Load persisted state (or start empty) and bind it to the embedder's dimensionality.
    pub fn init(
        persistence: PersistenceManager,
        embedder: Box<dyn Embedder>,
        tokenizer: Box<dyn Tokenizer>,
        chunker: Chunker,
    ) -> Result<Self> {
        let mut state = persistence.load().inspect_err(|e| {
            error!(dir = %persistence.dir().display(), error = %e, "failed to load persisted index");
        })?;
        state.ensure(embedder.dim())?;
        info!(rows = state.len(), dim = embedder.dim(), "index service ready");
        Ok(Self { state: RwLock::new(state), persistence, embedder, tokenizer, chunker })
    }

    /// Build adapters from settings and open the index stored in `index_dir`.
    pub fn from_settings(settings: &Settings, index_dir: &Path) -> anyhow::Result<Self> {
        let (embedder, tokenizer) = docqa_embed::load_adapters(&settings.embed)?;
        let chunker = Chunker::from_config(&settings.chunking)?;
        Ok(Self::init(PersistenceManager::new(index_dir), embedder, tokenizer, chunker)?)
    }

    /// Take the write lock so in-flight ingestion finishes, then release the index.
    pub fn shutdown(self) -> Result<()> {
        let state = self.write()?;
        info!(rows = state.len(), "index service shut down");
        Ok(())
    }

    pub fn row_count(&self) -> Result<usize> { Ok(self.read()?.len()) }

    pub fn dim(&self) -> Result<Option<usize>> { Ok(self.read()?.dim()) }

    pub fn chunker(&self) -> &Chunker { &self.chunker }

    /// Chunk, embed, append and persist one document's text. Returns the number of chunks indexed.
    pub fn ingest(&self, text: &str, source: &str) -> Result<usize> {
        if text.trim().is_empty() {
            debug!(source, "nothing to ingest");
            return Ok(0);
        }
        let texts = self.chunker.chunk(self.tokenizer.as_ref(), text)?;
        if texts.is_empty() {
            return Ok(0);
        }
        let vectors = self.embed(&texts)?;
        let batch: Vec<(UnitVector, NewChunk)> =
            vectors.into_iter().zip(texts.into_iter().map(|t| NewChunk::new(t, source))).collect();

        let mut state = self.write()?;
        let rows_before = state.len();
        let ids = state.append(batch)?;
        if let Err(e) = self.persistence.save(&state) {
            state.rollback(rows_before);
            error!(source, error = %e, "persisting batch failed, rolled back");
            if let Err(restore) = self.persistence.save(&state) {
                error!(error = %restore, "could not restore persisted state");
            }
            return Err(e);
        }
        info!(source, chunks = ids.len(), rows = state.len(), "ingested document");
        Ok(ids.len())
    }

    /// Extract text from an uploaded file and ingest it. Empty extractions are skipped.
    pub fn ingest_document(&self, bytes: &[u8], filename: &str, extractor: &dyn TextExtractor) -> Result<IngestOutcome> {
        let text = extractor.extract(bytes, filename);
        if text.trim().is_empty() {
            warn!(filename, "no text extracted, skipping");
            return Ok(IngestOutcome::Skipped);
        }
        Ok(IngestOutcome::Indexed(self.ingest(&text, filename)?))
    }

    /// Top-k chunks for `question` and their distinct sources in first-seen order.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Retrieval> {
        if self.read()?.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let query = self
            .embed(&[question.to_string()])?
            .pop()
            .ok_or_else(|| Error::Operation("embedder returned no query vector".into()))?;
        let hits = self.read()?.search(&query, k)?;
        debug!(k, hits = hits.len(), "retrieved");
        Ok(Retrieval::from_hits(hits))
    }

    /// Embed and normalize. This is the only place raw embeddings become unit vectors.
    fn embed(&self, texts: &[String]) -> Result<Vec<UnitVector>> {
        let raw = self.embedder.embed_batch(texts).map_err(|e| Error::operation("embedding failed", e))?;
        if raw.len() != texts.len() {
            return Err(Error::Operation(format!("embedder returned {} vectors for {} texts", raw.len(), texts.len())));
        }
        let dim = self.embedder.dim();
        raw.into_iter()
            .map(|v| {
                if v.len() != dim {
                    return Err(Error::DimensionalityMismatch { expected: dim, actual: v.len() });
                }
                UnitVector::normalize(v)
            })
            .collect()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexedCorpus>> {
        self.state.read().map_err(|_| Error::Operation("index lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexedCorpus>> {
        self.state.write().map_err(|_| Error::Operation("index lock poisoned".into()))
    }
}
