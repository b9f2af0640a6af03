//! On-disk pair of artifacts: `index.bin` (bincode, vectors) and
//! `metadata.json` (chunk ids in row order plus text/source per id).
//!
//! Each file is written to a temp file in the same directory and renamed into
//! place. Both carry the same snapshot id; the two renames are not atomic as a
//! pair, so a crash between them leaves mismatched snapshots, which `load`
//! refuses rather than trusting.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;
use uuid::Uuid;

use docqa_core::error::{Error, Result};
use docqa_core::types::ChunkId;

use crate::corpus::{ChunkRecord, CorpusStore};
use crate::index::VectorIndex;
use crate::indexed::IndexedCorpus;

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexOut<'a> {
    format_version: u32,
    snapshot: Uuid,
    dim: usize,
    rows: usize,
    data: &'a [f32],
}

#[derive(Deserialize)]
struct IndexIn {
    format_version: u32,
    snapshot: Uuid,
    dim: usize,
    rows: usize,
    data: Vec<f32>,
}

#[derive(Serialize)]
struct MetadataOut<'a> {
    format_version: u32,
    snapshot: Uuid,
    rows: usize,
    chunk_ids: &'a [ChunkId],
    chunks: BTreeMap<&'a ChunkId, &'a ChunkRecord>,
}

#[derive(Deserialize)]
struct MetadataIn {
    format_version: u32,
    snapshot: Uuid,
    rows: usize,
    chunk_ids: Vec<ChunkId>,
    chunks: HashMap<ChunkId, ChunkRecord>,
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> Error {
    Error::PersistenceCorruption(format!("{what}: {err}"))
}

pub struct PersistenceManager {
    dir: PathBuf,
}

impl PersistenceManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn index_path(&self) -> PathBuf { self.dir.join(INDEX_FILE) }

    pub fn metadata_path(&self) -> PathBuf { self.dir.join(METADATA_FILE) }

    /// Write both artifacts under a fresh snapshot id. Safe to repeat.
    pub fn save(&self, state: &IndexedCorpus) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let snapshot = Uuid::new_v4();
        let index = state.index();
        let corpus = state.corpus();

        let index_out = IndexOut {
            format_version: FORMAT_VERSION,
            snapshot,
            dim: index.dim().unwrap_or(0),
            rows: index.len(),
            data: index.raw(),
        };
        let index_bytes = bincode::serialize(&index_out).map_err(|e| Error::operation("encoding index", e))?;

        let meta_out = MetadataOut {
            format_version: FORMAT_VERSION,
            snapshot,
            rows: corpus.len(),
            chunk_ids: corpus.chunk_ids(),
            chunks: corpus.records().iter().collect(),
        };
        let meta_bytes = serde_json::to_vec(&meta_out).map_err(|e| Error::operation("encoding metadata", e))?;

        self.write_atomic(INDEX_FILE, &index_bytes)?;
        self.write_atomic(METADATA_FILE, &meta_bytes)?;
        info!(rows = index.len(), dir = %self.dir.display(), %snapshot, "persisted index");
        Ok(())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(name)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Restore the state of the last successful `save`, or an empty corpus if
    /// nothing was ever saved. A lone or mismatched artifact is an error.
    pub fn load(&self) -> Result<IndexedCorpus> {
        let index_path = self.index_path();
        let meta_path = self.metadata_path();
        match (index_path.exists(), meta_path.exists()) {
            (false, false) => {
                info!(dir = %self.dir.display(), "no persisted index, starting empty");
                Ok(IndexedCorpus::new())
            }
            (true, false) => Err(Error::PersistenceCorruption(format!(
                "{} exists but {} is missing",
                index_path.display(),
                meta_path.display()
            ))),
            (false, true) => Err(Error::PersistenceCorruption(format!(
                "{} exists but {} is missing",
                meta_path.display(),
                index_path.display()
            ))),
            (true, true) => {
                let state = self.read_pair(&index_path, &meta_path)?;
                info!(rows = state.len(), dim = ?state.dim(), "loaded persisted index");
                Ok(state)
            }
        }
    }

    fn read_pair(&self, index_path: &Path, meta_path: &Path) -> Result<IndexedCorpus> {
        let index_in: IndexIn =
            bincode::deserialize(&fs::read(index_path)?).map_err(|e| corrupt("decoding index", e))?;
        let meta_in: MetadataIn =
            serde_json::from_slice(&fs::read(meta_path)?).map_err(|e| corrupt("decoding metadata", e))?;

        if index_in.format_version != FORMAT_VERSION || meta_in.format_version != FORMAT_VERSION {
            return Err(Error::PersistenceCorruption(format!(
                "unsupported format version (index {}, metadata {})",
                index_in.format_version, meta_in.format_version
            )));
        }
        if index_in.snapshot != meta_in.snapshot {
            return Err(Error::PersistenceCorruption(format!(
                "index snapshot {} does not match metadata snapshot {}",
                index_in.snapshot, meta_in.snapshot
            )));
        }
        if index_in.rows != meta_in.rows || meta_in.rows != meta_in.chunk_ids.len() {
            return Err(Error::PersistenceCorruption(format!(
                "index records {} rows, metadata records {} rows and {} chunk ids",
                index_in.rows,
                meta_in.rows,
                meta_in.chunk_ids.len()
            )));
        }

        let index = if index_in.dim == 0 {
            if !index_in.data.is_empty() {
                return Err(Error::PersistenceCorruption("index without dimensionality holds data".into()));
            }
            VectorIndex::new()
        } else {
            VectorIndex::from_parts(index_in.dim, index_in.data)?
        };
        if index.len() != index_in.rows {
            return Err(Error::PersistenceCorruption(format!(
                "index header says {} rows, data holds {}",
                index_in.rows,
                index.len()
            )));
        }
        let corpus = CorpusStore::from_parts(meta_in.chunk_ids, meta_in.chunks)?;
        IndexedCorpus::from_parts(index, corpus)
    }
}
