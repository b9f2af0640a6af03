//! Exact inner-product vector index, the corpus store aligned with its rows,
//! and their on-disk persistence as one unit.

pub mod corpus;
pub mod index;
pub mod indexed;
pub mod persist;

pub use corpus::CorpusStore;
pub use index::{IndexState, UnitVector, VectorIndex};
pub use indexed::IndexedCorpus;
pub use persist::PersistenceManager;
