//! Ingestion and retrieval over one process-wide indexed corpus, and the
//! hand-off of retrieved context to a completion service.

pub mod ask;
pub mod completion;
pub mod ollama;
pub mod prompt;
pub mod service;

pub use ask::{Answer, Asker};
pub use completion::CompletionService;
pub use ollama::OllamaClient;
pub use service::{IngestOutcome, IndexService};
