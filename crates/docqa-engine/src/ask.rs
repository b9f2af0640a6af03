//! Retrieve, assemble the prompt, hand off to the completion service.

use std::sync::Arc;
use tracing::info;

use docqa_core::error::{Error, Result};

use crate::completion::CompletionService;
use crate::prompt::build_prompt;
use crate::service::IndexService;

#[derive(Debug, Clone)]
pub struct Answer {
    /// Completion service reply, unmodified.
    pub reply: serde_json::Value,
    pub sources: Vec<String>,
}

pub struct Asker {
    service: Arc<IndexService>,
    completion: Arc<dyn CompletionService>,
    top_k: usize,
}

impl Asker {
    pub fn new(service: Arc<IndexService>, completion: Arc<dyn CompletionService>, top_k: usize) -> Self {
        Self { service, completion, top_k }
    }

    /// `EmptyIndex` is returned before the completion service is contacted.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let service = Arc::clone(&self.service);
        let q = question.to_string();
        let k = self.top_k;
        let retrieval = tokio::task::spawn_blocking(move || service.retrieve(&q, k))
            .await
            .map_err(|e| Error::operation("retrieval task failed", e))??;

        let prompt = build_prompt(question, &retrieval.texts());
        info!(chunks = retrieval.hits.len(), sources = retrieval.sources.len(), "asking completion service");
        let reply = self.completion.complete(&prompt).await?;
        Ok(Answer { reply, sources: retrieval.sources })
    }
}
