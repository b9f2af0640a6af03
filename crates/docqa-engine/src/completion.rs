use async_trait::async_trait;

use docqa_core::error::Result;

/// Downstream text-completion service. The reply is passed through unchanged.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<serde_json::Value>;
}
