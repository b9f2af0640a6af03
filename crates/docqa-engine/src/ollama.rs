//! Ollama `/api/generate` client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use docqa_core::config::LlmSettings;
use docqa_core::error::{Error, Result};

use crate::completion::CompletionService;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
}

pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<serde_json::Value> {
        let body = GenerateRequest { model: &self.model, prompt, format: "json", stream: false };
        debug!(endpoint = %self.endpoint, model = %self.model, "calling completion service");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Ollama call failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(Error::UpstreamUnavailable(format!("Ollama returned {status}: {text}")));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Ollama reply is not JSON: {e}")))
    }
}

/// The `answer` field of the model's JSON reply, if the reply has that shape.
pub fn answer_text(reply: &serde_json::Value) -> Option<String> {
    let inner = reply.get("response")?.as_str()?;
    let parsed: serde_json::Value = serde_json::from_str(inner).ok()?;
    parsed.get("answer")?.as_str().map(str::to_string)
}
