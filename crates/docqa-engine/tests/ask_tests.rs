mod common;

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

use docqa_core::config::LlmSettings;
use docqa_core::error::Result;
use docqa_core::Error;
use docqa_engine::{Asker, CompletionService, OllamaClient};

use common::service_at;

#[derive(Default)]
struct RecordingCompletion {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionService for RecordingCompletion {
    async fn complete(&self, prompt: &str) -> Result<serde_json::Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(json!({"response": "{\"answer\": \"blue\"}", "done": true}))
    }
}

struct DownCompletion;

#[async_trait]
impl CompletionService for DownCompletion {
    async fn complete(&self, _prompt: &str) -> Result<serde_json::Value> {
        Err(Error::UpstreamUnavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn ask_sends_context_and_question() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(service_at(tmp.path(), 500, 50));
    service.ingest("The sky is blue.", "sky.txt").unwrap();
    service.ingest("Grass is green.", "grass.txt").unwrap();

    let completion = Arc::new(RecordingCompletion::default());
    let asker = Asker::new(Arc::clone(&service), completion.clone(), 5);
    let answer = asker.ask("What colour is the sky?").await.expect("answer");

    assert_eq!(answer.reply["response"], "{\"answer\": \"blue\"}");
    assert_eq!(answer.sources, vec!["sky.txt", "grass.txt"]);
    let prompts = completion.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("The sky is blue.\n\n---\n\nGrass is green."));
    assert!(prompts[0].contains("QUESTION:\nWhat colour is the sky?"));
}

#[tokio::test]
async fn empty_index_never_reaches_the_completion_service() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(service_at(tmp.path(), 500, 50));
    let completion = Arc::new(RecordingCompletion::default());
    let asker = Asker::new(service, completion.clone(), 5);

    let err = asker.ask("anything?").await.unwrap_err();
    assert!(matches!(err, Error::EmptyIndex));
    assert!(completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn completion_failure_is_upstream_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(service_at(tmp.path(), 500, 50));
    service.ingest("sky", "a.txt").unwrap();
    let asker = Asker::new(service, Arc::new(DownCompletion), 5);
    assert!(matches!(asker.ask("sky?").await, Err(Error::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn unreachable_ollama_is_upstream_unavailable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let settings = LlmSettings { base_url: format!("http://127.0.0.1:{port}"), timeout_secs: 5, ..LlmSettings::default() };
    let client = OllamaClient::new(&settings).unwrap();
    assert!(matches!(client.complete("hi").await, Err(Error::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn concurrent_questions_share_the_index() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(service_at(tmp.path(), 500, 50));
    service.ingest("The sea is blue.", "sea.txt").unwrap();
    let completion = Arc::new(RecordingCompletion::default());
    let asker = Arc::new(Asker::new(service, completion.clone(), 2));

    let questions = ["sea?", "blue?", "storm?"];
    let answers = futures::future::join_all(questions.iter().map(|q| {
        let asker = Arc::clone(&asker);
        async move { asker.ask(q).await }
    }))
    .await;
    assert!(answers.iter().all(|a| a.as_ref().map(|a| a.sources == vec!["sea.txt"]).unwrap_or(false)));
    assert_eq!(completion.prompts.lock().unwrap().len(), questions.len());
}
