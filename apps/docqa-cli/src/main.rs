use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use docqa_core::config::{Config, Settings};
use docqa_core::extract::PlainTextExtractor;
use docqa_core::Error;
use docqa_engine::ollama::answer_text;
use docqa_engine::{Answer, Asker, IndexService, IngestOutcome, OllamaClient};

const NO_DOCUMENTS: &str = "No documents uploaded yet";
const NO_DOCUMENTS_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about your documents")]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, env = "DOCQA_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index files (directories are walked recursively)
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the chunks most similar to a question
    Search {
        question: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer questions from the indexed documents
    Ask {
        #[arg(required = true)]
        questions: Vec<String>,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print index location and size
    Status,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();
    let env_name = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = Config::load_from(&cli.config_dir, &env_name)?;
    let settings = config.settings()?;
    let index_dir = config.index_dir()?;

    let service = {
        let settings = settings.clone();
        let index_dir = index_dir.clone();
        tokio::task::spawn_blocking(move || IndexService::from_settings(&settings, &index_dir)).await??
    };
    let service = Arc::new(service);

    let outcome = match cli.command {
        Command::Ingest { paths } => {
            let service = Arc::clone(&service);
            tokio::task::spawn_blocking(move || ingest(&service, &paths)).await?
        }
        Command::Search { question, k } => {
            let service = Arc::clone(&service);
            let k = k.unwrap_or(settings.retrieval.top_k);
            tokio::task::spawn_blocking(move || search(&service, &question, k)).await?
        }
        Command::Ask { questions, k } => ask(&service, &settings, questions, k).await,
        Command::Status => {
            let out = json!({
                "index_dir": index_dir.display().to_string(),
                "rows": service.row_count()?,
                "dim": service.dim()?,
                "max_tokens": service.chunker().max_tokens(),
                "overlap": service.chunker().overlap(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
    };

    if let Ok(service) = Arc::try_unwrap(service) {
        service.shutdown()?;
    }
    exit_code(outcome).map(ExitCode::from)
}

/// An empty index is a user-facing condition, not a failure of the tool.
fn exit_code(outcome: anyhow::Result<()>) -> anyhow::Result<u8> {
    match outcome {
        Ok(()) => Ok(0),
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::EmptyIndex)) => {
            eprintln!("{}", json!({ "error": NO_DOCUMENTS }));
            Ok(NO_DOCUMENTS_EXIT)
        }
        Err(e) => Err(e),
    }
}

fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

fn ingest(service: &IndexService, paths: &[PathBuf]) -> anyhow::Result<()> {
    let files = collect_files(paths);
    let extractor = PlainTextExtractor::new();
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let mut indexed_chunks = 0usize;
    let mut skipped = Vec::new();
    for file in &files {
        let name = source_name(file);
        pb.set_message(name.clone());
        let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        match service.ingest_document(&bytes, &name, &extractor)? {
            IngestOutcome::Indexed(n) => indexed_chunks += n,
            IngestOutcome::Skipped => skipped.push(name),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    let out = json!({ "indexed_chunks": indexed_chunks, "skipped": skipped });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn search(service: &IndexService, question: &str, k: usize) -> anyhow::Result<()> {
    let retrieval = service.retrieve(question, k)?;
    let hits: Vec<_> = retrieval
        .hits
        .iter()
        .map(|h| json!({ "score": h.score, "source": h.chunk.source, "text": h.chunk.text }))
        .collect();
    let out = json!({ "hits": hits, "sources": retrieval.sources });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn ask(service: &Arc<IndexService>, settings: &Settings, questions: Vec<String>, k: Option<usize>) -> anyhow::Result<()> {
    let completion = Arc::new(OllamaClient::new(&settings.llm)?);
    let asker = Asker::new(Arc::clone(service), completion, k.unwrap_or(settings.retrieval.top_k));
    let results = futures::future::join_all(questions.iter().map(|q| asker.ask(q))).await;
    let outputs = render_answers(&questions, results)?;
    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}

/// One JSON entry per question. Per-question failures are reported inline;
/// `EmptyIndex` is returned only when no question could be answered at all.
fn render_answers(
    questions: &[String],
    results: Vec<docqa_core::Result<Answer>>,
) -> anyhow::Result<Vec<serde_json::Value>> {
    if !results.is_empty() && results.iter().all(|r| matches!(r, Err(Error::EmptyIndex))) {
        return Err(Error::EmptyIndex.into());
    }
    let mut outputs = Vec::with_capacity(results.len());
    for (question, result) in questions.iter().zip(results) {
        match result {
            Ok(answer) => outputs.push(json!({
                "question": question,
                "answer": answer_text(&answer.reply),
                "sources": answer.sources,
                "reply": answer.reply,
            })),
            Err(Error::EmptyIndex) => outputs.push(json!({ "question": question, "error": NO_DOCUMENTS })),
            Err(e @ Error::UpstreamUnavailable(_)) => {
                warn!(question = %question, error = %e, "completion failed");
                outputs.push(json!({ "question": question, "error": e.to_string() }));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(qs: &[&str]) -> Vec<String> { qs.iter().map(|q| q.to_string()).collect() }

    #[test]
    fn empty_index_maps_to_its_exit_code() {
        assert_eq!(exit_code(Ok(())).unwrap(), 0);
        assert_eq!(exit_code(Err(Error::EmptyIndex.into())).unwrap(), NO_DOCUMENTS_EXIT);
        assert!(exit_code(Err(anyhow::anyhow!("disk full"))).is_err());
        assert!(exit_code(Err(Error::NotFound("x".into()).into())).is_err());
    }

    #[test]
    fn answers_are_kept_when_another_question_fails() {
        let reply = json!({ "response": "{\"answer\": \"blue\"}", "done": true });
        let answer = Answer { reply, sources: vec!["notes.txt".into()] };
        let outputs = render_answers(
            &questions(&["sky?", "grass?"]),
            vec![Ok(answer), Err(Error::UpstreamUnavailable("connection refused".into()))],
        )
        .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0]["answer"], "blue");
        assert_eq!(outputs[0]["sources"], json!(["notes.txt"]));
        assert!(outputs[1]["error"].as_str().unwrap().contains("connection refused"));
    }

    #[test]
    fn all_empty_index_results_become_one_error() {
        let err = render_answers(&questions(&["a", "b"]), vec![Err(Error::EmptyIndex), Err(Error::EmptyIndex)])
            .unwrap_err();
        assert_eq!(exit_code(Err(err)).unwrap(), NO_DOCUMENTS_EXIT);
    }
}
