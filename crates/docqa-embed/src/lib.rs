//! Tokenizer and embedder adapters.
//!
//! `EmbeddingModel` runs an XLM-RoBERTa encoder (BGE-M3 weights) on candle and
//! mean-pools the last hidden state. `FakeEmbedder` + `CharTokenizer` are
//! deterministic stand-ins selected by `APP_USE_FAKE_EMBEDDINGS=1` or
//! `embed.use_fake = true`.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tracing::{debug, info, warn};

use docqa_core::config::{expand_path, EmbedSettings};
use docqa_core::traits::{Embedder, Tokenizer};

pub mod device;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use pool::masked_mean;
pub use tokenize::{CharTokenizer, HfTokenizer};

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: HfTokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading embedding model");
        let tokenizer = HfTokenizer::from_file(&model_dir.join("tokenizer.json"))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = hidden_size(&config_path)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dim, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    pub fn tokenizer(&self) -> &HfTokenizer { &self.tokenizer }
}

/// `hidden_size` is the output dimensionality of mean pooling.
fn hidden_size(config_path: &Path) -> Result<usize> {
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
    raw.get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) =
            tokenize::tokenize_batch_on_device(self.tokenizer.inner(), texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Constant added to the last component so that texts without words
/// (whitespace-only chunks, blank questions) still embed to a non-zero vector.
const FAKE_BIAS: f32 = 0.01;

/// Hashes whitespace tokens into buckets. Deterministic, model-free.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return v;
        }
        // Words hash into every bucket but the bias one, unless there is only one.
        let buckets = (self.dim - 1).max(1) as u64;
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % buckets) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + val + (i % 3) as f32 * 0.01;
        }
        v[self.dim - 1] += FAKE_BIAS;
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn use_fake(settings: &EmbedSettings) -> bool {
    let from_env = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    from_env || settings.use_fake
}

/// Embedder and chunking tokenizer from the same source, so that chunk
/// boundaries line up with what the model sees.
pub fn load_adapters(settings: &EmbedSettings) -> Result<(Box<dyn Embedder>, Box<dyn Tokenizer>)> {
    if use_fake(settings) {
        warn!(dim = settings.fake_dim, "using FakeEmbedder and CharTokenizer");
        return Ok((Box::new(FakeEmbedder::new(settings.fake_dim)), Box::new(CharTokenizer)));
    }
    let model_dir = resolve_model_dir(settings)?;
    let model = EmbeddingModel::load(&model_dir, settings.max_len)?;
    let tokenizer = model.tokenizer().clone();
    Ok((Box::new(model), Box::new(tokenizer)))
}

fn resolve_model_dir(settings: &EmbedSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.model_dir {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        warn!(path = %p.display(), "configured embed.model_dir does not exist");
    }
    if let Ok(dir) = std::env::var("MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { info!(path = %p.display(), "using MODEL_DIR"); return Ok(p); }
    }
    for candidate in ["models/bge-m3", "../models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() { info!(path = %p.display(), "using model dir"); return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate embedding model directory; set embed.model_dir or MODEL_DIR"))
}
