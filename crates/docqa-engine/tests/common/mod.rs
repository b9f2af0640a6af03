#![allow(dead_code)]

use std::path::Path;

use docqa_core::chunker::Chunker;
use docqa_core::traits::Embedder;
use docqa_embed::CharTokenizer;
use docqa_engine::IndexService;
use docqa_vector::PersistenceManager;

pub const VOCAB: &[&str] = &["sky", "blue", "grass", "green", "sea", "storm"];

/// One axis per vocabulary word plus a small constant axis, so that every
/// text has a non-zero embedding and similarities are easy to predict.
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn dim(&self) -> usize { VOCAB.len() + 1 }

    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0f32; VOCAB.len() + 1];
                for word in t.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                    if let Some(i) = VOCAB.iter().position(|k| k.eq_ignore_ascii_case(word)) {
                        v[i] += 1.0;
                    }
                }
                v[VOCAB.len()] = 0.01;
                v
            })
            .collect())
    }
}

/// Same axes, one dimension wider.
pub struct WideEmbedder;

impl Embedder for WideEmbedder {
    fn dim(&self) -> usize { VOCAB.len() + 2 }

    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0; VOCAB.len() + 2]).collect())
    }
}

pub fn service_at(dir: &Path, max_tokens: usize, overlap: usize) -> IndexService {
    IndexService::init(
        PersistenceManager::new(dir),
        Box::new(KeywordEmbedder),
        Box::new(CharTokenizer),
        Chunker::new(max_tokens, overlap).expect("chunker"),
    )
    .expect("init")
}
