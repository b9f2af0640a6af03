use docqa_core::config::EmbedSettings;
use docqa_core::traits::{Embedder, Tokenizer};
use docqa_embed::{load_adapters, CharTokenizer, FakeEmbedder};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(64);
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "other words".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs.len(), 3);
    assert!(embs.iter().all(|v| v.len() == 64), "embedding dim is 64");
    assert_eq!(embs[0], embs[1], "deterministic for same input");
    assert_ne!(embs[0], embs[2]);
    assert!(embs[0].iter().any(|x| *x > 0.0));
}

#[test]
fn fake_embedder_is_case_insensitive() {
    let embedder = FakeEmbedder::new(32);
    let embs = embedder.embed_batch(&["Blue Sky".to_string(), "blue sky".to_string()]).unwrap();
    assert_eq!(embs[0], embs[1]);
}

#[test]
fn char_tokenizer_round_trips() {
    let tok = CharTokenizer;
    let text = "naïve café 東京";
    let ids = tok.encode(text).unwrap();
    assert_eq!(ids.len(), text.chars().count());
    assert_eq!(tok.decode(&ids).unwrap(), text);
    assert!(tok.decode(&[0xD800]).is_err(), "surrogates are not chars");
}

#[test]
fn fake_adapters_from_settings() {
    let settings = EmbedSettings { use_fake: true, fake_dim: 16, ..EmbedSettings::default() };
    let (embedder, tokenizer) = load_adapters(&settings).expect("adapters");
    assert_eq!(embedder.dim(), 16);
    assert_eq!(tokenizer.encode("abc").unwrap(), vec![97, 98, 99]);
}

#[test]
fn fake_embedder_never_returns_zero_vectors() {
    let embedder = FakeEmbedder::new(16);
    let texts = vec![String::new(), "   \n\t ".to_string(), "words".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    for (text, v) in texts.iter().zip(&embs) {
        assert!(v.iter().any(|x| *x != 0.0), "zero embedding for {text:?}");
    }
    assert_eq!(embs[0], embs[1], "texts without words embed identically");
    assert_ne!(embs[1], embs[2]);
}

#[test]
fn fake_embedder_with_one_dimension_still_embeds() {
    let embedder = FakeEmbedder::new(1);
    let embs = embedder.embed_batch(&["".to_string(), "one two".to_string()]).expect("embed_batch");
    assert!(embs.iter().all(|v| v.len() == 1 && v[0] > 0.0));
}
