use std::sync::Arc;

use minilm_embeddings::mock::{OneHotEngine, VocabTokenizer};
use minilm_embeddings::similarity::l2_norm;
use minilm_embeddings::{
    BertEncoder, CachedEmbedder, Embedder, EmbeddingStore, PoolingMode, TextSegment,
};
use pretty_assertions::assert_eq;

fn embedder() -> (Arc<CachedEmbedder<BertEncoder>>, Arc<OneHotEngine>) {
    let engine = Arc::new(OneHotEngine::new(64));
    let encoder = BertEncoder::new(
        Arc::new(VocabTokenizer::new()),
        engine.clone(),
        PoolingMode::Mean,
    );
    (Arc::new(CachedEmbedder::new(encoder)), engine)
}

fn capitals() -> (EmbeddingStore<TextSegment>, Arc<CachedEmbedder<BertEncoder>>) {
    let (embedder, _engine) = embedder();
    let store = EmbeddingStore::new(embedder.clone());
    store
        .add_items(
            [
                "Paris is the capital of France",
                "Berlin is the capital of Germany",
                "Bananas are rich in potassium",
            ]
            .map(TextSegment::from),
        )
        .unwrap();
    (store, embedder)
}

#[test]
fn finds_the_most_relevant_sentence() {
    init_tracing();
    let (store, embedder) = capitals();
    let query = embedder.embed("What is the capital of France?").unwrap();

    let results = store.find_relevant(&query, 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].item.as_ref(),
        &TextSegment::new("Paris is the capital of France")
    );
    assert_eq!(
        results[1].item.as_ref(),
        &TextSegment::new("Berlin is the capital of Germany")
    );
    assert!(results[0].score > results[1].score);
}

#[test]
fn text_query_matches_vector_query() {
    let (store, embedder) = capitals();
    let query = embedder.embed("bananas").unwrap();

    let by_vector = store.find_relevant(&query, 1).unwrap();
    let by_text = store.find_relevant_to_text("bananas", 1).unwrap();
    assert_eq!(by_vector[0].item, by_text[0].item);
    assert_eq!(by_vector[0].score, by_text[0].score);
}

#[test]
fn result_count_is_capped_by_store_size() {
    let (store, embedder) = capitals();
    let query = embedder.embed("capital").unwrap();

    assert_eq!(store.find_relevant(&query, 10).unwrap().len(), 3);
    assert!(store.find_relevant(&query, 0).unwrap().is_empty());
}

#[test]
fn empty_store_returns_no_matches() {
    let (embedder, _engine) = embedder();
    let store: EmbeddingStore<TextSegment> = EmbeddingStore::new(embedder.clone());
    let query = embedder.embed("anything").unwrap();

    assert!(store.find_relevant(&query, 5).unwrap().is_empty());
    assert!(store.is_empty().unwrap());
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("minilm_embeddings=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn embeddings_are_unit_length_and_memoized() {
    init_tracing();
    let (embedder, engine) = embedder();
    let long_text = "word ".repeat(1200);

    let first = embedder.embed(&long_text).unwrap();
    let second = embedder.embed(long_text.trim()).unwrap();

    assert!((l2_norm(&first) - 1.0).abs() < 1e-5);
    assert_eq!(first, second);
    // 1200 content tokens split into partitions of at most 510.
    assert_eq!(engine.calls(), 3);
}
