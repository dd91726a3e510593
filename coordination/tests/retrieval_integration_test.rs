//! Retrieval integration: JSONL corpus + persisted dense index + case base,
//! driven through a deterministic keyword embedder.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ddx_coordination::retrieval::{
    Corpus, DenseIndex, Embedder, EvidenceRetriever, HybridRetriever, RetrievalError,
    RetrievalResult, SearchParams, EXCERPT_CHARS,
};
use tempfile::TempDir;

const VOCAB: [&str; 4] = ["dengue", "malaria", "lupus", "overdose"];

/// Bag-of-keywords embedder that counts how many texts it embedded.
#[derive(Default)]
struct KeywordEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .chain(std::iter::once(0.01))
                    .collect()
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        Err(RetrievalError::Embedding("service down".into()))
    }
}

fn write_corpus(dir: &Path) {
    let long_text = format!("dengue {}", "x".repeat(1000));
    let lines = [
        serde_json::json!({"doc_id": "who-dengue", "title": "Dengue guidelines", "year": 2009,
                           "text": "dengue fever with plasma leakage and dengue shock"}),
        serde_json::json!({"doc_id": "malaria-review", "title": "Malaria", "text": "malaria fever with rigors"}),
        serde_json::json!({"doc_id": "lupus-criteria", "text": "lupus criteria with malar rash"}),
        serde_json::json!({"doc_id": "long-dengue", "text": long_text}),
    ];
    let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
    std::fs::create_dir_all(dir.join("literature")).unwrap();
    std::fs::write(dir.join("literature").join("corpus.jsonl"), body).unwrap();
}

fn write_cases(path: &Path) {
    let cases = [
        serde_json::json!({"case_id": "a", "created_at": "2024-03-01T00:00:00Z",
                           "patient": {"patient_id": "p1", "symptoms": ["malaria-like rigors"]}}),
        serde_json::json!({"case_id": "b", "created_at": "2024-03-02T00:00:00Z",
                           "patient": {"patient_id": "p2", "symptoms": ["dengue rash"]}}),
    ];
    let body: String = cases.iter().map(|c| format!("{c}\n")).collect();
    std::fs::write(path, body).unwrap();
}

async fn retriever(dir: &TempDir, embedder: Arc<KeywordEmbedder>) -> HybridRetriever {
    write_corpus(dir.path());
    write_cases(&dir.path().join("cases.jsonl"));
    let corpus = Corpus::load(&dir.path().join("literature")).unwrap();
    let index = DenseIndex::build(&corpus, embedder.as_ref()).await.unwrap();
    index.save(&dir.path().join("index").join("dense.json")).unwrap();

    HybridRetriever::open(
        &dir.path().join("literature"),
        &dir.path().join("index").join("dense.json"),
        &dir.path().join("cases.jsonl"),
        embedder,
    )
    .unwrap()
}

#[tokio::test]
async fn hybrid_search_merges_and_truncates_text() {
    let dir = TempDir::new().unwrap();
    let r = retriever(&dir, Arc::new(KeywordEmbedder::default())).await;

    let hits = r.hybrid_search("dengue", SearchParams::default()).await.unwrap();
    assert!(!hits.is_empty());
    let ids: Vec<_> = hits.iter().map(|p| p.doc_id.as_str()).collect();
    assert!(ids.contains(&"who-dengue"));
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len(), "doc ids must be unique");

    let long = hits.iter().find(|p| p.doc_id == "long-dengue").unwrap();
    assert_eq!(long.text.chars().count(), EXCERPT_CHARS + 3);
    assert!(long.text.ends_with("..."));

    let who = hits.iter().find(|p| p.doc_id == "who-dengue").unwrap();
    assert_eq!(who.title, "Dengue guidelines");
    assert_eq!(who.year, Some(2009));
}

#[tokio::test]
async fn identical_queries_hit_the_cache() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(KeywordEmbedder::default());
    let r = retriever(&dir, Arc::clone(&embedder)).await;
    let params = SearchParams {
        k_dense: 3,
        k_sparse: 3,
        k_final: 2,
    };

    let first = r.hybrid_search("malaria fever", params).await.unwrap();
    let calls_after_first = embedder.calls.load(Ordering::SeqCst);
    let second = r.hybrid_search("malaria fever", params).await.unwrap();

    assert_eq!(first, second);
    assert!(first.len() <= 2);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
    assert_eq!(r.cache_len().await, 1);

    r.hybrid_search("malaria fever", SearchParams::default()).await.unwrap();
    assert_eq!(r.cache_len().await, 2);
}

#[tokio::test]
async fn sparse_search_returns_only_matches() {
    let dir = TempDir::new().unwrap();
    let r = retriever(&dir, Arc::new(KeywordEmbedder::default())).await;
    let hits = r.sparse_search("lupus", 10);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "lupus-criteria");
    assert!(r.sparse_search("pneumothorax", 10).is_empty());
}

#[tokio::test]
async fn prior_case_search_uses_case_prefix() {
    let dir = TempDir::new().unwrap();
    let r = retriever(&dir, Arc::new(KeywordEmbedder::default())).await;
    let hits = r.prior_case_search(&["dengue".into()], 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].doc_id, "case:b");
    assert!(hits.iter().all(|h| h.doc_id.starts_with("case:")));
}

#[tokio::test]
async fn missing_dense_index_is_an_error_and_not_cached() {
    let dir = TempDir::new().unwrap();
    write_corpus(dir.path());
    let r = HybridRetriever::open(
        &dir.path().join("literature"),
        &dir.path().join("absent.json"),
        &dir.path().join("cases.jsonl"),
        Arc::new(KeywordEmbedder::default()),
    )
    .unwrap();

    let err = r.hybrid_search("dengue", SearchParams::default()).await.unwrap_err();
    assert!(matches!(err, RetrievalError::IndexMissing));
    assert_eq!(r.cache_len().await, 0);
    assert!(!r.sparse_search("lupus", 10).is_empty());
}

#[tokio::test]
async fn embedding_failure_propagates_through_trait() {
    let dir = TempDir::new().unwrap();
    write_corpus(dir.path());
    let corpus = Corpus::load(&dir.path().join("literature")).unwrap();
    let index = DenseIndex::build(&corpus, &KeywordEmbedder::default()).await.unwrap();
    let r = HybridRetriever::new(
        corpus,
        Some(index),
        Default::default(),
        Arc::new(FailingEmbedder),
    );
    let retriever: &dyn EvidenceRetriever = &r;
    assert!(retriever
        .hybrid_search("dengue", SearchParams::default())
        .await
        .is_err());
    assert!(retriever.prior_case_search(&[], 5).await.unwrap().is_empty());
}
