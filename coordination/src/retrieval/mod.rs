//! Hybrid evidence retrieval: BM25 over the literature corpus, dense inner
//! product over a persisted vector index, and embedding similarity over the
//! prior-case base.
//!
//! ```text
//! query ─┬─> Bm25Index::search ───┐
//!        └─> Embedder ─> DenseIndex::search ─┴─> merge by doc_id ─> top k_final
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod bm25;
pub mod casebase;
pub mod corpus;
pub mod dense;
pub mod embedder;
pub mod hybrid;

pub use bm25::Bm25Index;
pub use casebase::{CaseBase, CaseRecord, MAX_CASES};
pub use corpus::{Corpus, CorpusDoc};
pub use dense::DenseIndex;
pub use embedder::{Embedder, OpenAiEmbedder};
pub use hybrid::{HybridRetriever, SearchParams};

pub use crate::text::{excerpt, truncate_chars};

/// Characters of document text carried on a returned passage.
pub const EXCERPT_CHARS: usize = 800;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid index file {path}: {reason}")]
    InvalidIndex { path: PathBuf, reason: String },

    #[error("dense index not built")]
    IndexMissing,

    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// One literature hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub doc_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub score: f64,
    pub text: String,
}

/// One prior-case hit; `doc_id` is `case:{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseHit {
    pub doc_id: String,
    pub text: String,
    pub score: f64,
}

/// What a specialist needs from the retrieval layer.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn hybrid_search(&self, query: &str, params: SearchParams) -> RetrievalResult<Vec<Passage>>;

    async fn prior_case_search(&self, symptoms: &[String], k: usize) -> RetrievalResult<Vec<CaseHit>>;
}
