//! Dense + sparse retrieval merged by document id, with a per-process cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::bm25::Bm25Index;
use super::casebase::CaseBase;
use super::corpus::{Corpus, CorpusDoc};
use super::dense::DenseIndex;
use super::embedder::Embedder;
use super::{excerpt, CaseHit, EvidenceRetriever, Passage, RetrievalError, RetrievalResult, EXCERPT_CHARS};

/// Result-count knobs for one hybrid query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchParams {
    pub k_dense: usize,
    pub k_sparse: usize,
    pub k_final: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k_dense: 10,
            k_sparse: 10,
            k_final: 12,
        }
    }
}

type CacheKey = (String, SearchParams);

pub struct HybridRetriever {
    corpus: Corpus,
    rows_by_id: HashMap<String, usize>,
    bm25: Bm25Index,
    dense: Option<DenseIndex>,
    cases: CaseBase,
    embedder: Arc<dyn Embedder>,
    // Grows for the lifetime of the retriever; never evicted.
    cache: RwLock<HashMap<CacheKey, Vec<Passage>>>,
}

impl HybridRetriever {
    pub fn new(
        corpus: Corpus,
        dense: Option<DenseIndex>,
        cases: CaseBase,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let bm25 = Bm25Index::build(&corpus.texts());
        let rows_by_id = corpus
            .docs()
            .iter()
            .enumerate()
            .map(|(row, d)| (d.doc_id.clone(), row))
            .collect();
        Self {
            corpus,
            rows_by_id,
            bm25,
            dense,
            cases,
            embedder,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load corpus, dense index and case base from disk. A missing or invalid
    /// dense index leaves the retriever without dense search.
    pub fn open(
        corpus_path: &Path,
        index_path: &Path,
        cases_path: &Path,
        embedder: Arc<dyn Embedder>,
    ) -> RetrievalResult<Self> {
        let corpus = Corpus::load(corpus_path)?;
        let dense = match DenseIndex::load(index_path) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(path = %index_path.display(), error = %e, "Dense index unavailable");
                None
            }
        };
        let cases = CaseBase::load(cases_path)?;
        debug!(
            docs = corpus.len(),
            dense = dense.is_some(),
            cases = cases.len(),
            "Hybrid retriever opened"
        );
        Ok(Self::new(corpus, dense, cases, embedder))
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    fn passage(doc: &CorpusDoc, score: f64) -> Passage {
        Passage {
            doc_id: doc.doc_id.clone(),
            title: doc.title.clone(),
            year: doc.year,
            tags: doc.tags.clone(),
            score,
            text: excerpt(&doc.text, EXCERPT_CHARS),
        }
    }

    /// Embedding-similarity search. Errors when no dense index is loaded or
    /// the embedding call fails.
    pub async fn dense_search(&self, query: &str, k: usize) -> RetrievalResult<Vec<Passage>> {
        let index = self.dense.as_ref().ok_or(RetrievalError::IndexMissing)?;
        if self.corpus.is_empty() || index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("no vector returned for query".into()))?;

        Ok(index
            .search(&query_vec, k)?
            .into_iter()
            .filter_map(|(doc_id, score)| {
                let row = *self.rows_by_id.get(doc_id)?;
                Some(Self::passage(self.corpus.get(row)?, score))
            })
            .collect())
    }

    /// BM25 search; only strictly positive scores.
    pub fn sparse_search(&self, query: &str, k: usize) -> Vec<Passage> {
        self.bm25
            .search(query, k)
            .into_iter()
            .filter_map(|(row, score)| Some(Self::passage(self.corpus.get(row)?, score)))
            .collect()
    }

    /// Union of dense and sparse hits, higher score kept per document, best
    /// first (ties by doc id), cut to `k_final`.
    pub async fn hybrid_search(&self, query: &str, params: SearchParams) -> RetrievalResult<Vec<Passage>> {
        let key = (query.to_string(), params);
        if let Some(hit) = self.cache.read().await.get(&key) {
            debug!(query, "Hybrid search cache hit");
            return Ok(hit.clone());
        }

        let dense = self.dense_search(query, params.k_dense).await?;
        let sparse = self.sparse_search(query, params.k_sparse);
        let merged = merge_by_doc_id(dense, sparse, params.k_final);
        debug!(query, results = merged.len(), "Hybrid search computed");

        self.cache.write().await.insert(key, merged.clone());
        Ok(merged)
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn prior_case_search(&self, symptoms: &[String], k: usize) -> RetrievalResult<Vec<CaseHit>> {
        self.cases.search(self.embedder.as_ref(), symptoms, k).await
    }
}

fn merge_by_doc_id(dense: Vec<Passage>, sparse: Vec<Passage>, k_final: usize) -> Vec<Passage> {
    let mut best: HashMap<String, Passage> = HashMap::new();
    for p in dense.into_iter().chain(sparse) {
        match best.get(&p.doc_id) {
            Some(existing) if existing.score >= p.score => {}
            _ => {
                best.insert(p.doc_id.clone(), p);
            }
        }
    }
    let mut merged: Vec<Passage> = best.into_values().collect();
    merged.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
    merged.truncate(k_final);
    merged
}

#[async_trait]
impl EvidenceRetriever for HybridRetriever {
    async fn hybrid_search(&self, query: &str, params: SearchParams) -> RetrievalResult<Vec<Passage>> {
        HybridRetriever::hybrid_search(self, query, params).await
    }

    async fn prior_case_search(&self, symptoms: &[String], k: usize) -> RetrievalResult<Vec<CaseHit>> {
        HybridRetriever::prior_case_search(self, symptoms, k).await
    }
}
