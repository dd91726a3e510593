//! Flat inner-product index over L2-normalised document vectors.
//!
//! Persisted as JSON: `{"dim": n, "doc_ids": [...], "vectors": [[...], ...]}`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::corpus::Corpus;
use super::embedder::{normalize, Embedder};
use super::{RetrievalError, RetrievalResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseIndex {
    dim: usize,
    doc_ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    /// Normalise and validate raw vectors. All vectors must share one dimension.
    pub fn from_vectors(doc_ids: Vec<String>, mut vectors: Vec<Vec<f32>>) -> RetrievalResult<Self> {
        if doc_ids.len() != vectors.len() {
            return Err(RetrievalError::Embedding(format!(
                "{} documents but {} vectors",
                doc_ids.len(),
                vectors.len()
            )));
        }
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        for v in &mut vectors {
            if v.len() != dim {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dim,
                    actual: v.len(),
                });
            }
            normalize(v);
        }
        Ok(Self {
            dim,
            doc_ids,
            vectors,
        })
    }

    /// Embed every corpus document.
    pub async fn build(corpus: &Corpus, embedder: &dyn Embedder) -> RetrievalResult<Self> {
        if corpus.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }
        let vectors = embedder.embed(&corpus.texts()).await?;
        let doc_ids = corpus.docs().iter().map(|d| d.doc_id.clone()).collect();
        let index = Self::from_vectors(doc_ids, vectors)?;
        info!(docs = index.len(), dim = index.dim, "Built dense index");
        Ok(index)
    }

    pub fn load(path: &Path) -> RetrievalResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| RetrievalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index: Self = serde_json::from_str(&raw).map_err(|e| RetrievalError::InvalidIndex {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if index.doc_ids.len() != index.vectors.len()
            || index.vectors.iter().any(|v| v.len() != index.dim)
        {
            return Err(RetrievalError::InvalidIndex {
                path: path.to_path_buf(),
                reason: "vector count or dimension does not match header".into(),
            });
        }
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> RetrievalResult<()> {
        let io_err = |source| RetrievalError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = serde_json::to_string(self).map_err(|e| RetrievalError::InvalidIndex {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(io_err)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Top `k` `(doc_id, score)` by inner product with the normalised query.
    pub fn search(&self, query: &[f32], k: usize) -> RetrievalResult<Vec<(&str, f64)>> {
        if query.len() != self.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        let mut q = query.to_vec();
        normalize(&mut q);

        let mut ranked: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, v)| {
                let dot: f32 = v.iter().zip(&q).map(|(a, b)| a * b).sum();
                (row, f64::from(dot))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        Ok(ranked
            .into_iter()
            .map(|(row, score)| (self.doc_ids[row].as_str(), score))
            .collect())
    }
}
