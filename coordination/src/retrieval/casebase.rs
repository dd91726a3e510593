//! Prior-case similarity search over stored patient contexts.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::PatientContext;

use super::embedder::{cosine, Embedder};
use super::{CaseHit, RetrievalError, RetrievalResult};

/// Most recent cases considered per search.
pub const MAX_CASES: usize = 500;

/// Query text when the patient has no normalised symptoms.
const DEFAULT_CASE_QUERY: &str = "fever";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: String,
    pub created_at: DateTime<Utc>,
    pub patient: PatientContext,
}

impl CaseRecord {
    /// Fixed four-line template embedded for similarity.
    pub fn summary(&self) -> String {
        let p = &self.patient;
        let render = |v: serde_json::Result<String>| v.unwrap_or_else(|_| "{}".to_string());
        format!(
            "Demographics: {}\nVitals: {}\nSymptoms: {}\nLabs: {}",
            render(serde_json::to_string(&p.demographics)),
            render(serde_json::to_string(&p.vitals)),
            render(serde_json::to_string(&p.symptoms)),
            render(serde_json::to_string(&p.labs)),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseBase {
    cases: Vec<CaseRecord>,
}

impl CaseBase {
    /// Keeps the [`MAX_CASES`] most recent records, newest first.
    pub fn from_records(mut cases: Vec<CaseRecord>) -> Self {
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        cases.truncate(MAX_CASES);
        Self { cases }
    }

    /// Load a JSONL file of [`CaseRecord`]s. A missing file is an empty base;
    /// malformed lines are skipped.
    pub fn load(path: &Path) -> RetrievalResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No case base on disk");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| RetrievalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut skipped = 0usize;
        let records: Vec<CaseRecord> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(rec) => Some(rec),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            warn!(path = %path.display(), skipped, "Skipped malformed case records");
        }
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Top `k` cases by cosine similarity between the case summary and the
    /// symptom query.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        symptoms: &[String],
        k: usize,
    ) -> RetrievalResult<Vec<CaseHit>> {
        if self.cases.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let summaries: Vec<String> = self.cases.iter().map(CaseRecord::summary).collect();
        let case_vecs = embedder.embed(&summaries).await?;
        let query = if symptoms.is_empty() {
            DEFAULT_CASE_QUERY.to_string()
        } else {
            symptoms.join(", ")
        };
        let query_vec = embedder
            .embed(std::slice::from_ref(&query))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("no vector returned for query".into()))?;

        let mut hits: Vec<CaseHit> = self
            .cases
            .iter()
            .zip(summaries)
            .zip(&case_vecs)
            .map(|((case, text), vec)| CaseHit {
                doc_id: format!("case:{}", case.case_id),
                text,
                score: cosine(&query_vec, vec),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}
