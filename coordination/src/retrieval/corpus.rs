//! Literature corpus loaded from JSONL.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::{RetrievalError, RetrievalResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusDoc {
    pub doc_id: String,
    pub text: String,
    pub title: String,
    pub year: Option<i32>,
    pub tags: Vec<String>,
}

/// Ordered, de-duplicated documents. Position in `docs` is the row id shared
/// by the sparse and dense indices.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    docs: Vec<CorpusDoc>,
}

impl Corpus {
    pub fn from_docs(docs: Vec<CorpusDoc>) -> Self {
        let mut seen = HashSet::new();
        let docs = docs
            .into_iter()
            .filter(|d| seen.insert(d.doc_id.clone()))
            .collect();
        Self { docs }
    }

    /// Load a single `.jsonl` file, or every `*.jsonl` in a directory sorted
    /// by file name. A missing path yields an empty corpus.
    pub fn load(path: &Path) -> RetrievalResult<Self> {
        let files = if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|source| RetrievalError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let mut files: Vec<_> = entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
                .collect();
            files.sort();
            files
        } else if path.exists() {
            vec![path.to_path_buf()]
        } else {
            warn!(path = %path.display(), "Literature corpus not found");
            Vec::new()
        };

        let mut seen = HashSet::new();
        let mut docs = Vec::new();
        for file in files {
            let raw = match std::fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Skipping unreadable corpus file");
                    continue;
                }
            };
            let mut skipped = 0usize;
            for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match parse_record(line) {
                    Some(doc) if seen.insert(doc.doc_id.clone()) => docs.push(doc),
                    Some(_) => {}
                    None => skipped += 1,
                }
            }
            debug!(path = %file.display(), skipped, "Loaded corpus file");
        }
        Ok(Self { docs })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&CorpusDoc> {
        self.docs.get(row)
    }

    pub fn docs(&self) -> &[CorpusDoc] {
        &self.docs
    }

    pub fn texts(&self) -> Vec<String> {
        self.docs.iter().map(|d| d.text.clone()).collect()
    }
}

fn parse_record(line: &str) -> Option<CorpusDoc> {
    let rec: Value = serde_json::from_str(line).ok()?;
    let text = rec.get("text")?.as_str()?.to_string();
    let doc_id = match rec.get("doc_id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(CorpusDoc {
        doc_id,
        text,
        title: rec
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        year: rec
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|y| i32::try_from(y).ok()),
        tags: rec
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}
