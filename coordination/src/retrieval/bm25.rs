//! Okapi BM25 over whitespace-tokenised documents.

use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Negative IDFs are replaced by `EPSILON * mean(idf)`.
const EPSILON: f64 = 0.25;

#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    doc_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Index {
    pub fn build<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut doc_freqs = Vec::with_capacity(texts.len());
        let mut doc_lens = Vec::with_capacity(texts.len());
        let mut containing: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for text in texts {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            let mut len = 0usize;
            for token in text.as_ref().split_whitespace() {
                *freqs.entry(token.to_string()).or_insert(0) += 1;
                len += 1;
            }
            for token in freqs.keys() {
                *containing.entry(token.clone()).or_insert(0) += 1;
            }
            total_len += len;
            doc_lens.push(len);
            doc_freqs.push(freqs);
        }

        let n = texts.len() as f64;
        let avgdl = if texts.is_empty() { 0.0 } else { total_len as f64 / n };

        let mut idf: HashMap<String, f64> = containing
            .into_iter()
            .map(|(token, df)| {
                let df = df as f64;
                (token, (n - df + 0.5).ln() - (df + 0.5).ln())
            })
            .collect();
        if !idf.is_empty() {
            let mean = idf.values().sum::<f64>() / idf.len() as f64;
            let floor = EPSILON * mean;
            for value in idf.values_mut() {
                if *value < 0.0 {
                    *value = floor;
                }
            }
        }

        Self {
            doc_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// Score of every document for `query`, indexed by row.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        self.doc_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &len)| {
                let norm = if self.avgdl > 0.0 {
                    K1 * (1.0 - B + B * len as f64 / self.avgdl)
                } else {
                    K1
                };
                tokens
                    .iter()
                    .map(|t| {
                        let tf = freqs.get(*t).copied().unwrap_or(0) as f64;
                        let idf = self.idf.get(*t).copied().unwrap_or(0.0);
                        idf * (tf * (K1 + 1.0)) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Top `k` `(row, score)` pairs with strictly positive score, best first.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}
