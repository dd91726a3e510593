//! Fused, per-request output types.

use serde::{Deserialize, Serialize};

use super::candidate::Citation;

/// Name returned by the next-best-test selector when it has nothing to offer.
pub const CLINICAL_REEVALUATION: &str = "Clinical re-evaluation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedDifferentialItem {
    /// Display name with the casing of the first contributor seen.
    pub diagnosis: String,
    pub score_global: f64,
    pub why_top: String,
    pub citations: Vec<Citation>,
    pub graph_paths: Vec<Vec<String>>,
}

/// A `(src, rel, dst)` triple explaining why a test was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub src: String,
    pub rel: String,
    pub dst: String,
}

impl GraphEdge {
    pub fn new(src: impl Into<String>, rel: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            rel: rel.into(),
            dst: dst.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextBestTest {
    pub name: String,
    pub why: String,
    pub linked_hypotheses: Vec<String>,
    pub graph_edges: Vec<GraphEdge>,
}

impl NextBestTest {
    /// Terminal state of the selector: no test could be suggested.
    pub fn reevaluation(why: impl Into<String>) -> Self {
        Self {
            name: CLINICAL_REEVALUATION.to_string(),
            why: why.into(),
            linked_hypotheses: Vec::new(),
            graph_edges: Vec::new(),
        }
    }

    pub fn is_reevaluation(&self) -> bool {
        self.name == CLINICAL_REEVALUATION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlanItem {
    pub diagnosis: String,
    pub plan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedOutput {
    pub differential: Vec<FusedDifferentialItem>,
    pub next_best_test: NextBestTest,
    pub disagreement_score: f64,
    pub test_plans: Vec<TestPlanItem>,
}

impl FusedOutput {
    /// `true` when no specialist contributed a usable candidate.
    pub fn is_insufficient_evidence(&self) -> bool {
        self.differential.is_empty()
    }
}
