//! Specialist-produced candidates and the canonical merge key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Clinical domain a specialist is restricted to.
///
/// Declaration order is the dispatch order; fused output attribution relies on
/// it being stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistDomain {
    Infectious,
    Autoimmune,
    Cardiology,
    Neurology,
    Oncology,
    Toxicology,
}

impl SpecialistDomain {
    pub const ALL: [SpecialistDomain; 6] = [
        Self::Infectious,
        Self::Autoimmune,
        Self::Cardiology,
        Self::Neurology,
        Self::Oncology,
        Self::Toxicology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infectious => "infectious",
            Self::Autoimmune => "autoimmune",
            Self::Cardiology => "cardiology",
            Self::Neurology => "neurology",
            Self::Oncology => "oncology",
            Self::Toxicology => "toxicology",
        }
    }
}

impl fmt::Display for SpecialistDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative confidence reported by the oracle for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceQual {
    #[default]
    Low,
    Medium,
    High,
}

impl ConfidenceQual {
    /// Lenient parse: anything unrecognised is `Low`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Weight used by local scoring.
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.55,
            Self::Medium => 0.70,
            Self::High => 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub span: String,
}

impl Citation {
    pub fn new(doc_id: impl Into<String>, span: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            span: span.into(),
        }
    }
}

/// One diagnosis proposed by one specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub diagnosis: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub graph_paths: Vec<Vec<String>>,
    #[serde(default)]
    pub confidence_qual: ConfidenceQual,
    /// Always within `[0, 1]` when present.
    #[serde(default)]
    pub score_local: Option<f64>,
}

impl Candidate {
    pub fn new(diagnosis: impl Into<String>, confidence_qual: ConfidenceQual) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            rationale: String::new(),
            citations: Vec::new(),
            graph_paths: Vec::new(),
            confidence_qual,
            score_local: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }

    pub fn with_graph_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.graph_paths.push(path.into_iter().map(Into::into).collect());
        self
    }

    /// Set the local score; non-finite input is dropped, finite input clamped.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score_local = score.is_finite().then(|| clamp_unit(score));
        self
    }

    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::from_diagnosis(&self.diagnosis)
    }
}

/// Everything one specialist produced for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: SpecialistDomain,
    pub candidates: Vec<Candidate>,
}

impl AgentResult {
    pub fn new(agent: SpecialistDomain, candidates: Vec<Candidate>) -> Self {
        Self { agent, candidates }
    }

    pub fn empty(agent: SpecialistDomain) -> Self {
        Self::new(agent, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Merge identity of a diagnosis across specialists: trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn from_diagnosis(diagnosis: &str) -> Self {
        Self(diagnosis.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
