//! Knowledge-graph records as they arrive from the external store.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Disease,
    Symptom,
    Lab,
    Test,
}

impl EntityKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Disease" => Some(Self::Disease),
            "Symptom" => Some(Self::Symptom),
            "Lab" => Some(Self::Lab),
            "Test" => Some(Self::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub kind: EntityKind,
}

/// Relation label. Labels outside the known vocabulary are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasSymptom,
    AssociatedWithLabPattern,
    SuggestsTest,
    DifferentialWith,
    Other(String),
}

impl RelationKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "has_symptom" => Self::HasSymptom,
            "associated_with_lab_pattern" => Self::AssociatedWithLabPattern,
            "suggests_test" => Self::SuggestsTest,
            "differential_with" => Self::DifferentialWith,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::HasSymptom => "has_symptom",
            Self::AssociatedWithLabPattern => "associated_with_lab_pattern",
            Self::SuggestsTest => "suggests_test",
            Self::DifferentialWith => "differential_with",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RelationKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RelationKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A directed, typed, weighted relation between two entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub src: i64,
    pub rel: RelationKind,
    pub dst: i64,
    #[serde(default)]
    pub source_doc: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Sensitivity/specificity/cost/risk for one diagnostic test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPrior {
    pub name: String,
    pub sensitivity: f64,
    pub specificity: f64,
    #[serde(default = "default_weight")]
    pub cost: f64,
    #[serde(default = "default_weight")]
    pub risk: f64,
}

impl TestPrior {
    /// Sensitivity and specificity are finite probabilities.
    pub fn is_usable(&self) -> bool {
        let valid = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        valid(self.sensitivity) && valid(self.specificity)
    }
}

/// Everything the store hands over in one read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub test_priors: Vec<TestPrior>,
}

impl GraphSnapshot {
    /// Add an entity unless one with the same `(name, kind)` exists; returns its id.
    pub fn upsert_entity(&mut self, name: &str, kind: EntityKind) -> i64 {
        if let Some(existing) = self
            .entities
            .iter()
            .find(|e| e.name == name && e.kind == kind)
        {
            return existing.id;
        }
        let id = self.entities.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        self.entities.push(Entity {
            id,
            name: name.to_string(),
            kind,
        });
        id
    }

    pub fn relate(&mut self, src: i64, rel: RelationKind, dst: i64) {
        self.relations.push(Relation {
            src,
            rel,
            dst,
            source_doc: None,
            weight: 1.0,
        });
    }
}
