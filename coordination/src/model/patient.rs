//! Normalised patient context shared read-only by every specialist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Administrative sex as carried on the intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<Sex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub hr: Option<u32>,
    #[serde(default)]
    pub bp_sys: Option<u32>,
    #[serde(default)]
    pub bp_dia: Option<u32>,
    #[serde(default)]
    pub spo2: Option<u32>,
}

/// Patient context after the external normaliser has mapped free text to a
/// canonical symptom list.
///
/// One instance is built per request and wrapped in an `Arc`; nothing in the
/// pipeline mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub patient_id: String,
    #[serde(default)]
    pub demographics: Demographics,
    #[serde(default)]
    pub vitals: Vitals,
    /// Canonical symptom names, de-duplicated, in intake order.
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Canonical symptom → terminology code (e.g. `SNOMED:386661006`).
    #[serde(default)]
    pub codes: BTreeMap<String, String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub labs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub exposures: Vec<String>,
    #[serde(default)]
    pub travel: Vec<String>,
}

impl PatientContext {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ..Self::default()
        }
    }

    pub fn with_symptoms<I, S>(mut self, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symptoms = symptoms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exposure(mut self, exposure: impl Into<String>) -> Self {
        self.exposures.push(exposure.into());
        self
    }

    pub fn with_lab(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.labs.insert(name.into(), value);
        self
    }

    /// Exposures, falling back to travel history when no exposure is recorded.
    pub fn exposures_or_travel(&self) -> &[String] {
        if self.exposures.is_empty() {
            &self.travel
        } else {
            &self.exposures
        }
    }
}
