//! Post-fusion recommendations: one oracle call that turns the fused
//! differential into a short list of next steps.

use std::time::Duration;

use ddx_coordination::model::{FusedOutput, PatientContext};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::oracle::{OracleError, OracleRequest, ReasoningOracle};
use crate::prompts::{build_recommendations_prompt, summarize_fused, RECOMMENDATIONS_PERSONA};
use crate::specialist::{extract_json_block, SpecialistSettings};

pub const MAX_RECOMMENDATIONS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Anything unrecognised is `Medium`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub rationale: String,
    pub priority: Priority,
}

#[derive(Deserialize)]
struct RawRecommendations {
    #[serde(default)]
    recommendations: Vec<RawRecommendation>,
}

#[derive(Deserialize)]
struct RawRecommendation {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    priority: String,
}

pub fn parse_recommendations(raw: &str) -> Option<Vec<Recommendation>> {
    let block = extract_json_block(raw)?;
    let parsed: RawRecommendations = serde_json::from_str(block).ok()?;
    let items: Vec<Recommendation> = parsed
        .recommendations
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|r| Recommendation {
            title: r
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Recommendation".to_string()),
            rationale: r.rationale,
            priority: Priority::parse_lenient(&r.priority),
        })
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Single high-priority item derived from the next-best-test.
pub fn fallback_recommendations(fused: &FusedOutput) -> Vec<Recommendation> {
    vec![Recommendation {
        title: fused.next_best_test.name.clone(),
        rationale: fused.next_best_test.why.clone(),
        priority: Priority::High,
    }]
}

/// Ask the oracle for recommendations; any failure falls back to
/// [`fallback_recommendations`].
pub async fn generate_recommendations(
    oracle: &dyn ReasoningOracle,
    settings: &SpecialistSettings,
    patient: &PatientContext,
    fused: &FusedOutput,
) -> Vec<Recommendation> {
    let request = OracleRequest {
        system: RECOMMENDATIONS_PERSONA.to_string(),
        user: build_recommendations_prompt(patient, &summarize_fused(fused)),
        model: settings.model.clone(),
        temperature: settings.temperature,
        json_mode: true,
    };

    let raw = match call_with_timeout(oracle, &request, settings.timeout).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Recommendations call failed, using next-best-test");
            return fallback_recommendations(fused);
        }
    };

    match parse_recommendations(&raw) {
        Some(items) => {
            info!(count = items.len(), "Recommendations generated");
            items
        }
        None => {
            warn!("Recommendations output unusable, using next-best-test");
            fallback_recommendations(fused)
        }
    }
}

async fn call_with_timeout(
    oracle: &dyn ReasoningOracle,
    request: &OracleRequest,
    timeout: Duration,
) -> Result<String, OracleError> {
    tokio::time::timeout(timeout, oracle.complete(request))
        .await
        .map_err(|_| OracleError::Timeout(timeout))?
}
