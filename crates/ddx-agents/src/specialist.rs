//! Domain-scoped specialist: gather evidence, ask the oracle, score the
//! returned candidates.
//!
//! There is one `Specialist` type. What makes it "infectious" or "oncology"
//! is the [`DomainDescriptor`] it is built with.

use std::sync::Arc;
use std::time::Duration;

use ddx_coordination::graph::KnowledgeGraph;
use ddx_coordination::model::{
    clamp_unit, round3, AgentResult, Candidate, Citation, ConfidenceQual, PatientContext,
    SpecialistDomain,
};
use ddx_coordination::retrieval::{EvidenceRetriever, SearchParams};
use ddx_coordination::text::truncate_chars;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DdxConfig;
use crate::domains::DomainDescriptor;
use crate::oracle::{OracleError, OracleRequest, ReasoningOracle};
use crate::prompts::{build_specialist_prompt, CaseContext, PromptEvidence, MAX_CANDIDATES};

/// Symptoms whose graph neighbourhood is shown.
const FACT_SYMPTOMS: usize = 5;
const FACTS_PER_SYMPTOM: usize = 5;
const FACTS_TOTAL: usize = 20;

/// Placeholder used when the oracle omits citations or graph paths.
pub const PLACEHOLDER: &str = "default";

#[derive(Debug, Error)]
pub enum SpecialistFailure {
    #[error("oracle call failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("unparseable oracle output: {0}")]
    Parse(String),

    #[error("oracle returned no candidates")]
    NoCandidates,

    #[error("specialist task did not report back: {0}")]
    Aborted(String),
}

/// What one specialist produced for one request.
///
/// A failure is kept distinct from an honest empty answer so that audit logs
/// can tell the two apart; fusion sees both as an empty [`AgentResult`].
#[derive(Debug)]
pub enum SpecialistOutcome {
    Produced(AgentResult),
    Failed {
        agent: SpecialistDomain,
        reason: SpecialistFailure,
    },
}

impl SpecialistOutcome {
    pub fn agent(&self) -> SpecialistDomain {
        match self {
            Self::Produced(result) => result.agent,
            Self::Failed { agent, .. } => *agent,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn into_agent_result(self) -> AgentResult {
        match self {
            Self::Produced(result) => result,
            Self::Failed { agent, .. } => AgentResult::empty(agent),
        }
    }
}

/// Knobs shared by every specialist in a request.
#[derive(Debug, Clone)]
pub struct SpecialistSettings {
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub search: SearchParams,
    pub snippets_shown: usize,
    pub cases_shown: usize,
    pub snippet_chars: usize,
}

impl Default for SpecialistSettings {
    fn default() -> Self {
        Self::from(&DdxConfig::default())
    }
}

impl From<&DdxConfig> for SpecialistSettings {
    fn from(config: &DdxConfig) -> Self {
        Self {
            model: config.oracle.model.clone(),
            temperature: config.oracle.temperature,
            timeout: config.oracle.timeout(),
            search: config.retrieval.search_params(),
            snippets_shown: config.retrieval.snippets_shown,
            cases_shown: config.retrieval.cases_shown,
            snippet_chars: config.retrieval.snippet_chars,
        }
    }
}

/// Read-only collaborators a specialist calls out to.
#[derive(Clone)]
pub struct SpecialistDeps {
    pub retriever: Arc<dyn EvidenceRetriever>,
    pub graph: Arc<KnowledgeGraph>,
    pub oracle: Arc<dyn ReasoningOracle>,
}

pub struct Specialist {
    descriptor: &'static DomainDescriptor,
    settings: SpecialistSettings,
}

impl Specialist {
    pub fn new(descriptor: &'static DomainDescriptor, settings: SpecialistSettings) -> Self {
        Self {
            descriptor,
            settings,
        }
    }

    pub fn domain(&self) -> SpecialistDomain {
        self.descriptor.domain
    }

    /// Run the full evidence → prompt → oracle → score sequence. Never fails;
    /// every error ends up in [`SpecialistOutcome::Failed`].
    pub async fn run(&self, patient: &PatientContext, deps: &SpecialistDeps) -> SpecialistOutcome {
        let agent = self.domain();
        let request = self.build_request(patient, deps).await;

        let raw = match tokio::time::timeout(self.settings.timeout, deps.oracle.complete(&request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.failed(SpecialistFailure::Oracle(e)),
            Err(_) => return self.failed(SpecialistFailure::Oracle(OracleError::Timeout(self.settings.timeout))),
        };

        match parse_candidates(&raw) {
            Ok(candidates) => {
                info!(agent = %agent, candidates = candidates.len(), "Specialist produced candidates");
                SpecialistOutcome::Produced(AgentResult::new(agent, candidates))
            }
            Err(reason) => self.failed(reason),
        }
    }

    fn failed(&self, reason: SpecialistFailure) -> SpecialistOutcome {
        warn!(agent = %self.domain(), error = %reason, "Specialist failed, contributing no candidates");
        SpecialistOutcome::Failed {
            agent: self.domain(),
            reason,
        }
    }

    /// Assemble the oracle request for `patient`. Retrieval failures shrink
    /// the evidence; they never abort the request.
    pub async fn build_request(&self, patient: &PatientContext, deps: &SpecialistDeps) -> OracleRequest {
        let literature = self.literature_snippets(patient, deps.retriever.as_ref()).await;
        let cases = self.case_snippets(patient, deps.retriever.as_ref()).await;
        let graph_facts = deps
            .graph
            .neighbourhood_facts(&patient.symptoms, FACT_SYMPTOMS, FACTS_PER_SYMPTOM, FACTS_TOTAL);

        let evidence = PromptEvidence {
            shown_docs: literature.len(),
            shown_cases: cases.len(),
            literature: literature.join("\n"),
            cases: cases.join("\n"),
            graph_facts: graph_facts.join("\n"),
        };
        debug!(
            agent = %self.domain(),
            docs = evidence.shown_docs,
            cases = evidence.shown_cases,
            facts = graph_facts.len(),
            "Specialist evidence gathered"
        );

        OracleRequest {
            system: self.descriptor.persona.to_string(),
            user: build_specialist_prompt(self.descriptor.label, &CaseContext::from_patient(patient), &evidence),
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            json_mode: true,
        }
    }

    fn query_for(&self, patient: &PatientContext) -> String {
        if patient.symptoms.is_empty() {
            self.descriptor.fallback_query.to_string()
        } else {
            patient.symptoms.join(", ")
        }
    }

    async fn literature_snippets(&self, patient: &PatientContext, retriever: &dyn EvidenceRetriever) -> Vec<String> {
        let query = self.query_for(patient);
        match retriever.hybrid_search(&query, self.settings.search).await {
            Ok(passages) => passages
                .iter()
                .take(self.settings.snippets_shown)
                .map(|p| format!("- {}: {}", p.doc_id, truncate_chars(&p.text, self.settings.snippet_chars)))
                .collect(),
            Err(e) => {
                warn!(agent = %self.domain(), error = %e, "Literature retrieval failed, continuing without snippets");
                Vec::new()
            }
        }
    }

    async fn case_snippets(&self, patient: &PatientContext, retriever: &dyn EvidenceRetriever) -> Vec<String> {
        match retriever.prior_case_search(&patient.symptoms, self.settings.cases_shown).await {
            Ok(hits) => hits
                .iter()
                .take(self.settings.cases_shown)
                .map(|h| format!("- {}: {}", h.doc_id, truncate_chars(&h.text, self.settings.snippet_chars)))
                .collect(),
            Err(e) => {
                warn!(agent = %self.domain(), error = %e, "Prior-case retrieval failed, continuing without cases");
                Vec::new()
            }
        }
    }
}

/// Local score for the candidate at `index` in the oracle's ranking.
pub fn local_score(confidence: ConfidenceQual, index: usize) -> f64 {
    let rank_weight = (1.0 - 0.1 * index as f64).max(0.4);
    round3(clamp_unit(0.5 * confidence.weight() + 0.5 * rank_weight))
}

#[derive(Deserialize)]
struct RawResponse {
    candidates: Vec<RawCandidate>,
}

#[derive(Deserialize)]
struct RawCandidate {
    #[serde(default)]
    diagnosis: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
    #[serde(default)]
    graph_paths: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    confidence_qual: String,
}

#[derive(Deserialize)]
struct RawCitation {
    #[serde(default)]
    doc_id: serde_json::Value,
    #[serde(default)]
    span: serde_json::Value,
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pull the JSON object out of an oracle reply, tolerating markdown fences
/// and surrounding prose.
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Parse and score an oracle reply. Only the first six items are read.
pub fn parse_candidates(raw: &str) -> Result<Vec<Candidate>, SpecialistFailure> {
    let block = extract_json_block(raw)
        .ok_or_else(|| SpecialistFailure::Parse("no JSON object in oracle output".into()))?;
    let response: RawResponse =
        serde_json::from_str(block).map_err(|e| SpecialistFailure::Parse(e.to_string()))?;

    let candidates: Vec<Candidate> = response
        .candidates
        .into_iter()
        .take(MAX_CANDIDATES)
        .enumerate()
        .filter(|(_, raw)| !raw.diagnosis.trim().is_empty())
        .map(|(index, raw)| {
            let confidence = ConfidenceQual::parse_lenient(&raw.confidence_qual);
            let mut candidate = Candidate::new(raw.diagnosis.trim(), confidence)
                .with_rationale(raw.rationale)
                .with_score(local_score(confidence, index));
            candidate.citations = raw
                .citations
                .iter()
                .map(|c| Citation::new(value_text(&c.doc_id), value_text(&c.span)))
                .collect();
            candidate.graph_paths = raw
                .graph_paths
                .iter()
                .filter(|path| !path.is_empty())
                .map(|path| path.iter().map(value_text).collect())
                .collect();
            if candidate.citations.is_empty() {
                candidate.citations.push(Citation::new(PLACEHOLDER, PLACEHOLDER));
            }
            if candidate.graph_paths.is_empty() {
                candidate.graph_paths.push(vec![PLACEHOLDER.to_string(), "path".to_string()]);
            }
            candidate
        })
        .collect();

    if candidates.is_empty() {
        return Err(SpecialistFailure::NoCandidates);
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_score_examples() {
        assert_eq!(local_score(ConfidenceQual::High, 0), 0.925);
        assert_eq!(local_score(ConfidenceQual::parse_lenient("certain"), 7), 0.475);
        assert_eq!(local_score(ConfidenceQual::Medium, 1), 0.8);
        assert_eq!(local_score(ConfidenceQual::Low, 20), 0.475);
    }

    #[test]
    fn prop_local_score_in_unit_interval_and_non_increasing() {
        for confidence in [ConfidenceQual::Low, ConfidenceQual::Medium, ConfidenceQual::High] {
            let mut previous = f64::INFINITY;
            for index in 0..32 {
                let score = local_score(confidence, index);
                assert!((0.0..=1.0).contains(&score));
                assert!(score <= previous);
                previous = score;
            }
        }
    }

    #[test]
    fn extracts_fenced_and_bare_json() {
        let fenced = "Here you go:\n```json\n{\"candidates\": []}\n```\nthanks";
        assert_eq!(extract_json_block(fenced), Some("{\"candidates\": []}"));
        assert_eq!(extract_json_block("noise {\"a\": 1} noise"), Some("{\"a\": 1}"));
        assert_eq!(extract_json_block("no json here"), None);
    }

    #[test]
    fn parses_and_scores_candidates() {
        let raw = r#"{"candidates": [
            {"diagnosis": "Dengue", "rationale": "FOR: fever", "confidence_qual": "high",
             "citations": [{"doc_id": "who-2009", "span": "warning signs"}],
             "graph_paths": [["Dengue", "has_symptom", "Fever"]]},
            {"diagnosis": "Malaria", "rationale": "travel", "confidence_qual": "MEDIUM"}
        ]}"#;
        let candidates = parse_candidates(raw).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].score_local, Some(0.925));
        assert_eq!(candidates[0].citations, vec![Citation::new("who-2009", "warning signs")]);
        assert_eq!(candidates[1].confidence_qual, ConfidenceQual::Medium);
        assert_eq!(candidates[1].score_local, Some(0.8));
    }

    #[test]
    fn backfills_missing_citation_and_path() {
        let candidates =
            parse_candidates(r#"{"candidates": [{"diagnosis": "SLE", "confidence_qual": "low"}]}"#).unwrap();
        assert_eq!(candidates[0].citations, vec![Citation::new("default", "default")]);
        assert_eq!(candidates[0].graph_paths, vec![vec!["default".to_string(), "path".to_string()]]);
    }

    #[test]
    fn reads_at_most_six_items() {
        let items: Vec<_> = (0..9)
            .map(|i| serde_json::json!({"diagnosis": format!("Dx {i}"), "confidence_qual": "low"}))
            .collect();
        let raw = serde_json::json!({ "candidates": items }).to_string();
        let candidates = parse_candidates(&raw).unwrap();
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[5].diagnosis, "Dx 5");
    }

    #[test]
    fn numeric_citation_fields_become_text() {
        let raw = r#"{"candidates": [{"diagnosis": "Lupus", "citations": [{"doc_id": 12, "span": "criteria"}]}]}"#;
        let candidates = parse_candidates(raw).unwrap();
        assert_eq!(candidates[0].citations[0].doc_id, "12");
    }

    #[test]
    fn failure_modes() {
        assert!(matches!(parse_candidates("I cannot help"), Err(SpecialistFailure::Parse(_))));
        assert!(matches!(parse_candidates(r#"{"candidates": "none"}"#), Err(SpecialistFailure::Parse(_))));
        assert!(matches!(parse_candidates(r#"{"other": []}"#), Err(SpecialistFailure::Parse(_))));
        assert!(matches!(parse_candidates(r#"{"candidates": []}"#), Err(SpecialistFailure::NoCandidates)));
        assert!(matches!(
            parse_candidates(r#"{"candidates": [{"diagnosis": "  "}]}"#),
            Err(SpecialistFailure::NoCandidates)
        ));
    }

    #[test]
    fn failed_outcome_presents_as_empty_result() {
        let outcome = SpecialistOutcome::Failed {
            agent: SpecialistDomain::Neurology,
            reason: SpecialistFailure::NoCandidates,
        };
        assert!(outcome.is_failed());
        assert_eq!(outcome.agent(), SpecialistDomain::Neurology);
        let result = outcome.into_agent_result();
        assert!(result.is_empty());
        assert_eq!(result.agent, SpecialistDomain::Neurology);
    }
}
