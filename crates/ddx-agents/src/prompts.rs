//! Prompt text for specialists and the recommendations step.
//!
//! Every persona shares the same contract: stay inside one etiology class,
//! prefer specific entities over umbrella labels, return an empty list rather
//! than cross domains, and give a contrastive, falsifiable rationale with
//! citations.

use std::fmt::Write as _;

use ddx_coordination::model::{FusedOutput, PatientContext};
use serde::Serialize;

macro_rules! persona {
    (
        attending: $attending:literal,
        scope: $scope:literal,
        exclude: $exclude:literal,
        umbrella: $umbrella:literal,
        domain: $domain:literal $(,)?
    ) => {
        concat!(
            "You are ", $attending, " attending. Restrict your differential to ",
            $scope, ". ",
            "Do not propose ", $exclude, ". ",
            "Avoid umbrella labels such as '", $umbrella, "' unless that level of specificity ",
            "changes testing or management; name specific entities whenever possible. ",
            "If no ", $domain, " diagnosis fits the case, return an EMPTY candidate list ",
            "instead of proposing out-of-domain items. ",
            "Work only from the supplied patient data, literature snippets, previous cases ",
            "and knowledge-graph facts. ",
            "Give every diagnosis a contrastive rationale: (a) findings FOR it, ",
            "(b) findings AGAINST it, (c) the ONE next test that best confirms or refutes it, ",
            "and (d) a short comparison with at least one competing ", $domain, " hypothesis. ",
            "Cite doc_id:span after each non-obvious clinical claim. ",
            "Respond with JSON that matches the schema exactly, with no extra keys and no prose ",
            "outside the JSON."
        )
    };
}

pub const INFECTIOUS_PERSONA: &str = persona!(
    attending: "an Infectious Disease",
    scope: "INFECTIOUS ETIOLOGIES (viral, bacterial, fungal, parasitic, prion)",
    exclude: "non-infectious causes (autoimmune, rheumatologic, neoplastic, metabolic, vascular, toxic, congenital)",
    umbrella: "viral syndrome",
    domain: "infectious",
);

pub const AUTOIMMUNE_PERSONA: &str = persona!(
    attending: "an Autoimmune/Rheumatology",
    scope: "AUTOIMMUNE/INFLAMMATORY ETIOLOGIES (e.g. SLE, RA, vasculitides, spondyloarthropathies, IBD-associated disease, APS, sarcoidosis, autoinflammatory syndromes)",
    exclude: "infectious, neoplastic, metabolic or purely mechanical causes",
    umbrella: "connective tissue disease",
    domain: "autoimmune",
);

pub const CARDIOLOGY_PERSONA: &str = persona!(
    attending: "a Cardiology",
    scope: "CARDIOVASCULAR ETIOLOGIES (e.g. ACS, arrhythmias, heart failure, valvular, pericardial and congenital heart disease, cardiomyopathies, vascular disease)",
    exclude: "infectious, rheumatologic, neurologic, oncologic or other non-cardiac causes",
    umbrella: "cardiac syndrome",
    domain: "cardiology",
);

pub const NEUROLOGY_PERSONA: &str = persona!(
    attending: "a Neurology",
    scope: "NEUROLOGIC ETIOLOGIES (e.g. stroke/TIA, seizure disorders, demyelinating disease, neuropathies, myopathies, movement disorders, CNS infections, headache disorders)",
    exclude: "rheumatologic, non-CNS oncologic, primary cardiac or purely psychiatric causes without a direct neurological basis",
    umbrella: "neurologic syndrome",
    domain: "neurology",
);

pub const ONCOLOGY_PERSONA: &str = persona!(
    attending: "an Oncology",
    scope: "ONCOLOGIC ETIOLOGIES (e.g. solid tumors by organ system, hematologic malignancies, paraneoplastic syndromes, treatment-related complications)",
    exclude: "rheumatologic, primary infectious (outside an oncologic context), purely metabolic, or primary cardiac or neurologic causes",
    umbrella: "malignancy",
    domain: "oncology",
);

pub const TOXICOLOGY_PERSONA: &str = persona!(
    attending: "a Medical Toxicology",
    scope: "TOXICOLOGIC ETIOLOGIES (e.g. specific xenobiotic exposures, toxidromes, envenomations, environmental or occupational exposures)",
    exclude: "primary infectious, autoimmune, oncologic or structural causes that lack a toxicologic mechanism",
    umbrella: "toxic syndrome",
    domain: "toxicology",
);

/// Shape of the specialist response, embedded verbatim in every prompt.
pub const CANDIDATES_SCHEMA: &str = concat!(
    r#"{"candidates": {"type": "array", "items": {"type": "object", "properties": {"#,
    r#""diagnosis": {"type": "string"}, "#,
    r#""rationale": {"type": "string"}, "#,
    r#""citations": {"type": "array", "items": {"type": "object", "properties": "#,
    r#"{"doc_id": {"type": "string"}, "span": {"type": "string"}}, "required": ["doc_id", "span"]}}, "#,
    r#""graph_paths": {"type": "array", "items": {"type": "array", "items": {"type": "string"}}}, "#,
    r#""confidence_qual": {"type": "string", "enum": ["low", "medium", "high"]}}, "#,
    r#""required": ["diagnosis", "rationale", "citations", "confidence_qual"]}}}"#
);

/// Maximum candidates a specialist is asked for (and consumed).
pub const MAX_CANDIDATES: usize = 6;

pub const RECOMMENDATIONS_PERSONA: &str = concat!(
    "You are a clinical recommendations assistant. From a fused differential (top 5) and the ",
    "case context, produce 3-6 actionable recommendations covering next steps, monitoring, ",
    "precautions and consults. Weigh patient safety, information gain and practicality. ",
    r#"Return valid JSON: {"recommendations": [{"title": str, "rationale": str, "priority": "low|medium|high"}]}"#
);

/// The slice of [`PatientContext`] a specialist is shown.
#[derive(Debug, Clone, Serialize)]
pub struct CaseContext<'a> {
    pub demographics: &'a ddx_coordination::model::Demographics,
    pub vitals: &'a ddx_coordination::model::Vitals,
    pub symptoms: &'a [String],
    pub duration_days: Option<u32>,
    pub labs: &'a std::collections::BTreeMap<String, serde_json::Value>,
    pub exposures: &'a [String],
}

impl<'a> CaseContext<'a> {
    pub fn from_patient(patient: &'a PatientContext) -> Self {
        Self {
            demographics: &patient.demographics,
            vitals: &patient.vitals,
            symptoms: &patient.symptoms,
            duration_days: patient.duration_days,
            labs: &patient.labs,
            exposures: patient.exposures_or_travel(),
        }
    }
}

fn json_line<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Evidence blocks rendered into the specialist prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptEvidence {
    pub literature: String,
    pub cases: String,
    pub graph_facts: String,
    pub shown_docs: usize,
    pub shown_cases: usize,
}

pub fn build_specialist_prompt(label: &str, context: &CaseContext<'_>, evidence: &PromptEvidence) -> String {
    let duration = context
        .duration_days
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "DOMAIN: {label}

CASE CONTEXT:
- Demographics: {demographics}
- Vitals: {vitals}
- Normalized symptoms: {symptoms}
- Duration days: {duration}
- Initial labs: {labs}
- Exposures/travel: {exposures}

LOCAL LITERATURE (top {k_docs}):
{literature}

PREVIOUS CASES (top {k_cases}):
{cases}

LOCAL KNOWLEDGE GRAPH FACTS:
{facts}

DOMAIN GUARDRAILS (apply strictly):
- Only propose diagnoses that belong to the '{label}' specialty.
- Leave out anything plausibly outside '{label}'; fewer items beat crossing domains.
- No near-duplicates or umbrella placeholders; every candidate must be DISTINCT.

DIFFERENTIAL FORMAT (contrastive, falsifiable):
- Up to {max} diagnoses from this domain.
- For each: FOR, AGAINST, ONE discriminative next test, and a one-sentence comparison with a competing {label} hypothesis.
- Calibrate confidence realistically (low/medium/high).
- Cite doc_id:span after non-obvious claims.
- Return JSON strictly matching: {schema}
",
        demographics = json_line(context.demographics),
        vitals = json_line(context.vitals),
        symptoms = json_line(context.symptoms),
        labs = json_line(context.labs),
        exposures = json_line(context.exposures),
        k_docs = evidence.shown_docs,
        k_cases = evidence.shown_cases,
        literature = or_none(&evidence.literature),
        cases = or_none(&evidence.cases),
        facts = or_none(&evidence.graph_facts),
        max = MAX_CANDIDATES,
        schema = CANDIDATES_SCHEMA,
    )
}

fn or_none(block: &str) -> &str {
    if block.trim().is_empty() {
        "(none)"
    } else {
        block
    }
}

/// Numbered top-5 summary plus the next-best-test line.
pub fn summarize_fused(fused: &FusedOutput) -> String {
    let mut out = String::new();
    for (i, item) in fused.differential.iter().take(5).enumerate() {
        let _ = writeln!(
            out,
            "{}. {} (score={}) - {}",
            i + 1,
            item.diagnosis,
            item.score_global,
            item.why_top
        );
    }
    let _ = write!(
        out,
        "Next best test: {} - {}",
        fused.next_best_test.name, fused.next_best_test.why
    );
    out
}

pub fn build_recommendations_prompt(patient: &PatientContext, fused_summary: &str) -> String {
    format!(
        "CASE SNAPSHOT:
- Demographics: {}
- Vitals: {}
- Normalized symptoms: {}
- Initial labs: {}

FUSED DIFFERENTIAL (Top-5):
{fused_summary}

TASK: Produce 3-6 concise, actionable clinical recommendations with short rationales and priorities.
",
        json_line(&patient.demographics),
        json_line(&patient.vitals),
        json_line(&patient.symptoms),
        json_line(&patient.labs),
    )
}
