//! Candidate fusion: merge specialist outputs by canonical diagnosis key,
//! rank them, measure disagreement and attach the next-best-test.
//!
//! Fusion is a pure function of its inputs. Grouping uses a `BTreeMap` keyed
//! by [`CanonicalKey`], and ranking is score descending then key ascending,
//! so identical inputs always give identical output.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::info;

use crate::graph::KnowledgeGraph;
use crate::model::{
    clamp_unit, round3, AgentResult, CanonicalKey, Citation, FusedDifferentialItem, FusedOutput,
    SpecialistDomain, TestPlanItem,
};
use crate::text::truncate_chars;

pub mod disagreement;

pub use disagreement::{agent_distribution, disagreement_score, js_divergence, MISSING_SCORE};

/// Items kept in the fused differential.
pub const MAX_DIFFERENTIAL: usize = 5;
/// Characters kept in `why_top`.
pub const WHY_TOP_CHARS: usize = 240;
/// Items that receive a contingent test plan.
pub const MAX_TEST_PLANS: usize = 3;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("candidate '{diagnosis}' from {agent} has invalid local score {score}")]
    InvalidScore {
        agent: SpecialistDomain,
        diagnosis: String,
        score: f64,
    },
}

pub type FusionResult<T> = Result<T, FusionError>;

#[derive(Default)]
struct Group {
    display: String,
    scores: Vec<f64>,
    rationales: Vec<String>,
    citations: Vec<Citation>,
    graph_paths: Vec<Vec<String>>,
}

/// Fuse all specialist results for one request.
///
/// An empty or all-empty input yields an empty differential, zero
/// disagreement and the re-evaluation next-best-test.
pub fn fuse(
    results: &[AgentResult],
    symptoms: &[String],
    graph: &KnowledgeGraph,
) -> FusionResult<FusedOutput> {
    let mut groups: BTreeMap<CanonicalKey, Group> = BTreeMap::new();
    for result in results {
        for candidate in &result.candidates {
            if let Some(score) = candidate.score_local {
                if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                    return Err(FusionError::InvalidScore {
                        agent: result.agent,
                        diagnosis: candidate.diagnosis.clone(),
                        score,
                    });
                }
            }
            let key = candidate.canonical_key();
            if key.is_empty() {
                continue;
            }
            let group = groups.entry(key).or_insert_with(|| Group {
                display: candidate.diagnosis.clone(),
                ..Group::default()
            });
            group.scores.push(candidate.score_local.unwrap_or(MISSING_SCORE));
            group.rationales.push(candidate.rationale.clone());
            group.citations.extend(candidate.citations.iter().cloned());
            group.graph_paths.extend(candidate.graph_paths.iter().cloned());
        }
    }

    let mut ranked: Vec<(CanonicalKey, FusedDifferentialItem)> = groups
        .into_iter()
        .map(|(key, group)| {
            let mean = group.scores.iter().sum::<f64>() / group.scores.len().max(1) as f64;
            let why = group.rationales.join("; ");
            let item = FusedDifferentialItem {
                diagnosis: group.display,
                score_global: clamp_unit(round3(mean)),
                why_top: truncate_chars(&why, WHY_TOP_CHARS).to_string(),
                citations: group.citations,
                graph_paths: group.graph_paths,
            };
            (key, item)
        })
        .collect();
    ranked.sort_by(|(ka, a), (kb, b)| {
        b.score_global
            .total_cmp(&a.score_global)
            .then_with(|| ka.cmp(kb))
    });
    ranked.truncate(MAX_DIFFERENTIAL);
    let differential: Vec<FusedDifferentialItem> = ranked.into_iter().map(|(_, item)| item).collect();

    let disagreement = disagreement_score(results);

    let hypotheses: Vec<String> = differential.iter().map(|d| d.diagnosis.clone()).collect();
    let next_best_test = graph.next_best_test(&hypotheses, symptoms);

    let test_plans = differential
        .iter()
        .take(MAX_TEST_PLANS)
        .map(|d| TestPlanItem {
            diagnosis: d.diagnosis.clone(),
            plan: format!(
                "If {} positive → favor {}; if negative → order clinical re-evaluation.",
                next_best_test.name, d.diagnosis
            ),
        })
        .collect();

    info!(
        agents = results.len(),
        differential = differential.len(),
        disagreement,
        next_best_test = %next_best_test.name,
        "Fused specialist results"
    );

    Ok(FusedOutput {
        differential,
        next_best_test,
        disagreement_score: disagreement,
        test_plans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Candidate, ConfidenceQual, CLINICAL_REEVALUATION};

    fn cand(diagnosis: &str, score: f64) -> Candidate {
        Candidate::new(diagnosis, ConfidenceQual::High)
            .with_rationale(format!("{diagnosis} fits"))
            .with_score(score)
    }

    #[test]
    fn empty_input_is_insufficient_evidence() {
        let out = fuse(&[], &[], &KnowledgeGraph::empty()).unwrap();
        assert!(out.is_insufficient_evidence());
        assert_eq!(out.disagreement_score, 0.0);
        assert_eq!(out.next_best_test.name, CLINICAL_REEVALUATION);
        assert!(out.test_plans.is_empty());
    }

    #[test]
    fn merges_case_and_whitespace_variants() {
        let results = vec![
            AgentResult::new(SpecialistDomain::Infectious, vec![cand("Dengue", 0.9)]),
            AgentResult::new(SpecialistDomain::Autoimmune, vec![cand(" dengue ", 0.7)]),
            AgentResult::new(SpecialistDomain::Cardiology, vec![cand("DENGUE", 0.5)]),
        ];
        let out = fuse(&results, &[], &KnowledgeGraph::empty()).unwrap();
        assert_eq!(out.differential.len(), 1);
        assert_eq!(out.differential[0].diagnosis, "Dengue");
        assert_eq!(out.differential[0].score_global, 0.7);
    }

    #[test]
    fn missing_score_counts_as_half() {
        let mut unscored = Candidate::new("Lupus", ConfidenceQual::Low);
        unscored.score_local = None;
        let results = vec![
            AgentResult::new(SpecialistDomain::Autoimmune, vec![unscored]),
            AgentResult::new(SpecialistDomain::Infectious, vec![cand("lupus", 0.9)]),
        ];
        let out = fuse(&results, &[], &KnowledgeGraph::empty()).unwrap();
        assert_eq!(out.differential[0].score_global, 0.7);
    }

    #[test]
    fn ranks_by_score_then_key_and_caps_at_five() {
        let candidates = vec![
            cand("Zeta", 0.5),
            cand("Alpha", 0.5),
            cand("Top", 0.9),
            cand("D", 0.1),
            cand("E", 0.2),
            cand("F", 0.3),
            cand("G", 0.05),
        ];
        let results = vec![AgentResult::new(SpecialistDomain::Oncology, candidates)];
        let out = fuse(&results, &[], &KnowledgeGraph::empty()).unwrap();
        let names: Vec<_> = out.differential.iter().map(|d| d.diagnosis.as_str()).collect();
        assert_eq!(names, vec!["Top", "Alpha", "Zeta", "F", "E"]);
        assert_eq!(out.test_plans.len(), 3);
        assert_eq!(
            out.test_plans[0].plan,
            "If Clinical re-evaluation positive → favor Top; if negative → order clinical re-evaluation."
        );
    }

    #[test]
    fn why_top_is_truncated_by_characters() {
        let long = "é".repeat(300);
        let results = vec![AgentResult::new(
            SpecialistDomain::Neurology,
            vec![Candidate::new("Migraine", ConfidenceQual::Medium)
                .with_rationale(long)
                .with_score(0.6)],
        )];
        let out = fuse(&results, &[], &KnowledgeGraph::empty()).unwrap();
        assert_eq!(out.differential[0].why_top.chars().count(), WHY_TOP_CHARS);
    }

    #[test]
    fn blank_diagnoses_are_skipped() {
        let results = vec![AgentResult::new(
            SpecialistDomain::Toxicology,
            vec![cand("   ", 0.9), cand("Opioid overdose", 0.8)],
        )];
        let out = fuse(&results, &[], &KnowledgeGraph::empty()).unwrap();
        assert_eq!(out.differential.len(), 1);
    }

    #[test]
    fn out_of_range_score_is_a_fusion_error() {
        let mut bad = cand("Dengue", 0.5);
        bad.score_local = Some(1.5);
        let results = vec![AgentResult::new(SpecialistDomain::Infectious, vec![bad])];
        assert!(matches!(
            fuse(&results, &[], &KnowledgeGraph::empty()),
            Err(FusionError::InvalidScore { .. })
        ));
    }
}
