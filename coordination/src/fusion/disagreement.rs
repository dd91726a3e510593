//! Cross-specialist disagreement as mean pairwise Jensen–Shannon divergence.
//!
//! ```text
//! M       = (P + Q) / 2
//! JSD(P,Q) = ½·KL(P‖M) + ½·KL(Q‖M)      (log base 2, so JSD ∈ [0, 1])
//! ```
//!
//! JSD is the squared Jensen–Shannon distance. Identical distributions give
//! 0, disjoint supports give 1.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{clamp_unit, AgentResult, CanonicalKey};

/// Score used for a candidate that carries no local score.
pub const MISSING_SCORE: f64 = 0.5;

/// One agent's scores normalised to sum to 1. Repeated keys within the agent
/// are summed first. Empty when the agent's scores sum to zero.
pub fn agent_distribution(result: &AgentResult) -> BTreeMap<CanonicalKey, f64> {
    let mut dist: BTreeMap<CanonicalKey, f64> = BTreeMap::new();
    for candidate in &result.candidates {
        let key = candidate.canonical_key();
        if key.is_empty() {
            continue;
        }
        *dist.entry(key).or_insert(0.0) += candidate.score_local.unwrap_or(MISSING_SCORE);
    }
    let total: f64 = dist.values().sum();
    if total > 0.0 && total.is_finite() {
        for value in dist.values_mut() {
            *value /= total;
        }
        dist
    } else {
        BTreeMap::new()
    }
}

/// Mean pairwise JSD across agents, clamped to `[0, 1]`.
///
/// Returns 0 when fewer than two agents produced candidates. Pairs whose key
/// union is empty are skipped; an agent with an empty distribution is compared
/// as uniform over the union.
pub fn disagreement_score(results: &[AgentResult]) -> f64 {
    let producing = results.iter().filter(|r| !r.candidates.is_empty()).count();
    if producing < 2 {
        return 0.0;
    }

    let dists: Vec<BTreeMap<CanonicalKey, f64>> = results.iter().map(agent_distribution).collect();
    let mut pair_scores = Vec::new();
    for (i, p) in dists.iter().enumerate() {
        for q in &dists[i + 1..] {
            let union: BTreeSet<&CanonicalKey> = p.keys().chain(q.keys()).collect();
            if union.is_empty() {
                continue;
            }
            let pv = vector_over(p, &union);
            let qv = vector_over(q, &union);
            pair_scores.push(clamp_unit(js_divergence(&pv, &qv)));
        }
    }

    if pair_scores.is_empty() {
        return 0.0;
    }
    clamp_unit(pair_scores.iter().sum::<f64>() / pair_scores.len() as f64)
}

fn vector_over(dist: &BTreeMap<CanonicalKey, f64>, union: &BTreeSet<&CanonicalKey>) -> Vec<f64> {
    let v: Vec<f64> = union.iter().map(|k| dist.get(*k).copied().unwrap_or(0.0)).collect();
    if v.iter().sum::<f64>() > 0.0 {
        v
    } else {
        vec![1.0 / union.len() as f64; union.len()]
    }
}

/// Jensen–Shannon divergence in bits. Inputs are renormalised; non-finite
/// results map to 0.
pub fn js_divergence(p: &[f64], q: &[f64]) -> f64 {
    if p.is_empty() || p.len() != q.len() {
        return 0.0;
    }
    let sp: f64 = p.iter().sum();
    let sq: f64 = q.iter().sum();
    if !(sp > 0.0 && sq > 0.0) {
        return 0.0;
    }

    let mut jsd = 0.0;
    for (&pi, &qi) in p.iter().zip(q) {
        let (pi, qi) = (pi / sp, qi / sq);
        let mi = 0.5 * (pi + qi);
        if pi > 0.0 {
            jsd += 0.5 * pi * (pi / mi).log2();
        }
        if qi > 0.0 {
            jsd += 0.5 * qi * (qi / mi).log2();
        }
    }

    if jsd.is_finite() {
        jsd.max(0.0)
    } else {
        0.0
    }
}
