//! Dependency-aware evidence composition.
//!
//! Factor-graph semantics: independent features are separate factors and add
//! in log-space; correlated features (same dependency group) are fused so
//! overlapping heuristics cannot inflate linkage confidence.

use std::collections::BTreeMap;

use super::{EvidenceEdge, InferenceResult};

/// Produce a calibrated posterior belief from a set of evidence edges.
///
/// Within each dependency group only the strongest signal (max |LLR|)
/// contributes; the selected representatives sum across groups. This
/// prevents double-counting: correlated features contribute at most the
/// strength of the strongest single feature.
pub fn evaluate_factor_graph(edges: &[EvidenceEdge]) -> InferenceResult {
    if edges.is_empty() {
        return InferenceResult {
            posterior_llr: 0.0,
            confidence_level: "rejected".to_string(),
            ..Default::default()
        };
    }

    // BTreeMap keeps group iteration deterministic.
    let mut groups: BTreeMap<i32, Vec<&EvidenceEdge>> = BTreeMap::new();
    for edge in edges {
        groups.entry(edge.dependency_group).or_default().push(edge);
    }

    let mut posterior_llr = 0.0;
    let mut discounted = 0;

    for group_edges in groups.values() {
        let mut max_llr = group_edges[0].llr_score;
        for edge in &group_edges[1..] {
            if edge.llr_score.abs() > max_llr.abs() {
                max_llr = edge.llr_score;
            }
        }
        discounted += group_edges.len() - 1;
        posterior_llr += max_llr;
    }

    InferenceResult {
        posterior_llr,
        confidence_level: classify_confidence(posterior_llr).to_string(),
        discounted_edges: discounted,
        total_edges: edges.len(),
        effective_factors: groups.len(),
    }
}

/// Map the posterior LLR magnitude to a confidence band (Jeffreys scale):
/// > 2.0 decisive, > 1.0 strong, > 0.5 moderate, otherwise insufficient.
pub fn classify_confidence(llr: f64) -> &'static str {
    let abs = llr.abs();
    if abs > 2.0 {
        "high"
    } else if abs > 1.0 {
        "medium"
    } else if abs > 0.5 {
        "low"
    } else {
        "rejected"
    }
}

/// Evaluate whether a set of addresses belongs to the same entity.
/// A cluster materializes only at medium-or-better posterior confidence,
/// which prevents cluster collapse from weak or correlated evidence.
pub fn compute_cluster_posterior(edges: &[EvidenceEdge]) -> (bool, f64) {
    let result = evaluate_factor_graph(edges);
    let should_cluster =
        result.confidence_level == "high" || result.confidence_level == "medium";
    (should_cluster, result.posterior_llr)
}
