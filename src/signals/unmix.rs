//! CoinJoin unmixing.
//!
//! Not all CoinJoins are equal: unique output values and low funding
//! cardinality leak deterministic I→O links even inside a mix. This module
//! quantifies the unmixability of a CoinJoin and identifies the weakest
//! participants.

use serde::{Deserialize, Serialize};

use crate::core::{Transaction, TxOut, UnmixResult};

/// A confirmed input→output ownership link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterministicLink {
    pub input_index: usize,
    pub output_index: usize,
    pub input_value: i64,
    pub output_value: i64,
    /// 1.0 = deterministic.
    pub certainty: f64,
}

/// A group of outputs with the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueGroup {
    pub value: i64,
    pub count: usize,
}

/// Evaluate how many I→O links can be deterministically resolved in a
/// CoinJoin transaction.
pub fn analyze_unmixability(tx: &Transaction, is_coinjoin: bool) -> UnmixResult {
    let mut result = UnmixResult {
        total_outputs: tx.outputs.len(),
        ..Default::default()
    };

    if !is_coinjoin || tx.inputs.len() < 2 || tx.outputs.len() < 2 {
        return result;
    }

    let matrix = linkability_matrix(tx);

    // Outputs fundable by exactly one input are deterministic links;
    // two possible funders make a weak participant.
    for out_idx in 0..tx.outputs.len() {
        let eligible = (0..tx.inputs.len())
            .filter(|&in_idx| matrix[in_idx][out_idx])
            .count();
        if eligible == 1 {
            result.deterministic_links += 1;
            result.unmixable_outputs += 1;
        } else if eligible <= 2 {
            result.weak_participants += 1;
        }
    }

    // Unique output values are the strongest signal.
    let mut value_counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for out in &tx.outputs {
        *value_counts.entry(out.value).or_insert(0) += 1;
    }
    for out in &tx.outputs {
        if value_counts[&out.value] == 1 {
            result.unmixable_outputs += 1;
        }
    }

    result.unmixable_outputs = result.unmixable_outputs.min(tx.outputs.len());

    if result.total_outputs > 0 {
        result.linkability_score = ((result.unmixable_outputs as f64 * 100.0)
            / result.total_outputs as f64)
            .round()
            / 100.0;
    }

    result.mix_quality = classify_mix_quality(result.linkability_score).to_string();
    result
}

/// N×M boolean matrix: matrix[i][j] is true when input i can fund output j
/// (input value covers the output value).
fn linkability_matrix(tx: &Transaction) -> Vec<Vec<bool>> {
    tx.inputs
        .iter()
        .map(|i| tx.outputs.iter().map(|o| i.value >= o.value).collect())
        .collect()
}

/// Enumerate I→O pairs that are 100% certain: outputs only one input can
/// fund.
pub fn find_deterministic_links(tx: &Transaction) -> Vec<DeterministicLink> {
    let mut links = Vec::new();
    if tx.inputs.len() < 2 || tx.outputs.len() < 2 {
        return links;
    }

    let matrix = linkability_matrix(tx);
    for (out_idx, out) in tx.outputs.iter().enumerate() {
        let eligible: Vec<usize> = (0..tx.inputs.len())
            .filter(|&in_idx| matrix[in_idx][out_idx])
            .collect();
        if eligible.len() == 1 {
            links.push(DeterministicLink {
                input_index: eligible[0],
                output_index: out_idx,
                input_value: tx.inputs[eligible[0]].value,
                output_value: out.value,
                certainty: 1.0,
            });
        }
    }
    links
}

/// Linkability ratio → quality band.
fn classify_mix_quality(ratio: f64) -> &'static str {
    if ratio <= 0.0 {
        "perfect"
    } else if ratio <= 0.1 {
        "strong"
    } else if ratio <= 0.3 {
        "moderate"
    } else if ratio <= 0.6 {
        "weak"
    } else {
        "broken"
    }
}

/// Shannon entropy of the output value distribution. Higher entropy means a
/// more even spread of distinct values.
pub fn output_value_entropy(outputs: &[TxOut]) -> f64 {
    if outputs.is_empty() {
        return 0.0;
    }

    let mut counts: std::collections::BTreeMap<i64, usize> = std::collections::BTreeMap::new();
    for out in outputs {
        *counts.entry(out.value).or_insert(0) += 1;
    }

    let total = outputs.len() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();

    (entropy * 100.0).round() / 100.0
}

/// Sorted output value frequencies, most common first.
pub fn output_value_distribution(outputs: &[TxOut]) -> Vec<ValueGroup> {
    let mut counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for out in outputs {
        *counts.entry(out.value).or_insert(0) += 1;
    }

    let mut groups: Vec<ValueGroup> = counts
        .into_iter()
        .map(|(value, count)| ValueGroup { value, count })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));
    groups
}
