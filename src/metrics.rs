//! Clustering evaluation metrics.
//!
//! Adjusted Rand Index and Variation of Information over two integer-label
//! partitions of the same elements. Used by the shadow evaluator to measure
//! how far an experimental heuristic's clustering drifts from production,
//! exposing cluster collapse immediately.

use std::collections::HashMap;

/// Adjusted Rand Index between two partitions.
///
/// ARI = (Σ C(n_ij,2) − E) / (M − E) with E = Σa·Σb / C(n,2) and
/// M = (Σa + Σb) / 2. Ranges from −1 (worse than random) through 0
/// (random) to 1 (perfect agreement). Returns 0 for mismatched or
/// too-short inputs, and 1 when the denominator degenerates (both
/// partitions trivially agree).
pub fn adjusted_rand_index(predicted: &[i64], ground_truth: &[i64]) -> f64 {
    let n = predicted.len();
    if n != ground_truth.len() || n < 2 {
        return 0.0;
    }

    let (nij, row_sums, col_sums) = contingency(predicted, ground_truth);

    let sum_nij_c2: f64 = nij.iter().flatten().map(|&c| comb2(c)).sum();
    let sum_ai_c2: f64 = row_sums.iter().map(|&a| comb2(a)).sum();
    let sum_bj_c2: f64 = col_sums.iter().map(|&b| comb2(b)).sum();

    let n_c2 = comb2(n);
    if n_c2 == 0.0 {
        return 0.0;
    }

    let expected = (sum_ai_c2 * sum_bj_c2) / n_c2;
    let max_index = 0.5 * (sum_ai_c2 + sum_bj_c2);

    let denominator = max_index - expected;
    if denominator.abs() < 1e-12 {
        return 1.0;
    }

    (sum_nij_c2 - expected) / denominator
}

/// Variation of Information: VI = H(C|C') + H(C'|C) in bits. Lower is
/// better; 0 means identical partitions. Returns 0 for mismatched or
/// too-short inputs.
pub fn variation_of_information(predicted: &[i64], ground_truth: &[i64]) -> f64 {
    let n = predicted.len();
    if n != ground_truth.len() || n < 2 {
        return 0.0;
    }

    let (nij, row_sums, col_sums) = contingency(predicted, ground_truth);
    let nf = n as f64;

    let mut h_c_given_cp = 0.0;
    let mut h_cp_given_c = 0.0;

    for (i, row) in nij.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pij = count as f64 / nf;
            if col_sums[j] > 0 {
                h_c_given_cp -= pij * (count as f64 / col_sums[j] as f64).log2();
            }
            if row_sums[i] > 0 {
                h_cp_given_c -= pij * (count as f64 / row_sums[i] as f64).log2();
            }
        }
    }

    h_c_given_cp + h_cp_given_c
}

/// Shannon entropy of a partition given its cluster sizes.
pub fn partition_entropy(cluster_counts: &HashMap<i64, usize>, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let tf = total as f64;
    cluster_counts
        .values()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / tf;
            -p * p.log2()
        })
        .sum()
}

/// Build the contingency matrix n_ij plus row and column marginals.
fn contingency(predicted: &[i64], ground_truth: &[i64]) -> (Vec<Vec<usize>>, Vec<usize>, Vec<usize>) {
    let pred_index = label_index(predicted);
    let gt_index = label_index(ground_truth);

    let mut nij = vec![vec![0usize; gt_index.len()]; pred_index.len()];
    for (p, g) in predicted.iter().zip(ground_truth) {
        nij[pred_index[p]][gt_index[g]] += 1;
    }

    let row_sums: Vec<usize> = nij.iter().map(|row| row.iter().sum()).collect();
    let mut col_sums = vec![0usize; gt_index.len()];
    for row in &nij {
        for (j, &c) in row.iter().enumerate() {
            col_sums[j] += c;
        }
    }

    (nij, row_sums, col_sums)
}

/// First-seen index per distinct label.
fn label_index(labels: &[i64]) -> HashMap<i64, usize> {
    let mut index = HashMap::new();
    for &l in labels {
        let next = index.len();
        index.entry(l).or_insert(next);
    }
    index
}

fn comb2(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    n as f64 * (n as f64 - 1.0) / 2.0
}
