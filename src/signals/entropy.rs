//! Boltzmann transaction entropy.
//!
//! Entropy = log2(N) where N is the number of valid input→output mappings.
//! A perfect 5×5 Whirlpool mix approaches log2(5!) ≈ 6.9 bits; a simple
//! 1-in-2-out payment is fully deterministic at 0 bits. Exact enumeration is
//! bounded at 12×12 and 10,000 interpretations; larger transactions use the
//! equal-output statistical estimate.

use crate::core::{EntropyResult, Transaction, TxIn, TxOut};

/// Exact enumeration bound per side.
const EXACT_MAX_SIDE: usize = 12;

/// Search node budget for exact enumeration.
const EXACT_COUNT_CAP: u64 = 10_000;

/// Numerical stability cap for the statistical estimate.
const ESTIMATE_CAP: f64 = 1e9;

/// Compute the Boltzmann entropy of a transaction.
pub fn compute_boltzmann_entropy(tx: &Transaction) -> EntropyResult {
    let n_in = tx.inputs.len();
    let n_out = tx.outputs.len();

    if n_in == 0 || n_out == 0 {
        return EntropyResult::default();
    }

    // Simple transactions are fully deterministic.
    if n_in == 1 && n_out <= 2 {
        return EntropyResult::default();
    }

    // Upper bound: every input can fund every output.
    let max_entropy = log2_factorial(n_in.min(n_out));

    let interpretations = if n_in <= EXACT_MAX_SIDE && n_out <= EXACT_MAX_SIDE {
        count_valid_mappings(&tx.inputs, &tx.outputs)
    } else {
        estimate_mappings_large(&tx.inputs, &tx.outputs)
    }
    .max(1);

    let entropy = (interpretations as f64).log2();

    let efficiency = if max_entropy > 0.0 {
        (entropy / max_entropy).min(1.0)
    } else {
        0.0
    };

    EntropyResult {
        entropy: (entropy * 100.0).round() / 100.0,
        max_entropy: (max_entropy * 100.0).round() / 100.0,
        efficiency: (efficiency * 100.0).round() / 100.0,
        level: classify_entropy_level(entropy).to_string(),
        interpretations,
    }
}

/// Exact enumeration of valid input→output assignments under the value
/// compatibility constraint (an input can fund any output not exceeding its
/// value). Capped at [`EXACT_COUNT_CAP`] to bound runaway search.
fn count_valid_mappings(inputs: &[TxIn], outputs: &[TxOut]) -> u64 {
    let n_in = inputs.len();
    let n_out = outputs.len();

    if n_in == 0 || n_out == 0 {
        return 1;
    }

    let compatible: Vec<Vec<bool>> = inputs
        .iter()
        .map(|i| outputs.iter().map(|o| i.value >= o.value).collect())
        .collect();

    // Largest outputs first for better pruning.
    let mut order: Vec<usize> = (0..n_out).collect();
    order.sort_by(|&a, &b| outputs[b].value.cmp(&outputs[a].value));

    let mut used = vec![false; n_in];
    let mut count = 0u64;
    enumerate(&compatible, &order, n_in, n_out, 0, &mut used, &mut count);
    count
}

fn enumerate(
    compatible: &[Vec<bool>],
    order: &[usize],
    n_in: usize,
    n_out: usize,
    out_idx: usize,
    used: &mut [bool],
    count: &mut u64,
) {
    if out_idx == n_out {
        *count += 1;
        return;
    }
    if *count >= EXACT_COUNT_CAP {
        return;
    }

    let actual_out = order[out_idx];
    for in_idx in 0..n_in {
        if used[in_idx] || !compatible[in_idx][actual_out] {
            continue;
        }
        used[in_idx] = true;
        enumerate(compatible, order, n_in, n_out, out_idx + 1, used, count);
        used[in_idx] = false;
    }

    // With more outputs than inputs, outputs may share inputs (CoinJoin model).
    if n_out > n_in {
        enumerate(compatible, order, n_in, n_out, out_idx + 1, used, count);
    }
}

/// Statistical estimate for large transactions: each group of K equal-value
/// outputs fundable by M inputs contributes C(M, K) · K! mappings.
fn estimate_mappings_large(inputs: &[TxIn], outputs: &[TxOut]) -> u64 {
    let mut groups: std::collections::BTreeMap<i64, usize> = std::collections::BTreeMap::new();
    for out in outputs {
        *groups.entry(out.value).or_insert(0) += 1;
    }

    let mut total = 1.0f64;
    for (&value, &group_size) in &groups {
        let eligible = inputs.iter().filter(|i| i.value >= value).count();
        if eligible >= group_size {
            total *= binomial(eligible, group_size) * factorial_capped(group_size);
        }
    }

    total.min(ESTIMATE_CAP) as u64
}

/// Map entropy bits to quality bands.
fn classify_entropy_level(entropy: f64) -> &'static str {
    if entropy <= 0.0 {
        "transparent"
    } else if entropy < 2.0 {
        "low"
    } else if entropy < 4.0 {
        "moderate"
    } else if entropy < 7.0 {
        "high"
    } else {
        "maximum"
    }
}

/// log2(n!), exact below 21, Stirling above.
fn log2_factorial(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    if n <= 20 {
        let mut f = 1.0f64;
        for i in 2..=n {
            f *= i as f64;
        }
        return f.log2();
    }
    let fn_ = n as f64;
    fn_ * fn_.log2() - fn_ * std::f64::consts::E.log2()
        + 0.5 * (2.0 * std::f64::consts::PI * fn_).log2()
}

fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0f64;
    for i in 0..k {
        result *= (n - i) as f64;
        result /= (i + 1) as f64;
    }
    result
}

/// n! capped at 12! to avoid overflow in the estimate.
fn factorial_capped(n: usize) -> f64 {
    let n = n.min(12);
    let mut result = 1.0f64;
    for i in 2..=n {
        result *= i as f64;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(input_vals: &[i64], output_vals: &[i64]) -> Transaction {
        Transaction {
            inputs: input_vals
                .iter()
                .map(|&value| TxIn { value, ..Default::default() })
                .collect(),
            outputs: output_vals
                .iter()
                .map(|&value| TxOut { value, ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn simple_payment_transparent() {
        let result = compute_boltzmann_entropy(&tx(&[100_000], &[60_000, 39_000]));
        assert_eq!(result.entropy, 0.0);
        assert_eq!(result.level, "transparent");
        assert_eq!(result.interpretations, 1);
    }

    #[test]
    fn empty_sides_transparent() {
        let result = compute_boltzmann_entropy(&tx(&[], &[]));
        assert_eq!(result.level, "transparent");
    }

    #[test]
    fn equal_mix_has_entropy() {
        // 3 equal inputs × 3 equal outputs: 3! = 6 permutations.
        let result = compute_boltzmann_entropy(&tx(
            &[100_000, 100_000, 100_000],
            &[90_000, 90_000, 90_000],
        ));
        assert_eq!(result.interpretations, 6);
        assert!((result.entropy - 6f64.log2()).abs() < 0.01);
        assert!(result.level == "moderate");
    }

    #[test]
    fn five_by_five_mix_high_entropy() {
        let result = compute_boltzmann_entropy(&tx(
            &[1_000_500; 5],
            &[1_000_000; 5],
        ));
        // 5! = 120 interpretations → ~6.9 bits.
        assert_eq!(result.interpretations, 120);
        assert!(result.entropy > 6.0);
        assert_eq!(result.level, "high");
        assert!((result.efficiency - 1.0).abs() < 0.01);
    }

    #[test]
    fn incompatible_values_stay_deterministic() {
        // Inputs too small to fund the large output in any order.
        let result = compute_boltzmann_entropy(&tx(&[10, 20, 30], &[1_000, 2_000, 3_000]));
        assert_eq!(result.interpretations, 1);
        assert_eq!(result.level, "transparent");
    }

    #[test]
    fn large_tx_statistical_estimate() {
        // 20×20 equal values exceed the exact side bound.
        let result = compute_boltzmann_entropy(&tx(&[1_000_100; 20], &[1_000_000; 20]));
        assert!(result.interpretations > 1);
        assert!(result.entropy > 4.0);
    }

    #[test]
    fn entropy_levels() {
        assert_eq!(classify_entropy_level(0.0), "transparent");
        assert_eq!(classify_entropy_level(1.0), "low");
        assert_eq!(classify_entropy_level(3.0), "moderate");
        assert_eq!(classify_entropy_level(5.0), "high");
        assert_eq!(classify_entropy_level(8.0), "maximum");
    }

    #[test]
    fn log2_factorial_values() {
        assert_eq!(log2_factorial(1), 0.0);
        assert!((log2_factorial(5) - 120f64.log2()).abs() < 1e-9);
        // Stirling stays close for larger n.
        let exact_20 = log2_factorial(20);
        let stirling_21 = log2_factorial(21);
        assert!(stirling_21 > exact_20);
    }
}
