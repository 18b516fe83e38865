//! Fee-rate intelligence.
//!
//! Fee patterns are the strongest wallet fingerprinting signal after BIP69:
//! estimation strategy, rounding behavior and UTXO selection differ
//! fundamentally between wallet implementations.

use crate::core::{FeeAnalysisResult, Transaction};

/// Comprehensive fee-rate analysis: rate, tier, rounding pattern,
/// unnecessary inputs, overpay ratio and the inferred wallet family.
pub fn analyze_fee_pattern(tx: &Transaction) -> FeeAnalysisResult {
    let mut result = FeeAnalysisResult::default();

    if tx.vsize > 0 {
        result.fee_rate = (tx.fee as f64 * 100.0 / tx.vsize as f64).round() / 100.0;
    } else if tx.weight > 0 {
        let vsize = (tx.weight + 3) / 4;
        result.fee_rate = (tx.fee as f64 * 100.0 / vsize as f64).round() / 100.0;
    }

    result.fee_rate_class = classify_fee_rate(result.fee_rate).to_string();
    result.rounding_pattern = detect_fee_rounding(result.fee_rate).to_string();
    result.unnecessary_inputs = detect_unnecessary_inputs(tx);
    result.overpay_ratio = compute_overpay_ratio(tx);
    result.wallet_hint = infer_wallet_from_fee(&result).to_string();

    result
}

/// Map sat/vB to a priority tier.
fn classify_fee_rate(fee_rate: f64) -> &'static str {
    if fee_rate <= 1.0 {
        "minimal"
    } else if fee_rate <= 3.0 {
        "economic"
    } else if fee_rate <= 15.0 {
        "normal"
    } else if fee_rate <= 50.0 {
        "priority"
    } else {
        "urgent"
    }
}

/// Wallet-specific fee rounding: whole sat/vB with 10- and 5-multiples
/// (exchange tiers), whole-number (Core), otherwise precise estimation
/// (Electrum, Sparrow).
fn detect_fee_rounding(fee_rate: f64) -> &'static str {
    if fee_rate <= 0.0 {
        return "none";
    }

    if (fee_rate - fee_rate.round()).abs() < 0.05 {
        let rounded = fee_rate.round() as i64;
        if rounded % 10 == 0 && rounded > 0 {
            return "10sat";
        }
        if rounded % 5 == 0 && rounded > 0 {
            return "5sat";
        }
        return "1sat";
    }

    "precise"
}

/// Count inputs that could be removed while still covering outputs + fee.
/// Reveals the UTXO selection algorithm (Branch & Bound vs knapsack vs
/// random).
fn detect_unnecessary_inputs(tx: &Transaction) -> usize {
    if tx.inputs.len() <= 1 {
        return 0;
    }

    let total_needed: i64 = tx.fee + tx.outputs.iter().map(|o| o.value).sum::<i64>();
    let total_available: i64 = tx.inputs.iter().map(|i| i.value).sum();

    let mut sorted_values: Vec<i64> = tx.inputs.iter().map(|i| i.value).collect();
    sorted_values.sort_unstable();

    // Greedily drop the smallest inputs while coverage holds.
    let mut unnecessary = 0;
    let mut cumulative = total_available;
    for value in sorted_values {
        let remaining = cumulative - value;
        if remaining >= total_needed {
            unnecessary += 1;
            cumulative = remaining;
        }
    }

    unnecessary
}

/// Fee relative to the 1 sat/vB relay minimum. 1.0 = exactly optimal,
/// > 1.5 suggests coordinator fee padding.
fn compute_overpay_ratio(tx: &Transaction) -> f64 {
    if tx.fee <= 0 || tx.vsize <= 0 {
        return 1.0;
    }
    let min_fee = tx.vsize;
    ((tx.fee as f64 / min_fee as f64) * 100.0).round() / 100.0
}

/// Decision matrix combining rounding, tier, overpay and selection signals.
fn infer_wallet_from_fee(result: &FeeAnalysisResult) -> &'static str {
    if result.rounding_pattern == "10sat" || result.rounding_pattern == "5sat" {
        "exchange/custodial"
    } else if result.overpay_ratio > 2.0 {
        "coordinator/wasabi"
    } else if result.rounding_pattern == "1sat"
        && (result.fee_rate_class == "economic" || result.fee_rate_class == "normal")
    {
        "bitcoin-core"
    } else if result.rounding_pattern == "precise" && result.fee_rate_class == "normal" {
        "electrum/sparrow"
    } else if result.fee_rate_class == "minimal" && result.unnecessary_inputs == 0 {
        "lightning"
    } else {
        "unknown"
    }
}

/// Anomalous fee behavior worth flagging: excessive overpay, an extreme
/// rate, or a heavy-handed UTXO selection strategy.
pub fn is_suspicious_fee_pattern(result: &FeeAnalysisResult) -> bool {
    result.overpay_ratio > 3.0 || result.fee_rate > 100.0 || result.unnecessary_inputs >= 3
}
