//! Post-mix spend analysis.
//!
//! The biggest failure mode in CoinJoin privacy is what users do after
//! mixing: consolidating mixed UTXOs, merging them with unmixed coins,
//! reusing pre-mix addresses, or sweeping straight to an exchange. When the
//! caller knows which inputs were coinjoin outputs, the leakage can be
//! classified precisely; the pipeline's structural proxy lives in the
//! orchestrator.

use serde::{Deserialize, Serialize};

use crate::core::Transaction;

/// Post-mix spending behavior analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMixResult {
    /// Transaction spends CoinJoin outputs.
    pub is_post_mix_tx: bool,
    /// "none"/"consolidation"/"address-reuse"/"peel"/"exchange-deposit"
    pub leakage_type: String,
    /// 0.0 (no leakage) to 1.0 (total deanonymization).
    pub severity_score: f64,
    pub mixed_input_count: usize,
    pub non_mixed_input_count: usize,
    /// The mix benefit is completely negated.
    pub privacy_destroyed: bool,
    /// "safe"/"caution"/"unsafe"/"critical"
    pub recommendation: String,
}

impl Default for PostMixResult {
    fn default() -> Self {
        Self {
            is_post_mix_tx: false,
            leakage_type: "none".to_string(),
            severity_score: 0.0,
            mixed_input_count: 0,
            non_mixed_input_count: 0,
            privacy_destroyed: false,
            recommendation: "safe".to_string(),
        }
    }
}

/// Examine a transaction for privacy-destroying post-mix patterns.
/// `input_from_coinjoin[i]` marks whether input i spends a coinjoin output;
/// a length mismatch degrades to the default result.
pub fn analyze_post_mix_behavior(tx: &Transaction, input_from_coinjoin: &[bool]) -> PostMixResult {
    let mut result = PostMixResult::default();

    if input_from_coinjoin.len() != tx.inputs.len() {
        return result;
    }

    for &mixed in input_from_coinjoin {
        if mixed {
            result.mixed_input_count += 1;
        } else {
            result.non_mixed_input_count += 1;
        }
    }

    if result.mixed_input_count == 0 {
        return result;
    }
    result.is_post_mix_tx = true;

    // Cross-mix consolidation: spending several mixed UTXOs links them all.
    if result.mixed_input_count >= 2 {
        result.leakage_type = "consolidation".to_string();
        result.severity_score = 0.9;
        result.privacy_destroyed = true;
        result.recommendation = "critical".to_string();
        return result;
    }

    // Toxic merge: a mixed input spent alongside unmixed coins.
    if result.non_mixed_input_count >= 1 {
        result.leakage_type = "consolidation".to_string();
        result.severity_score = 0.95;
        result.privacy_destroyed = true;
        result.recommendation = "critical".to_string();
        return result;
    }

    // Peel from a mixed output: trackable but not immediately fatal.
    if tx.outputs.len() == 2 {
        result.leakage_type = "peel".to_string();
        result.severity_score = 0.5;
        result.recommendation = "caution".to_string();
        return result;
    }

    // Address reuse against a pre-mix input address.
    let input_addrs: std::collections::HashSet<&str> =
        tx.inputs.iter().map(|i| i.address.as_str()).collect();
    if tx
        .outputs
        .iter()
        .any(|o| !o.address.is_empty() && input_addrs.contains(o.address.as_str()))
    {
        result.leakage_type = "address-reuse".to_string();
        result.severity_score = 0.8;
        result.privacy_destroyed = true;
        result.recommendation = "critical".to_string();
        return result;
    }

    // Single mixed input swept to one output: likely an exchange deposit.
    if tx.outputs.len() == 1 {
        result.leakage_type = "exchange-deposit".to_string();
        result.severity_score = 0.6;
        result.recommendation = "unsafe".to_string();
        return result;
    }

    result
}

/// Worst case check: spending two or more CoinJoin outputs in one
/// transaction instantly links all of them.
pub fn detect_premature_consolidation(tx: &Transaction, input_from_coinjoin: &[bool]) -> bool {
    if input_from_coinjoin.len() != tx.inputs.len() {
        return false;
    }
    input_from_coinjoin.iter().filter(|&&m| m).count() >= 2
}

/// Effective anonymity set after leakage: anonset × (1 − severity),
/// floored at 1.
pub fn post_mix_anonset_erosion(original_anonset: usize, leakage_severity: f64) -> usize {
    if leakage_severity <= 0.0 {
        return original_anonset;
    }
    if leakage_severity >= 1.0 {
        return 1;
    }
    ((original_anonset as f64) * (1.0 - leakage_severity)).max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    fn tx(n_in: usize, n_out: usize) -> Transaction {
        Transaction {
            inputs: (0..n_in)
                .map(|i| TxIn {
                    value: 1_000_000,
                    address: format!("bc1q_in{i}"),
                    ..Default::default()
                })
                .collect(),
            outputs: (0..n_out)
                .map(|i| TxOut {
                    value: 900_000,
                    address: format!("bc1q_out{i}"),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn length_mismatch_degrades() {
        let result = analyze_post_mix_behavior(&tx(2, 2), &[true]);
        assert!(!result.is_post_mix_tx);
    }

    #[test]
    fn no_mixed_inputs_safe() {
        let result = analyze_post_mix_behavior(&tx(2, 2), &[false, false]);
        assert!(!result.is_post_mix_tx);
        assert_eq!(result.recommendation, "safe");
    }

    #[test]
    fn cross_mix_consolidation_critical() {
        let result = analyze_post_mix_behavior(&tx(3, 1), &[true, true, false]);
        assert_eq!(result.leakage_type, "consolidation");
        assert!(result.privacy_destroyed);
        assert_eq!(result.recommendation, "critical");
        assert!((result.severity_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn toxic_merge_critical() {
        let result = analyze_post_mix_behavior(&tx(2, 3), &[true, false]);
        assert_eq!(result.leakage_type, "consolidation");
        assert!((result.severity_score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn peel_from_mixed_output() {
        let result = analyze_post_mix_behavior(&tx(1, 2), &[true]);
        assert_eq!(result.leakage_type, "peel");
        assert_eq!(result.recommendation, "caution");
        assert!(!result.privacy_destroyed);
    }

    #[test]
    fn sweep_to_single_output() {
        let result = analyze_post_mix_behavior(&tx(1, 1), &[true]);
        assert_eq!(result.leakage_type, "exchange-deposit");
        assert_eq!(result.recommendation, "unsafe");
    }

    #[test]
    fn address_reuse_detected() {
        let mut t = tx(1, 3);
        t.outputs[2].address = t.inputs[0].address.clone();
        let result = analyze_post_mix_behavior(&t, &[true]);
        assert_eq!(result.leakage_type, "address-reuse");
        assert!(result.privacy_destroyed);
    }

    #[test]
    fn premature_consolidation_check() {
        assert!(detect_premature_consolidation(&tx(3, 1), &[true, true, false]));
        assert!(!detect_premature_consolidation(&tx(3, 1), &[true, false, false]));
        assert!(!detect_premature_consolidation(&tx(2, 1), &[true]));
    }

    #[test]
    fn anonset_erosion() {
        assert_eq!(post_mix_anonset_erosion(10, 0.0), 10);
        assert_eq!(post_mix_anonset_erosion(10, 1.0), 1);
        assert_eq!(post_mix_anonset_erosion(10, 0.5), 5);
        assert_eq!(post_mix_anonset_erosion(2, 0.9), 1);
    }
}
