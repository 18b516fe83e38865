//! Peel chain detection.
//!
//! A peel chain is a run of 1-in-2-out transactions where each step peels a
//! payment off and passes the change to the next transaction, leaving a
//! deterministic chain of custody. This is the per-transaction step check;
//! linking full chains requires cross-transaction state.

use serde::{Deserialize, Serialize};

use crate::core::{address_type, is_round_amount, AddressType, PeelChainResult, Transaction};
use crate::evidence::prob_to_llr;

/// Minimum accumulated confidence to declare a peel step.
const MIN_PEEL_CONFIDENCE: f64 = 0.40;

/// Signals used to identify a peel chain step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeelChainCandidate {
    pub is_peel_step: bool,
    pub confidence: f64,
    pub change_index: i32,
    pub payment_index: i32,
    pub change_value: i64,
    pub payment_value: i64,
    pub input_is_single: bool,
}

/// Analyze a single transaction for the canonical peel-step shape:
/// 1-2 inputs, exactly 2 outputs, change smaller and type-consistent.
pub fn detect_peel_chain_step(tx: &Transaction, is_coinjoin: bool) -> PeelChainCandidate {
    let mut result = PeelChainCandidate {
        change_index: -1,
        payment_index: -1,
        ..Default::default()
    };

    // CoinJoins are never peel chains.
    if is_coinjoin {
        return result;
    }

    if tx.outputs.len() != 2 {
        return result;
    }
    if tx.inputs.is_empty() || tx.inputs.len() > 2 {
        return result;
    }

    result.input_is_single = tx.inputs.len() == 1;

    // Change is the smaller output in a peel step.
    let (out0, out1) = (tx.outputs[0].value, tx.outputs[1].value);
    if out0 <= out1 {
        result.change_index = 0;
        result.payment_index = 1;
        result.change_value = out0;
        result.payment_value = out1;
    } else {
        result.change_index = 1;
        result.payment_index = 0;
        result.change_value = out1;
        result.payment_value = out0;
    }

    let mut confidence: f64 = 0.0;

    // Single input is the strongest peel signal.
    confidence += if result.input_is_single { 0.30 } else { 0.10 };

    // Small change relative to the input total.
    let total_input: i64 = tx.inputs.iter().map(|i| i.value).sum();
    if total_input > 0 {
        let change_ratio = result.change_value as f64 / total_input as f64;
        if change_ratio < 0.3 {
            confidence += 0.25;
        } else if change_ratio < 0.5 {
            confidence += 0.15;
        }
    }

    // Change keeps the input's script type.
    let input_type = address_type(&tx.inputs[0].address);
    let change_type = address_type(&tx.outputs[result.change_index as usize].address);
    if input_type == change_type && input_type != AddressType::Unknown {
        confidence += 0.20;
    }

    // Round payment suggests a human-initiated spend.
    if is_round_amount(result.payment_value) {
        confidence += 0.15;
    }

    // Reasonable fee rate rules out sweeps and consolidations.
    if tx.fee > 0 && tx.vsize > 0 {
        let fee_rate = tx.fee as f64 / tx.vsize as f64;
        if (1.0..=50.0).contains(&fee_rate) {
            confidence += 0.10;
        }
    }

    confidence = confidence.min(1.0);

    if confidence >= MIN_PEEL_CONFIDENCE {
        result.is_peel_step = true;
        result.confidence = confidence;
    }

    result
}

/// Convert a peel candidate into the analysis sub-result.
pub fn build_peel_chain_result(candidate: &PeelChainCandidate) -> Option<PeelChainResult> {
    if !candidate.is_peel_step {
        return None;
    }
    Some(PeelChainResult {
        is_chain: true,
        chain_length: 1,
        direction: "forward".to_string(),
        confidence: candidate.confidence,
        change_index: candidate.change_index,
    })
}

/// Peel confidence → LLR for the evidence graph. Longer chains are
/// exponentially more certain; each extra step adds half the base weight,
/// capped at 5×.
pub fn score_peel_chain_llr(chain_length: usize, confidence: f64) -> f64 {
    let base = prob_to_llr(confidence);
    let bonus = if chain_length > 1 {
        (1.0 + 0.5 * (chain_length as f64 - 1.0)).min(5.0)
    } else {
        1.0
    };
    base * bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    fn peel_tx() -> Transaction {
        Transaction {
            fee: 1_000,
            vsize: 200,
            inputs: vec![TxIn {
                value: 10_000_000,
                address: "bc1q_in".into(),
                ..Default::default()
            }],
            outputs: vec![
                TxOut { value: 1_234_567, address: "bc1q_chg".into(), ..Default::default() },
                TxOut { value: 8_764_433, address: "bc1q_pay".into(), ..Default::default() },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn canonical_peel_step_detected() {
        let candidate = detect_peel_chain_step(&peel_tx(), false);
        assert!(candidate.is_peel_step);
        assert_eq!(candidate.change_index, 0);
        assert_eq!(candidate.payment_index, 1);
        assert!(candidate.input_is_single);
        // single(0.30) + ratio<0.3(0.25) + type match(0.20) + fee(0.10)
        assert!((candidate.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn coinjoin_gated() {
        let candidate = detect_peel_chain_step(&peel_tx(), true);
        assert!(!candidate.is_peel_step);
        assert_eq!(candidate.change_index, -1);
    }

    #[test]
    fn three_outputs_not_a_peel() {
        let mut tx = peel_tx();
        tx.outputs.push(TxOut { value: 10, ..Default::default() });
        assert!(!detect_peel_chain_step(&tx, false).is_peel_step);
    }

    #[test]
    fn two_inputs_weaker_signal() {
        let mut tx = peel_tx();
        tx.inputs.push(TxIn {
            value: 5_000_000,
            address: "bc1q_in2".into(),
            ..Default::default()
        });
        let candidate = detect_peel_chain_step(&tx, false);
        assert!(!candidate.input_is_single);
        // two-input(0.10) + ratio<0.3(0.25) + type match(0.20) + fee(0.10) = 0.65
        assert!(candidate.is_peel_step);
        assert!(candidate.confidence < 0.85);
    }

    #[test]
    fn round_payment_bonus() {
        let mut tx = peel_tx();
        tx.outputs[1].value = 5_000_000; // 0.05 BTC round payment
        let candidate = detect_peel_chain_step(&tx, false);
        assert!(candidate.confidence >= 0.95);
    }

    #[test]
    fn below_threshold_not_declared() {
        // Two inputs, big change ratio, mismatched types, zero fee.
        let tx = Transaction {
            inputs: vec![
                TxIn { value: 1_000, address: "1legacy".into(), ..Default::default() },
                TxIn { value: 1_000, address: "1legacy2".into(), ..Default::default() },
            ],
            outputs: vec![
                TxOut { value: 999, address: "bc1q_a".into(), ..Default::default() },
                TxOut { value: 1_001, address: "bc1q_b".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let candidate = detect_peel_chain_step(&tx, false);
        assert!(!candidate.is_peel_step);
        assert_eq!(candidate.confidence, 0.0);
    }

    #[test]
    fn llr_length_bonus() {
        let base = score_peel_chain_llr(1, 0.8);
        let longer = score_peel_chain_llr(3, 0.8);
        assert!((longer - base * 2.0).abs() < 1e-9);

        // Bonus capped at 5×.
        let capped = score_peel_chain_llr(100, 0.8);
        assert!((capped - base * 5.0).abs() < 1e-9);
    }

    #[test]
    fn build_result_from_candidate() {
        let candidate = detect_peel_chain_step(&peel_tx(), false);
        let result = build_peel_chain_result(&candidate).expect("result built");
        assert!(result.is_chain);
        assert_eq!(result.chain_length, 1);
        assert_eq!(result.direction, "forward");
        assert_eq!(result.change_index, 0);

        let none = PeelChainCandidate::default();
        assert!(build_peel_chain_result(&none).is_none());
    }
}
