//! Lightning Network channel detection.
//!
//! LN channels leave distinctive on-chain footprints: P2WSH funding outputs
//! at common channel sizes, clean two-output cooperative closes, CSV-locked
//! force closes with optional 330-sat anchors, and single-output penalty
//! sweeps.

use serde::{Deserialize, Serialize};

use crate::core::{address_type, AddressType, Transaction};

/// Lightning detection result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightningResult {
    pub is_lightning_tx: bool,
    /// "funding"/"cooperative-close"/"force-close"/"penalty"/"none"
    pub channel_type: String,
    /// Channel capacity estimate in sats.
    pub estimated_capacity: i64,
    /// Modern anchor commitment outputs present.
    pub has_anchor_outputs: bool,
}

impl Default for LightningResult {
    fn default() -> Self {
        Self {
            is_lightning_tx: false,
            channel_type: "none".to_string(),
            estimated_capacity: 0,
            has_anchor_outputs: false,
        }
    }
}

/// Common channel capacities in sats.
const CHANNEL_SIZES: &[i64] = &[
    100_000,     // 0.001 BTC minimum practical
    200_000,
    500_000,
    1_000_000,   // 0.01 BTC
    2_000_000,
    5_000_000,
    10_000_000,  // 0.1 BTC
    16_777_215,  // legacy maximum
    50_000_000,
    100_000_000, // 1.0 BTC
];

/// Anchor outputs are exactly the P2WSH dust limit.
const ANCHOR_VALUE: i64 = 330;

/// Analyze a transaction for Lightning channel lifecycle signatures.
pub fn detect_lightning_channel(tx: &Transaction) -> LightningResult {
    let mut result = LightningResult::default();

    if detect_funding(tx) {
        result.is_lightning_tx = true;
        result.channel_type = "funding".to_string();
        result.estimated_capacity = find_channel_output(tx);
        return result;
    }

    if detect_cooperative_close(tx) {
        result.is_lightning_tx = true;
        result.channel_type = "cooperative-close".to_string();
        result.estimated_capacity = tx.total_input_value();
        return result;
    }

    if detect_force_close(tx) {
        result.is_lightning_tx = true;
        result.channel_type = "force-close".to_string();
        result.estimated_capacity = tx.total_input_value();
        result.has_anchor_outputs = tx.outputs.iter().any(|o| o.value == ANCHOR_VALUE);
        return result;
    }

    if detect_penalty(tx) {
        result.is_lightning_tx = true;
        result.channel_type = "penalty".to_string();
        result.estimated_capacity = tx.total_input_value();
        return result;
    }

    result
}

/// Channel open: 1-3 inputs, 1-3 outputs, one P2WSH output (0020 + 32-byte
/// hash = 68 hex chars) at a common channel size.
fn detect_funding(tx: &Transaction) -> bool {
    if tx.inputs.is_empty() || tx.inputs.len() > 3 {
        return false;
    }
    if tx.outputs.is_empty() || tx.outputs.len() > 3 {
        return false;
    }

    let has_p2wsh = tx
        .outputs
        .iter()
        .any(|o| address_type(&o.address) == AddressType::Segwit && o.script_pubkey.len() == 68);
    let has_channel_size = tx.outputs.iter().any(|o| is_channel_size(o.value));

    has_p2wsh && has_channel_size
}

/// Mutual close: the funding output spent to two clean SegWit/Taproot
/// outputs, no timelocks, empty scriptSig.
fn detect_cooperative_close(tx: &Transaction) -> bool {
    if tx.inputs.len() != 1 || tx.outputs.len() != 2 {
        return false;
    }

    for out in &tx.outputs {
        let t = address_type(&out.address);
        if t != AddressType::Segwit && t != AddressType::Taproot {
            return false;
        }
    }

    // SegWit inputs carry empty scriptSig.
    tx.inputs[0].script_sig.is_empty()
}

/// Unilateral close: single input with a CSV-locked output
/// (OP_CHECKSEQUENCEVERIFY = 0xb2).
fn detect_force_close(tx: &Transaction) -> bool {
    if tx.inputs.len() != 1 {
        return false;
    }
    tx.outputs
        .iter()
        .any(|o| o.script_pubkey.to_ascii_lowercase().contains("b2"))
}

/// Breach remedy: everything swept to one output.
fn detect_penalty(tx: &Transaction) -> bool {
    !tx.inputs.is_empty() && tx.outputs.len() == 1
}

/// Value matches a common channel capacity, ±1% for fee deduction.
fn is_channel_size(value: i64) -> bool {
    CHANNEL_SIZES.iter().any(|&size| {
        let tolerance = size / 100;
        value >= size - tolerance && value <= size + tolerance
    })
}

/// The likely funding output value, falling back to the largest output.
fn find_channel_output(tx: &Transaction) -> i64 {
    tx.outputs
        .iter()
        .find(|o| is_channel_size(o.value))
        .map(|o| o.value)
        .unwrap_or_else(|| tx.outputs.iter().map(|o| o.value).max().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    fn p2wsh_script() -> String {
        format!("0020{}", "ab".repeat(32))
    }

    #[test]
    fn funding_transaction() {
        let tx = Transaction {
            inputs: vec![TxIn {
                value: 1_010_000,
                address: "bc1q_funder".into(),
                ..Default::default()
            }],
            outputs: vec![
                TxOut {
                    value: 1_000_000,
                    address: "bc1q_channel".into(),
                    script_pubkey: p2wsh_script(),
                },
                TxOut { value: 9_000, address: "bc1q_change".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let result = detect_lightning_channel(&tx);
        assert!(result.is_lightning_tx);
        assert_eq!(result.channel_type, "funding");
        assert_eq!(result.estimated_capacity, 1_000_000);
    }

    #[test]
    fn funding_with_fee_deducted_capacity() {
        let tx = Transaction {
            inputs: vec![TxIn { value: 5_000_000, address: "bc1q_a".into(), ..Default::default() }],
            outputs: vec![TxOut {
                value: 4_995_000, // 0.05 BTC minus fee, within 1%
                address: "bc1q_chan".into(),
                script_pubkey: p2wsh_script(),
            }],
            ..Default::default()
        };
        let result = detect_lightning_channel(&tx);
        assert_eq!(result.channel_type, "funding");
    }

    #[test]
    fn cooperative_close() {
        let tx = Transaction {
            inputs: vec![TxIn {
                value: 1_000_000,
                address: "bc1q_chan".into(),
                script_sig: String::new(),
                ..Default::default()
            }],
            outputs: vec![
                TxOut { value: 600_000, address: "bc1q_alice".into(), ..Default::default() },
                TxOut { value: 399_000, address: "bc1p_bob".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let result = detect_lightning_channel(&tx);
        assert_eq!(result.channel_type, "cooperative-close");
        assert_eq!(result.estimated_capacity, 1_000_000);
    }

    #[test]
    fn cooperative_close_rejected_for_legacy_output() {
        let tx = Transaction {
            inputs: vec![TxIn { value: 1_000_000, ..Default::default() }],
            outputs: vec![
                TxOut { value: 600_000, address: "1legacy".into(), ..Default::default() },
                TxOut { value: 399_000, address: "bc1q_bob".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        // Falls through; with 2 outputs it is not a penalty either.
        let result = detect_lightning_channel(&tx);
        assert_ne!(result.channel_type, "cooperative-close");
    }

    #[test]
    fn force_close_with_anchor() {
        let tx = Transaction {
            inputs: vec![TxIn {
                value: 2_000_000,
                address: "bc1q_chan".into(),
                script_sig: "00".into(),
                ..Default::default()
            }],
            outputs: vec![
                TxOut {
                    value: 1_500_000,
                    address: "bc1q_local".into(),
                    script_pubkey: "6352b27563ac".into(), // CSV-locked to_local
                },
                TxOut { value: 330, address: "bc1q_anchor".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let result = detect_lightning_channel(&tx);
        assert_eq!(result.channel_type, "force-close");
        assert!(result.has_anchor_outputs);
    }

    #[test]
    fn penalty_sweep() {
        let tx = Transaction {
            inputs: vec![TxIn {
                value: 2_000_000,
                address: "1breach".into(),
                script_sig: "ff".into(),
                ..Default::default()
            }],
            outputs: vec![TxOut { value: 1_995_000, address: "1sweep".into(), ..Default::default() }],
            ..Default::default()
        };
        let result = detect_lightning_channel(&tx);
        assert_eq!(result.channel_type, "penalty");
    }

    #[test]
    fn ordinary_payment_not_lightning() {
        let tx = Transaction {
            inputs: vec![TxIn {
                value: 500_000,
                address: "bc1q_a".into(),
                script_sig: "47a0".into(),
                ..Default::default()
            }],
            outputs: vec![
                TxOut { value: 123_456, address: "1dest".into(), ..Default::default() },
                TxOut { value: 375_544, address: "bc1q_chg".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let result = detect_lightning_channel(&tx);
        assert!(!result.is_lightning_tx);
        assert_eq!(result.channel_type, "none");
    }
}
