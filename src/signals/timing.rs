//! Timing and temporal analysis.
//!
//! Temporal metadata reveals wallet and coordinator behavior that purely
//! structural analysis misses: anti-fee-sniping locktimes, RBF signaling,
//! version/CSV usage, exchange batch payouts, coordinator rounds and
//! inhumanly uniform bot transactions.

use serde::{Deserialize, Serialize};

use crate::core::{address_type, Transaction};

/// Temporal analysis result for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSignal {
    pub has_timing_anomaly: bool,
    /// "batch_payout"/"coordinator_round"/"bot_timing"/"none"
    pub anomaly_type: String,
    pub confidence: f64,
    /// "anti-fee-snipe"/"timelock"/"height-lock"/"disabled"/"none"
    pub nlocktime_signal: String,
    /// True when any input signals RBF (BIP125).
    pub rbf_signaling: bool,
    /// "v1"/"v2"/"v2-rbf"/"v2-csv"/"unknown"
    pub version_signal: String,
}

impl Default for TimingSignal {
    fn default() -> Self {
        Self {
            has_timing_anomaly: false,
            anomaly_type: "none".to_string(),
            confidence: 0.0,
            nlocktime_signal: "none".to_string(),
            rbf_signaling: false,
            version_signal: "v1".to_string(),
        }
    }
}

/// Extract temporal intelligence from the transaction metadata.
pub fn analyze_timing_signals(tx: &Transaction) -> TimingSignal {
    let mut result = TimingSignal {
        nlocktime_signal: analyze_nlocktime(tx).to_string(),
        rbf_signaling: detect_rbf_signaling(tx),
        version_signal: analyze_version(tx).to_string(),
        ..Default::default()
    };

    let (detected, anomaly_type, confidence) = detect_timing_anomalies(tx);
    result.has_timing_anomaly = detected;
    result.anomaly_type = anomaly_type.to_string();
    result.confidence = confidence;

    result
}

/// Classify nLockTime behavior. Bitcoin Core sets it to the current block
/// height for anti-fee-sniping; values ≥ 500,000,000 are Unix timestamps;
/// most other wallets leave it disabled at zero.
fn analyze_nlocktime(tx: &Transaction) -> &'static str {
    let lt = tx.locktime;

    if lt == 0 {
        return "disabled";
    }
    if lt >= 500_000_000 {
        return "timelock";
    }

    if tx.block_height > 0 {
        let diff = lt as i64 - tx.block_height as i64;
        if (-2..=0).contains(&diff) {
            return "anti-fee-snipe";
        }
    }
    // Without block context, a plausible recent height still reads as
    // anti-fee-sniping.
    if lt > 700_000 && lt < 1_000_000 {
        return "anti-fee-snipe";
    }
    "height-lock"
}

/// BIP125: any input with 0 < nSequence < 0xFFFFFFFE signals replaceability.
pub fn detect_rbf_signaling(tx: &Transaction) -> bool {
    tx.inputs
        .iter()
        .any(|i| i.sequence > 0 && i.sequence < 0xFFFF_FFFE)
}

/// Version-based signals; version 2 enables BIP68 relative timelocks.
fn analyze_version(tx: &Transaction) -> &'static str {
    match tx.version {
        1 => "v1",
        2 => {
            // BIP68: sequence below 0x80000000 encodes a relative timelock.
            if tx
                .inputs
                .iter()
                .any(|i| i.sequence > 0 && i.sequence < 0x8000_0000)
            {
                return "v2-csv";
            }
            if detect_rbf_signaling(tx) {
                return "v2-rbf";
            }
            "v2"
        }
        _ => "unknown",
    }
}

/// Structural patterns that correlate with temporal behavior.
fn detect_timing_anomalies(tx: &Transaction) -> (bool, &'static str, f64) {
    // Batch payout: few inputs, many outputs across address types.
    if tx.inputs.len() <= 3 && tx.outputs.len() >= 10 {
        let types: std::collections::HashSet<_> = tx
            .outputs
            .iter()
            .map(|o| address_type(&o.address))
            .collect();
        if types.len() >= 2 {
            let confidence = (0.5 + 0.05 * tx.outputs.len() as f64).min(0.9);
            return (true, "batch_payout", confidence);
        }
    }

    // Coordinator round: WabiSabi-scale symmetric construction.
    if tx.inputs.len() >= 50 && tx.outputs.len() >= 50 {
        return (true, "coordinator_round", 0.85);
    }

    // Bot timing: perfectly uniform inputs and outputs.
    if tx.inputs.len() >= 3 && tx.outputs.len() >= 3 {
        let all_same_input = tx.inputs.windows(2).all(|w| w[0].value == w[1].value);
        let all_same_output = tx.outputs.windows(2).all(|w| w[0].value == w[1].value);
        if all_same_input && all_same_output {
            return (true, "bot_timing", 0.70);
        }
    }

    (false, "none", 0.0)
}

/// Fuse nLockTime, RBF and version signals into a wallet hint.
pub fn infer_wallet_from_timing(signal: &TimingSignal) -> &'static str {
    if signal.nlocktime_signal == "anti-fee-snipe" && signal.rbf_signaling {
        "bitcoin-core"
    } else if signal.nlocktime_signal == "disabled" && signal.rbf_signaling {
        "electrum"
    } else if signal.nlocktime_signal == "disabled"
        && !signal.rbf_signaling
        && signal.version_signal == "v1"
    {
        "samourai"
    } else if signal.nlocktime_signal == "anti-fee-snipe" && signal.version_signal == "v2-csv" {
        "blockstream-green"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    fn tx(n_in: usize, n_out: usize) -> Transaction {
        Transaction {
            version: 2,
            inputs: (0..n_in)
                .map(|i| TxIn {
                    value: 1_000 + i as i64,
                    sequence: 0xFFFF_FFFF,
                    address: "bc1q_in".into(),
                    ..Default::default()
                })
                .collect(),
            outputs: (0..n_out)
                .map(|i| TxOut {
                    value: 900 + i as i64,
                    address: "bc1q_out".into(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn locktime_classes() {
        let mut t = tx(1, 1);
        t.locktime = 0;
        assert_eq!(analyze_nlocktime(&t), "disabled");

        t.locktime = 600_000_000;
        assert_eq!(analyze_nlocktime(&t), "timelock");

        t.locktime = 800_000;
        t.block_height = 800_001;
        assert_eq!(analyze_nlocktime(&t), "anti-fee-snipe");

        t.locktime = 123_456;
        t.block_height = 800_001;
        assert_eq!(analyze_nlocktime(&t), "height-lock");

        // No block context, plausible recent height.
        t.locktime = 812_345;
        t.block_height = 0;
        assert_eq!(analyze_nlocktime(&t), "anti-fee-snipe");
    }

    #[test]
    fn rbf_detection() {
        let mut t = tx(2, 2);
        assert!(!detect_rbf_signaling(&t));
        t.inputs[0].sequence = 0xFFFF_FFFD;
        assert!(detect_rbf_signaling(&t));
    }

    #[test]
    fn version_signals() {
        let mut t = tx(1, 1);
        t.version = 1;
        assert_eq!(analyze_version(&t), "v1");

        t.version = 2;
        assert_eq!(analyze_version(&t), "v2");

        t.inputs[0].sequence = 0xFFFF_FFFD;
        assert_eq!(analyze_version(&t), "v2-rbf");

        t.inputs[0].sequence = 144;
        assert_eq!(analyze_version(&t), "v2-csv");
    }

    #[test]
    fn batch_payout_anomaly() {
        let mut t = tx(2, 12);
        // Mix output address types.
        for (i, out) in t.outputs.iter_mut().enumerate() {
            if i % 2 == 0 {
                out.address = "1legacy".into();
            }
        }
        let signal = analyze_timing_signals(&t);
        assert!(signal.has_timing_anomaly);
        assert_eq!(signal.anomaly_type, "batch_payout");
        assert!(signal.confidence > 0.5);
    }

    #[test]
    fn coordinator_round_anomaly() {
        let t = tx(60, 60);
        let signal = analyze_timing_signals(&t);
        assert_eq!(signal.anomaly_type, "coordinator_round");
        assert!((signal.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn bot_timing_uniform_values() {
        let mut t = tx(4, 4);
        for input in &mut t.inputs {
            input.value = 1_000_000;
        }
        for out in &mut t.outputs {
            out.value = 990_000;
        }
        let signal = analyze_timing_signals(&t);
        assert_eq!(signal.anomaly_type, "bot_timing");
    }

    #[test]
    fn clean_payment_no_anomaly() {
        let signal = analyze_timing_signals(&tx(1, 2));
        assert!(!signal.has_timing_anomaly);
        assert_eq!(signal.anomaly_type, "none");
    }

    #[test]
    fn wallet_hints_from_timing() {
        let core = TimingSignal {
            nlocktime_signal: "anti-fee-snipe".into(),
            rbf_signaling: true,
            ..Default::default()
        };
        assert_eq!(infer_wallet_from_timing(&core), "bitcoin-core");

        let electrum = TimingSignal {
            nlocktime_signal: "disabled".into(),
            rbf_signaling: true,
            ..Default::default()
        };
        assert_eq!(infer_wallet_from_timing(&electrum), "electrum");

        let samourai = TimingSignal {
            nlocktime_signal: "disabled".into(),
            version_signal: "v1".into(),
            ..Default::default()
        };
        assert_eq!(infer_wallet_from_timing(&samourai), "samourai");

        let green = TimingSignal {
            nlocktime_signal: "anti-fee-snipe".into(),
            version_signal: "v2-csv".into(),
            ..Default::default()
        };
        assert_eq!(infer_wallet_from_timing(&green), "blockstream-green");

        assert_eq!(infer_wallet_from_timing(&TimingSignal::default()), "unknown");
    }
}
