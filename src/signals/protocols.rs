//! Emerging-protocol monitor.
//!
//! Tracks transactions exhibiting signatures of privacy protocols that
//! break traditional observation assumptions (BIP352 silent payments,
//! BIP77 async PayJoin, BIP46 JoinMarket fidelity bonds). Matches receive
//! policy-gated flags that wall them off from naive deterministic
//! clustering.

use tracing::debug;

use crate::core::flags::{FlagSet, HeuristicFlag};
use crate::core::{address_type, AddressType, Transaction};

/// Protocol watch monitor. Inert when disabled.
#[derive(Debug, Clone)]
pub struct ProtocolMonitor {
    pub active: bool,
}

impl Default for ProtocolMonitor {
    fn default() -> Self {
        Self { active: true }
    }
}

impl ProtocolMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a transaction against all active protocol heuristics and
    /// return the flags to OR into the analysis.
    pub fn evaluate(&self, tx: &Transaction) -> FlagSet {
        let mut flags = FlagSet::empty();

        if !self.active {
            return flags;
        }

        flags.union(detect_silent_payment(tx));
        flags.union(detect_payjoin(tx));
        flags.union(detect_joinmarket_bond(tx));

        if !flags.is_empty() {
            debug!(txid = %tx.txid, "emerging protocol signature detected");
        }

        flags
    }
}

/// BIP352 silent payments tweak Taproot keys non-interactively; without the
/// scan key the outputs look random. A 1-in-many-out all-Taproot sweep is
/// the observable fingerprint worth gating.
fn detect_silent_payment(tx: &Transaction) -> FlagSet {
    let mut flags = FlagSet::empty();
    if tx.inputs.len() == 1
        && tx.outputs.len() >= 5
        && tx
            .outputs
            .iter()
            .all(|o| address_type(&o.address) == AddressType::Taproot)
    {
        flags.set(HeuristicFlag::SilentPayment);
    }
    flags
}

/// BIP77 async PayJoin breaks the all-inputs-same-owner assumption.
/// Fingerprint: 2-in-2-out where an output mirrors an input value.
fn detect_payjoin(tx: &Transaction) -> FlagSet {
    let mut flags = FlagSet::empty();
    if tx.inputs.len() == 2
        && tx.outputs.len() == 2
        && (tx.outputs[0].value == tx.inputs[0].value
            || tx.outputs[1].value == tx.inputs[1].value)
    {
        flags.set(HeuristicFlag::PayjoinSuspect);
    }
    flags
}

/// BIP46 JoinMarket fidelity bonds timelock capital with OP_CLTV OP_DROP
/// ("b175" in hex) — a direct corroboration signal for Maker nodes whose
/// descendants must not be trivially clustered.
fn detect_joinmarket_bond(tx: &Transaction) -> FlagSet {
    let mut flags = FlagSet::empty();
    for out in &tx.outputs {
        if contains_cltv_drop(&out.script_pubkey) {
            flags.set(HeuristicFlag::JoinMarketBond);
            break;
        }
    }
    flags
}

/// Scan a hex script for the byte-aligned OP_CLTV (b1) OP_DROP (75) pair.
fn contains_cltv_drop(hex_script: &str) -> bool {
    let bytes = hex_script.as_bytes();
    let mut i = 0;
    while i + 4 <= bytes.len() {
        if &bytes[i..i + 4] == b"b175" {
            return true;
        }
        i += 2;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    #[test]
    fn silent_payment_taproot_sweep() {
        let tx = Transaction {
            inputs: vec![TxIn { value: 10_000_000, address: "bc1p_in".into(), ..Default::default() }],
            outputs: (0..5)
                .map(|i| TxOut {
                    value: 1_999_000,
                    address: format!("bc1p_out{i}"),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let flags = ProtocolMonitor::new().evaluate(&tx);
        assert!(flags.contains(HeuristicFlag::SilentPayment));
    }

    #[test]
    fn silent_payment_rejected_with_segwit_output() {
        let mut outputs: Vec<TxOut> = (0..4)
            .map(|i| TxOut { value: 100, address: format!("bc1p_{i}"), ..Default::default() })
            .collect();
        outputs.push(TxOut { value: 100, address: "bc1q_x".into(), ..Default::default() });
        let tx = Transaction {
            inputs: vec![TxIn { value: 1_000, address: "bc1p_in".into(), ..Default::default() }],
            outputs,
            ..Default::default()
        };
        let flags = ProtocolMonitor::new().evaluate(&tx);
        assert!(!flags.contains(HeuristicFlag::SilentPayment));
    }

    #[test]
    fn payjoin_value_mirror() {
        let tx = Transaction {
            inputs: vec![
                TxIn { value: 500_000, address: "bc1q_sender".into(), ..Default::default() },
                TxIn { value: 300_000, address: "bc1q_receiver".into(), ..Default::default() },
            ],
            outputs: vec![
                TxOut { value: 500_000, address: "bc1q_merged".into(), ..Default::default() },
                TxOut { value: 299_000, address: "bc1q_chg".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let flags = ProtocolMonitor::new().evaluate(&tx);
        assert!(flags.contains(HeuristicFlag::PayjoinSuspect));
    }

    #[test]
    fn joinmarket_bond_cltv_drop() {
        let tx = Transaction {
            outputs: vec![TxOut {
                value: 100_000,
                script_pubkey: "0410a0b317b17521aa21ac".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let flags = ProtocolMonitor::new().evaluate(&tx);
        assert!(flags.contains(HeuristicFlag::JoinMarketBond));
    }

    #[test]
    fn cltv_drop_must_be_byte_aligned() {
        assert!(contains_cltv_drop("aab175cc"));
        // "b175" straddling a byte boundary must not match.
        assert!(!contains_cltv_drop("cb175c"));
        assert!(!contains_cltv_drop("aab1cc75"));
    }

    #[test]
    fn inactive_monitor_returns_nothing() {
        let tx = Transaction {
            inputs: vec![TxIn { value: 10_000, address: "bc1p_in".into(), ..Default::default() }],
            outputs: (0..6)
                .map(|_| TxOut { value: 100, address: "bc1p_o".into(), ..Default::default() })
                .collect(),
            ..Default::default()
        };
        let monitor = ProtocolMonitor { active: false };
        assert!(monitor.evaluate(&tx).is_empty());
    }
}
