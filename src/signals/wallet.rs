//! Wallet software fingerprinting from structural transaction properties:
//! BIP69 ordering, script types, consolidation/batch shapes, nLockTime and
//! nSequence behavior, and transaction version.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{address_type, AddressType, Transaction};

/// Structural signals identifying the wallet software behind a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletFingerprint {
    /// "bitcoin_core", "electrum", "wasabi", "samourai", "sparrow",
    /// "exchange", or "unknown".
    pub wallet_family: String,
    pub confidence: f64,
    pub is_bip69: bool,
    /// Dominant input script type.
    pub input_script_types: String,
    /// Dominant output script type.
    pub output_script_types: String,
    pub has_mixed_types: bool,
    /// Many inputs → 1 output (UTXO cleanup).
    pub is_consolidation: bool,
    /// 1 input → many outputs (exchange payout).
    pub is_batched: bool,
}

/// Identified Whirlpool pool denomination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhirlpoolPoolInfo {
    /// "0.5btc", "0.05btc", "0.01btc", "0.001btc"
    pub pool_id: String,
    pub denom_sats: i64,
    pub num_participants: usize,
    /// Surge cycle (> 5 participants).
    pub is_surge: bool,
    /// Detected coordinator fee output.
    pub coordinator_fee: i64,
}

/// Standard Whirlpool pool denominations in satoshis.
const WHIRLPOOL_POOLS: &[(&str, i64)] = &[
    ("0.5btc", 50_000_000),
    ("0.05btc", 5_000_000),
    ("0.01btc", 1_000_000),
    ("0.001btc", 100_000),
];

/// Attribute the transaction to a wallet family by scoring each candidate
/// against its structural signals; the best candidate above 0.2 wins.
pub fn detect_wallet_fingerprint(tx: &Transaction) -> WalletFingerprint {
    let mut fp = WalletFingerprint {
        is_bip69: check_bip69_ordering(tx),
        ..Default::default()
    };

    let mut input_types: HashMap<AddressType, usize> = HashMap::new();
    for input in &tx.inputs {
        if !input.address.is_empty() {
            *input_types.entry(address_type(&input.address)).or_insert(0) += 1;
        }
    }
    let mut output_types: HashMap<AddressType, usize> = HashMap::new();
    for out in &tx.outputs {
        if !out.address.is_empty() {
            *output_types.entry(address_type(&out.address)).or_insert(0) += 1;
        }
    }

    fp.input_script_types = dominant_type(&input_types);
    fp.output_script_types = dominant_type(&output_types);
    fp.has_mixed_types = input_types.len() > 1 || output_types.len() > 1;

    fp.is_consolidation = tx.inputs.len() >= 5 && tx.outputs.len() == 1;
    fp.is_batched = tx.inputs.len() == 1 && tx.outputs.len() >= 5;

    // Fixed candidate order keeps ties deterministic.
    let mut scores: [(&str, f64); 6] = [
        ("bitcoin_core", 0.0),
        ("electrum", 0.0),
        ("wasabi", 0.0),
        ("samourai", 0.0),
        ("sparrow", 0.0),
        ("exchange", 0.0),
    ];
    let mut add = |scores: &mut [(&str, f64); 6], name: &str, delta: f64| {
        for entry in scores.iter_mut() {
            if entry.0 == name {
                entry.1 += delta;
                break;
            }
        }
    };

    // Bitcoin Core: native segwit, random ordering since v0.19.
    if fp.input_script_types == "segwit" && !fp.is_bip69 {
        add(&mut scores, "bitcoin_core", 0.3);
    }
    if fp.input_script_types == "segwit" && fp.output_script_types == "segwit" {
        add(&mut scores, "bitcoin_core", 0.2);
    }

    // Electrum implements BIP69.
    if fp.is_bip69 && fp.input_script_types == "segwit" {
        add(&mut scores, "electrum", 0.4);
    }

    // Samourai/Whirlpool uses BIP69.
    if fp.is_bip69 {
        add(&mut scores, "samourai", 0.2);
    }

    // Wasabi: mixed output types, many equal-denomination outputs.
    if fp.has_mixed_types && tx.outputs.len() >= 10 {
        add(&mut scores, "wasabi", 0.3);
    }

    // Sparrow: Taproot-first.
    if fp.input_script_types == "taproot" {
        add(&mut scores, "sparrow", 0.3);
    }
    if fp.input_script_types == "taproot" && fp.output_script_types == "taproot" {
        add(&mut scores, "sparrow", 0.2);
    }

    // Exchange: batched payouts and sweeps.
    if fp.is_batched {
        add(&mut scores, "exchange", 0.5);
    }
    if fp.is_consolidation {
        add(&mut scores, "exchange", 0.3);
    }

    // Legacy P2PKH inputs suggest old wallets.
    if fp.input_script_types == "legacy" {
        add(&mut scores, "bitcoin_core", 0.1);
    }
    if fp.input_script_types == "p2sh-segwit" {
        add(&mut scores, "bitcoin_core", 0.05);
    }

    // nLockTime: block-height locktime is Core's anti-fee-sniping signature;
    // most non-Core wallets leave it at zero.
    if tx.locktime > 0 && tx.locktime < 500_000_000 {
        add(&mut scores, "bitcoin_core", 0.25);
    }
    if tx.locktime == 0 {
        add(&mut scores, "electrum", 0.1);
        add(&mut scores, "samourai", 0.1);
    }

    // RBF signaling (BIP125): Electrum always, Core sometimes; absence
    // points at Samourai and privacy wallets.
    let has_rbf = tx
        .inputs
        .iter()
        .any(|i| i.sequence > 0 && i.sequence < 0xFFFF_FFFE);
    if has_rbf {
        add(&mut scores, "electrum", 0.15);
        add(&mut scores, "bitcoin_core", 0.1);
    } else {
        add(&mut scores, "samourai", 0.1);
    }

    match tx.version {
        2 => {
            add(&mut scores, "bitcoin_core", 0.05);
            add(&mut scores, "electrum", 0.05);
        }
        1 => add(&mut scores, "samourai", 0.1),
        _ => {}
    }

    let (best_wallet, best_score) = scores
        .iter()
        .fold(("unknown", 0.0), |acc, &(name, score)| {
            if score > acc.1 {
                (name, score)
            } else {
                acc
            }
        });

    if best_score >= 0.2 {
        fp.wallet_family = best_wallet.to_string();
        fp.confidence = best_score;
    } else {
        fp.wallet_family = "unknown".to_string();
        fp.confidence = 0.0;
    }

    fp
}

/// Identify the specific Whirlpool pool for a transaction already flagged
/// with the Whirlpool structure: dominant equal-value output matched against
/// known pool denominations with ±1% coordinator-fee tolerance.
pub fn identify_whirlpool_pool(tx: &Transaction) -> Option<WhirlpoolPoolInfo> {
    if tx.outputs.len() < 5 {
        return None;
    }

    let (dominant_value, dominant_count) =
        crate::core::modal_value(tx.outputs.iter().filter(|o| o.value > 0).map(|o| o.value));

    if dominant_count < 5 {
        return None;
    }

    for &(pool_id, denom) in WHIRLPOOL_POOLS {
        let tolerance = denom / 100;
        if dominant_value >= denom - tolerance && dominant_value <= denom + tolerance {
            // Coordinator fee output: much smaller than the pool denomination.
            let coordinator_fee = tx
                .outputs
                .iter()
                .find(|o| o.value != dominant_value && o.value > 0 && o.value < denom / 10)
                .map(|o| o.value)
                .unwrap_or(0);

            return Some(WhirlpoolPoolInfo {
                pool_id: pool_id.to_string(),
                denom_sats: dominant_value,
                num_participants: dominant_count,
                is_surge: dominant_count > 5,
                coordinator_fee,
            });
        }
    }

    None
}

/// BIP69 lexicographic ordering: inputs by (txid asc, vout asc), outputs by
/// (value asc, scriptPubKey asc).
pub fn check_bip69_ordering(tx: &Transaction) -> bool {
    if tx.inputs.len() <= 1 && tx.outputs.len() <= 1 {
        return true; // trivially ordered
    }

    let inputs_sorted = tx.inputs.windows(2).all(|w| {
        w[0].txid < w[1].txid || (w[0].txid == w[1].txid && w[0].vout <= w[1].vout)
    });

    let outputs_sorted = tx.outputs.windows(2).all(|w| {
        w[0].value < w[1].value
            || (w[0].value == w[1].value && w[0].script_pubkey <= w[1].script_pubkey)
    });

    inputs_sorted && outputs_sorted
}

fn dominant_type(types: &HashMap<AddressType, usize>) -> String {
    let mut best: Option<(AddressType, usize)> = None;
    for (&t, &c) in types {
        match best {
            None => best = Some((t, c)),
            // Tie-break on the type name so map order never shows through.
            Some((bt, bc)) if c > bc || (c == bc && t.as_str() < bt.as_str()) => {
                best = Some((t, c))
            }
            _ => {}
        }
    }
    best.map(|(t, _)| t.as_str().to_string()).unwrap_or_default()
}
