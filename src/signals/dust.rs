//! Dust attack detection.
//!
//! Dust attacks plant tiny UTXOs at target addresses; when a wallet later
//! consolidates the dust with real UTXOs, the attacker links the addresses.
//! Outputs at or below the per-type relay dust threshold count as dust, and
//! the combination of dusty inputs/outputs classifies the intent.

use crate::core::{address_type, AddressType, DustResult, Transaction};

pub const DUST_THRESHOLD_P2PKH: i64 = 546;
pub const DUST_THRESHOLD_P2SH: i64 = 540;
pub const DUST_THRESHOLD_P2WPKH: i64 = 294;
pub const DUST_THRESHOLD_P2TR: i64 = 330;
pub const DUST_THRESHOLD_GENERIC: i64 = 546;

/// Relay dust limit for the given address.
pub fn dust_threshold(addr: &str) -> i64 {
    match address_type(addr) {
        AddressType::Taproot => DUST_THRESHOLD_P2TR,
        AddressType::Segwit => DUST_THRESHOLD_P2WPKH,
        AddressType::P2shSegwit => DUST_THRESHOLD_P2SH,
        AddressType::Legacy => DUST_THRESHOLD_P2PKH,
        AddressType::Unknown => DUST_THRESHOLD_GENERIC,
    }
}

/// Analyze both sides of a transaction for dust involvement: outputs
/// (sending dust = potential attack) and inputs (spending dust = the
/// dangerous post-attack consolidation).
pub fn detect_dust_attack(tx: &Transaction) -> DustResult {
    let mut result = DustResult::default();

    for out in &tx.outputs {
        let threshold = dust_threshold(&out.address);
        if out.value > 0 && out.value <= threshold {
            result.has_dust_outputs = true;
            result.dust_output_count += 1;
            result.total_dust_value += out.value;
        }
    }

    for input in &tx.inputs {
        let threshold = dust_threshold(&input.address);
        if input.value > 0 && input.value <= threshold {
            result.has_dust_inputs = true;
            result.dust_input_count += 1;
            result.total_dust_value += input.value;
        }
    }

    result.intent = classify_dust_intent(tx, &result).to_string();
    result.risk_level = assess_dust_risk(&result).to_string();

    result
}

/// Likely purpose of the dust:
///   surveillance  — dust scattered to ≥3 distinct addresses, or a single
///                   dust probe riding along a real payment
///   spam          — bulk dust to few addresses
///   consolidation — dust inputs swept alongside real inputs (trap sprung)
fn classify_dust_intent(tx: &Transaction, dust: &DustResult) -> &'static str {
    if dust.has_dust_outputs && dust.dust_output_count >= 3 {
        let unique: std::collections::HashSet<&str> = tx
            .outputs
            .iter()
            .filter(|o| o.value > 0 && o.value <= dust_threshold(&o.address))
            .map(|o| o.address.as_str())
            .collect();
        if unique.len() >= 3 {
            return "surveillance";
        }
        return "spam";
    }

    if dust.has_dust_inputs && tx.inputs.len() > dust.dust_input_count {
        return "consolidation";
    }

    if dust.has_dust_outputs && dust.dust_output_count == 1 {
        let non_dust = tx
            .outputs
            .iter()
            .filter(|o| o.value > dust_threshold(&o.address))
            .count();
        if non_dust >= 1 {
            return "surveillance";
        }
    }

    "none"
}

/// Severity of the dust threat.
fn assess_dust_risk(dust: &DustResult) -> &'static str {
    match dust.intent.as_str() {
        "consolidation" => {
            if dust.dust_input_count >= 3 {
                "critical"
            } else {
                "high"
            }
        }
        "surveillance" => {
            if dust.dust_output_count >= 5 {
                "high"
            } else {
                "medium"
            }
        }
        "spam" => "low",
        _ => "none",
    }
}
