//! Address type migration tracking.
//!
//! When an entity migrates legacy→SegWit→Taproot the address format changes
//! but the entity does not. The input format distribution places the entity
//! on the adoption curve and exposes transitional (mixed-type) spends.

use serde::{Deserialize, Serialize};

use crate::core::{address_type, AddressType, Transaction};

/// Address format migration analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub legacy_ratio: f64,
    pub segwit_ratio: f64,
    pub taproot_ratio: f64,
    pub p2sh_ratio: f64,
    /// "legacy"/"transitioning"/"native-segwit"/"wrapped-segwit"/
    /// "taproot-adopter"/"unknown"
    pub migration_stage: String,
    pub has_mixed_types: bool,
    /// Address type of the likely change output.
    pub change_format: String,
}

impl Default for MigrationResult {
    fn default() -> Self {
        Self {
            legacy_ratio: 0.0,
            segwit_ratio: 0.0,
            taproot_ratio: 0.0,
            p2sh_ratio: 0.0,
            migration_stage: "unknown".to_string(),
            has_mixed_types: false,
            change_format: "unknown".to_string(),
        }
    }
}

/// Analyze the address format distribution across inputs.
pub fn detect_address_migration(tx: &Transaction) -> MigrationResult {
    let mut result = MigrationResult::default();

    if tx.inputs.is_empty() {
        return result;
    }

    let mut legacy = 0usize;
    let mut segwit = 0usize;
    let mut taproot = 0usize;
    let mut p2sh = 0usize;

    for input in &tx.inputs {
        match address_type(&input.address) {
            AddressType::Legacy => legacy += 1,
            AddressType::Segwit => segwit += 1,
            AddressType::Taproot => taproot += 1,
            AddressType::P2shSegwit => p2sh += 1,
            AddressType::Unknown => {}
        }
    }

    let total = tx.inputs.len() as f64;
    result.legacy_ratio = legacy as f64 / total;
    result.segwit_ratio = segwit as f64 / total;
    result.taproot_ratio = taproot as f64 / total;
    result.p2sh_ratio = p2sh as f64 / total;

    let known_types = [legacy, segwit, taproot, p2sh]
        .iter()
        .filter(|&&c| c > 0)
        .count();
    result.has_mixed_types = known_types > 1;

    result.migration_stage = classify_migration_stage(&result).to_string();
    result.change_format = detect_change_format(tx).to_string();

    result
}

fn classify_migration_stage(m: &MigrationResult) -> &'static str {
    if m.taproot_ratio > 0.5 {
        "taproot-adopter"
    } else if m.taproot_ratio > 0.0 && (m.segwit_ratio > 0.0 || m.legacy_ratio > 0.0) {
        "transitioning"
    } else if m.segwit_ratio > 0.5 {
        "native-segwit"
    } else if m.segwit_ratio > 0.0 && m.legacy_ratio > 0.0 {
        "transitioning"
    } else if m.p2sh_ratio > 0.5 {
        "wrapped-segwit"
    } else if m.legacy_ratio > 0.5 {
        "legacy"
    } else {
        "unknown"
    }
}

/// The change output's format reveals the wallet's current default. The
/// smallest output of a non-CoinJoin spend stands in for the change.
fn detect_change_format(tx: &Transaction) -> &'static str {
    if tx.outputs.len() < 2 {
        return "unknown";
    }

    let mut smallest_idx = 0;
    let mut smallest_val = tx.outputs[0].value;
    for (i, out) in tx.outputs.iter().enumerate() {
        if out.value < smallest_val && out.value > 0 {
            smallest_val = out.value;
            smallest_idx = i;
        }
    }

    address_type(&tx.outputs[smallest_idx].address).as_str()
}

/// Address format usage across both sides of the transaction.
pub fn format_distribution(tx: &Transaction) -> std::collections::HashMap<&'static str, usize> {
    let mut dist: std::collections::HashMap<&'static str, usize> =
        [("legacy", 0), ("segwit", 0), ("taproot", 0), ("p2sh-segwit", 0)]
            .into_iter()
            .collect();

    for addr in tx
        .inputs
        .iter()
        .map(|i| i.address.as_str())
        .chain(tx.outputs.iter().map(|o| o.address.as_str()))
    {
        let t = address_type(addr);
        if t != AddressType::Unknown {
            *dist.get_mut(t.as_str()).unwrap() += 1;
        }
    }

    dist
}
