//! Exchange exit detection.
//!
//! The cash-out moment — stolen funds reaching an exchange deposit address
//! — is where KYC records become subpoenable. Detection layers: known hot
//! wallet prefixes, structural deposit patterns, and behavioral sweeps.

use serde::{Deserialize, Serialize};

use crate::core::{address_type, AddressType, Transaction};

/// Exchange deposit detection result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeExitResult {
    pub is_exchange_deposit: bool,
    pub exchange_name: String,
    pub confidence: f64,
    pub deposit_value: i64,
    /// "address_match"/"pattern"/"behavioral"
    pub detection_method: String,
}

/// Known exchange address prefixes. A production deployment backs this
/// with a tag database of millions of addresses; this is the warm set.
const KNOWN_EXCHANGE_PREFIXES: &[(&str, &str)] = &[
    ("bc1qm34lsc65zpw79lxes69zkqm", "Binance"),
    ("1NDyJtNTjmwk5xPNhjgAMu4HDH", "Binance"),
    ("3JZq4atUahhuA9rLhXLMhhTo133", "Binance"),
    ("3Cbq7aT1tY8kMxWLbitaG7yT6bP", "Coinbase"),
    ("3CD1QW6fjgTwKq3Pj97nty28WZA", "Coinbase"),
    ("bc1qxy2kgdygjrsqtzq2n0yrf24", "Coinbase"),
    ("3FHNBLobJnbCTFTVakh5TXlt", "Bitfinex"),
    ("bc1qgdjqv0av3q56jvd82tk", "Bitfinex"),
    ("3AfBdeS2QYHSM3PQ9bfXuUbJPMi", "Kraken"),
    ("bc1qxp3x5mqr6t5mhqkze3vj", "Kraken"),
];

/// Analyze a transaction for exchange deposit patterns.
pub fn detect_exchange_exit(tx: &Transaction) -> ExchangeExitResult {
    // Direct address match against known exchange addresses.
    for out in &tx.outputs {
        for &(prefix, exchange) in KNOWN_EXCHANGE_PREFIXES {
            if out.address.starts_with(prefix) {
                return ExchangeExitResult {
                    is_exchange_deposit: true,
                    exchange_name: exchange.to_string(),
                    confidence: 0.95,
                    deposit_value: out.value,
                    detection_method: "address_match".to_string(),
                };
            }
        }
    }

    let pattern = match_deposit_pattern(tx);
    if pattern.is_exchange_deposit {
        return pattern;
    }

    detect_sweep_behavior(tx)
}

/// Structural deposit shape: few outputs, a P2SH destination above the
/// typical deposit minimum.
fn match_deposit_pattern(tx: &Transaction) -> ExchangeExitResult {
    if tx.outputs.len() > 3 {
        return ExchangeExitResult::default();
    }

    for out in &tx.outputs {
        if address_type(&out.address) == AddressType::P2shSegwit && out.value >= 100_000 {
            return ExchangeExitResult {
                is_exchange_deposit: true,
                exchange_name: "unknown (P2SH deposit pattern)".to_string(),
                confidence: 0.4,
                deposit_value: out.value,
                detection_method: "pattern".to_string(),
            };
        }
    }

    ExchangeExitResult::default()
}

/// Behavioral sweep: a single segwit input swept whole into a P2SH output.
fn detect_sweep_behavior(tx: &Transaction) -> ExchangeExitResult {
    if tx.inputs.len() != 1 || tx.outputs.len() != 1 {
        return ExchangeExitResult::default();
    }

    let input_type = address_type(&tx.inputs[0].address);
    let output_type = address_type(&tx.outputs[0].address);

    if input_type == AddressType::Segwit
        && output_type == AddressType::P2shSegwit
        && tx.outputs[0].value >= 1_000_000
    {
        return ExchangeExitResult {
            is_exchange_deposit: true,
            exchange_name: "unknown (sweep-to-P2SH pattern)".to_string(),
            confidence: 0.3,
            deposit_value: tx.outputs[0].value,
            detection_method: "behavioral".to_string(),
        };
    }

    ExchangeExitResult::default()
}

/// Whether an address belongs to a known exchange.
pub fn known_exchange_address(addr: &str) -> Option<&'static str> {
    KNOWN_EXCHANGE_PREFIXES
        .iter()
        .find(|(prefix, _)| addr.starts_with(prefix))
        .map(|&(_, name)| name)
}
