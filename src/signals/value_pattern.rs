//! Value fingerprinting.
//!
//! Specific satoshi amounts identify services and protocols: exchange
//! withdrawal fee schedules, psychologically round BTC denominations, and
//! the Shannon entropy of the output value distribution.

use crate::core::{Transaction, ValuePatternResult};

use super::unmix::output_value_entropy;

/// Known exchange withdrawal fee amounts in satoshis.
const KNOWN_SERVICE_FEES: &[(&str, &[i64])] = &[
    ("binance", &[50_000, 40_000, 30_000, 20_000]),
    ("coinbase", &[1_000, 2_000, 5_000, 10_000]),
    ("kraken", &[15_000, 10_000]),
    ("gemini", &[1_000]),
    ("bitfinex", &[4_000, 6_000]),
];

/// Psychologically round BTC denominations in satoshis.
const ROUND_BTC_AMOUNTS: &[i64] = &[
    100_000,     // 0.001 BTC
    500_000,     // 0.005 BTC
    1_000_000,   // 0.01 BTC
    5_000_000,   // 0.05 BTC
    10_000_000,  // 0.1 BTC
    50_000_000,  // 0.5 BTC
    100_000_000, // 1.0 BTC
    200_000_000, // 2.0 BTC
    500_000_000, // 5.0 BTC
];

/// Comprehensive value fingerprinting over transaction outputs.
pub fn analyze_value_patterns(tx: &Transaction) -> ValuePatternResult {
    let mut result = ValuePatternResult::default();

    for out in &tx.outputs {
        if is_round_btc_amount(out.value) {
            result.has_round_btc = true;
        }
        if is_round_sats_amount(out.value) {
            result.has_round_sats = true;
        }
    }

    result.known_service_fee = match_known_service_fee(tx).to_string();
    result.output_value_entropy = output_value_entropy(&tx.outputs);

    let (dominant, _) = crate::core::modal_value(tx.outputs.iter().map(|o| o.value));
    result.dominant_denomination = dominant;

    if !tx.outputs.is_empty() {
        let distinct: std::collections::HashSet<i64> =
            tx.outputs.iter().map(|o| o.value).collect();
        result.unique_value_ratio =
            ((distinct.len() as f64 * 100.0) / tx.outputs.len() as f64).round() / 100.0;
    }

    result
}

/// Exact match against the round BTC denomination table.
pub fn is_round_btc_amount(sats: i64) -> bool {
    ROUND_BTC_AMOUNTS.contains(&sats)
}

/// "Round" satoshi amounts: multiples of 10k, 50k, or 100k sats.
pub fn is_round_sats_amount(sats: i64) -> bool {
    if sats <= 0 {
        return false;
    }
    sats % 100_000 == 0 || sats % 50_000 == 0 || sats % 10_000 == 0
}

/// Match the transaction fee against known exchange withdrawal schedules
/// with ±5% tolerance (floored at 100 sats), falling back to a generic
/// exchange pattern for clean multiples of 1000 in the 10k-100k band.
fn match_known_service_fee(tx: &Transaction) -> &'static str {
    if tx.fee <= 0 {
        return "none";
    }

    for &(service, fees) in KNOWN_SERVICE_FEES {
        for &known in fees {
            if known == 0 {
                continue;
            }
            let tolerance = (known / 20).max(100);
            if tx.fee >= known - tolerance && tx.fee <= known + tolerance {
                return service;
            }
        }
    }

    if (10_000..=100_000).contains(&tx.fee) && tx.fee % 1_000 == 0 {
        return "exchange-generic";
    }

    "none"
}

/// Combine fee pattern and output structure to identify likely exchange
/// withdrawal transactions. Returns (is_withdrawal, service).
pub fn detect_exchange_withdrawal(tx: &Transaction) -> (bool, String) {
    // Withdrawals come from a hot wallet (few inputs) and batch payouts.
    if tx.inputs.len() > 5 || tx.outputs.len() < 3 {
        return (false, String::new());
    }

    let service = match_known_service_fee(tx);
    if service != "none" && service != "exchange-generic" {
        return (true, service.to_string());
    }

    if tx.outputs.len() >= 5 && tx.fee > 0 && tx.vsize > 0 {
        let fee_rate = tx.fee as f64 / tx.vsize as f64;
        if fee_rate > 0.0 && fee_rate % 1.0 < 0.01 {
            return (true, "exchange-generic".to_string());
        }
    }

    (false, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    fn tx(fee: i64, output_vals: &[i64]) -> Transaction {
        Transaction {
            fee,
            inputs: vec![TxIn { value: 1_000_000_000, ..Default::default() }],
            outputs: output_vals
                .iter()
                .map(|&value| TxOut { value, ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn round_btc_table() {
        assert!(is_round_btc_amount(100_000_000));
        assert!(is_round_btc_amount(5_000_000));
        assert!(!is_round_btc_amount(5_000_001));
        assert!(!is_round_btc_amount(0));
    }

    #[test]
    fn round_sats_multiples() {
        assert!(is_round_sats_amount(20_000));
        assert!(is_round_sats_amount(150_000));
        assert!(!is_round_sats_amount(12_345));
        assert!(!is_round_sats_amount(-1));
    }

    #[test]
    fn binance_fee_matched_with_tolerance() {
        let result = analyze_value_patterns(&tx(50_000, &[100_000_000]));
        assert_eq!(result.known_service_fee, "binance");

        // Within 5%.
        let result = analyze_value_patterns(&tx(49_000, &[100_000_000]));
        assert_eq!(result.known_service_fee, "binance");
    }

    #[test]
    fn generic_exchange_fee() {
        let result = analyze_value_patterns(&tx(77_000, &[100_000_000]));
        assert_eq!(result.known_service_fee, "exchange-generic");
    }

    #[test]
    fn no_fee_no_service() {
        let result = analyze_value_patterns(&tx(0, &[100_000_000]));
        assert_eq!(result.known_service_fee, "none");
    }

    #[test]
    fn dominant_denomination_and_unique_ratio() {
        let result = analyze_value_patterns(&tx(500, &[100, 100, 100, 200]));
        assert_eq!(result.dominant_denomination, 100);
        assert_eq!(result.unique_value_ratio, 0.5);
    }

    #[test]
    fn withdrawal_detection_by_fee() {
        let t = tx(15_000, &[100, 200, 300]);
        let (is_withdrawal, service) = detect_exchange_withdrawal(&t);
        assert!(is_withdrawal);
        assert_eq!(service, "kraken");
    }

    #[test]
    fn withdrawal_rejected_for_many_inputs() {
        let mut t = tx(15_000, &[100, 200, 300]);
        t.inputs = (0..6)
            .map(|_| TxIn { value: 1_000, ..Default::default() })
            .collect();
        assert!(!detect_exchange_withdrawal(&t).0);
    }

    #[test]
    fn batch_with_whole_fee_rate_is_generic() {
        let mut t = tx(2_600, &[100, 200, 300, 400, 500]);
        t.vsize = 260; // exactly 10 sat/vB, off every known fee tier
        let (is_withdrawal, service) = detect_exchange_withdrawal(&t);
        assert!(is_withdrawal);
        assert_eq!(service, "exchange-generic");
    }
}
