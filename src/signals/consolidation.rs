//! Consolidation intelligence.
//!
//! How an entity manages UTXOs identifies it: exchanges sweep massively
//! during low-fee windows, services batch weekly, privacy wallets avoid
//! consolidation entirely, and miners merge equal coinbase payouts after
//! maturity.

use serde::{Deserialize, Serialize};

use crate::core::Transaction;

/// Estimated vbytes per consolidated P2WPKH input.
const INPUT_VBYTES: i64 = 68;

/// Assumed future fee rate for the savings estimate, sat/vB.
const FUTURE_FEE_RATE: i64 = 10;

/// UTXO consolidation analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    pub is_consolidation: bool,
    /// "exchange-sweep"/"service-batch"/"user-cleanup"/"miner-maturity"/"generic"/"none"
    pub consolidation_type: String,
    /// (inputs − outputs) / inputs: 1.0 = maximum consolidation.
    pub input_reduction: f64,
    /// Output value / input value: higher = better value preservation.
    pub fee_efficiency: f64,
    /// Low fee rate implies a planned consolidation.
    pub is_strategic_timing: bool,
    /// Estimated future fee savings in satoshis.
    pub estimated_savings: i64,
}

impl Default for ConsolidationResult {
    fn default() -> Self {
        Self {
            is_consolidation: false,
            consolidation_type: "none".to_string(),
            input_reduction: 0.0,
            fee_efficiency: 0.0,
            is_strategic_timing: false,
            estimated_savings: 0,
        }
    }
}

/// Detect and classify UTXO consolidation: ≥3 inputs into ≤2 outputs.
pub fn analyze_consolidation(tx: &Transaction) -> ConsolidationResult {
    let mut result = ConsolidationResult::default();

    let n_in = tx.inputs.len();
    let n_out = tx.outputs.len();

    if n_in < 3 || n_out > 2 {
        return result;
    }

    result.is_consolidation = true;
    result.input_reduction =
        (((n_in - n_out) as f64 * 100.0) / n_in as f64).round() / 100.0;

    let total_input = tx.total_input_value();
    let total_output = tx.total_output_value();
    if total_input > 0 {
        result.fee_efficiency =
            ((total_output as f64 * 10_000.0) / total_input as f64).round() / 10_000.0;
    }

    if tx.fee > 0 && tx.vsize > 0 {
        let fee_rate = tx.fee as f64 / tx.vsize as f64;
        result.is_strategic_timing = fee_rate < 5.0;
    }

    // Spending N UTXOs now saves (N−1) inputs in future transactions.
    result.estimated_savings = (n_in as i64 - 1) * INPUT_VBYTES * FUTURE_FEE_RATE;

    result.consolidation_type = classify_consolidation_type(tx, &result).to_string();
    result
}

fn classify_consolidation_type(tx: &Transaction, cr: &ConsolidationResult) -> &'static str {
    let n_in = tx.inputs.len();
    let n_out = tx.outputs.len();

    if n_in >= 50 && n_out == 1 && cr.is_strategic_timing {
        "exchange-sweep"
    } else if n_in >= 20 && n_out == 1 {
        "exchange-sweep"
    } else if n_in >= 10 && n_out <= 2 && cr.is_strategic_timing {
        "service-batch"
    } else if n_in >= 5 && n_out == 1 {
        "user-cleanup"
    } else if n_in >= 3 && n_out == 1 && has_equal_input_values(tx) {
        "miner-maturity"
    } else if n_in >= 3 && n_out <= 2 {
        "user-cleanup"
    } else {
        "generic"
    }
}

/// Whether more than half of the inputs share a bucketed value, the
/// signature of coinbase or pool-payout consolidation.
fn has_equal_input_values(tx: &Transaction) -> bool {
    if tx.inputs.len() < 3 {
        return false;
    }

    let mut buckets: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for input in &tx.inputs {
        let bucket = input.value / 1_000 * 1_000;
        *buckets.entry(bucket).or_insert(0) += 1;
    }

    let threshold = tx.inputs.len() / 2;
    buckets.values().any(|&c| c >= threshold)
}

/// Break-even future fee rate for a consolidation: when future fees exceed
/// this rate, consolidating now was profitable.
pub fn consolidation_break_even(input_count: usize, fees_paid: i64) -> f64 {
    if input_count <= 1 || fees_paid <= 0 {
        return 0.0;
    }
    let future_vbytes = (input_count as f64 - 1.0) * INPUT_VBYTES as f64;
    ((fees_paid as f64 / future_vbytes) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    fn tx(input_vals: &[i64], output_vals: &[i64], fee: i64, vsize: i64) -> Transaction {
        Transaction {
            fee,
            vsize,
            inputs: input_vals
                .iter()
                .map(|&value| TxIn { value, ..Default::default() })
                .collect(),
            outputs: output_vals
                .iter()
                .map(|&value| TxOut { value, ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn not_a_consolidation() {
        let result = analyze_consolidation(&tx(&[100, 200], &[290], 10, 100));
        assert!(!result.is_consolidation);
        assert_eq!(result.consolidation_type, "none");
    }

    #[test]
    fn user_cleanup_shape() {
        let result = analyze_consolidation(&tx(
            &[100_000, 233_000, 157_000, 90_000, 80_000],
            &[655_000],
            5_000,
            700,
        ));
        assert!(result.is_consolidation);
        assert_eq!(result.consolidation_type, "user-cleanup");
        assert!((result.input_reduction - 0.8).abs() < 1e-9);
        assert_eq!(result.estimated_savings, 4 * 68 * 10);
    }

    #[test]
    fn exchange_sweep_large_fanin() {
        let inputs = vec![1_000_000; 25];
        let result = analyze_consolidation(&tx(&inputs, &[24_900_000], 100_000, 25_000));
        assert_eq!(result.consolidation_type, "exchange-sweep");
        assert!(result.is_strategic_timing);
    }

    #[test]
    fn service_batch_low_fee() {
        let inputs = vec![500_333; 12];
        let result = analyze_consolidation(&tx(&inputs, &[5_900_000, 100_000], 4_000, 1_700));
        assert!(result.is_strategic_timing);
        assert_eq!(result.consolidation_type, "service-batch");
    }

    #[test]
    fn miner_maturity_equal_inputs() {
        let result = analyze_consolidation(&tx(
            &[312_500_000, 312_500_000, 312_500_000],
            &[937_400_000],
            100_000,
            500,
        ));
        assert_eq!(result.consolidation_type, "miner-maturity");
    }

    #[test]
    fn fee_efficiency_ratio() {
        let result = analyze_consolidation(&tx(&[400_000, 300_000, 300_000], &[990_000], 10_000, 500));
        assert!((result.fee_efficiency - 0.99).abs() < 1e-9);
    }

    #[test]
    fn break_even_rate() {
        assert_eq!(consolidation_break_even(1, 5_000), 0.0);
        assert_eq!(consolidation_break_even(10, 0), 0.0);
        // 5 inputs, 2720 sats → 2720 / (4·68) = 10 sat/vB.
        assert!((consolidation_break_even(5, 2_720) - 10.0).abs() < 1e-9);
    }
}
