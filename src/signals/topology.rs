//! UTXO graph topology: the shape of a transaction reveals its purpose.
//! Fan-in/fan-out, I/O symmetry, Gini concentration of output values, and a
//! shape classification separating payments, peel steps, consolidations,
//! batch payouts, mixes and hubs.

use crate::core::{TopologyResult, Transaction, TxOut};

/// Compute graph-theoretic metrics and classify the transaction shape.
pub fn analyze_topology(tx: &Transaction) -> TopologyResult {
    let fan_in = tx.inputs.len();
    let fan_out = tx.outputs.len();

    let max_io = fan_in.max(fan_out) as f64;
    let io_symmetry = if max_io > 0.0 {
        (((fan_in as f64 - fan_out as f64).abs() * 100.0) / max_io).round() / 100.0
    } else {
        0.0
    };

    let gini = gini_coefficient(&tx.outputs);

    let mut result = TopologyResult {
        fan_in,
        fan_out,
        io_symmetry,
        gini_coefficient: gini,
        value_concentration: classify_value_concentration(gini).to_string(),
        is_hub: fan_in >= 10 || fan_out >= 10,
        shape: String::new(),
    };
    result.shape = classify_shape(&result).to_string();
    result
}

/// Gini coefficient of output values: 0 = all equal (perfect mix),
/// 1 = all value in one output. G = 2·Σᵢ i·yᵢ / (n·Σy) − (n+1)/n over
/// ascending-sorted values.
pub fn gini_coefficient(outputs: &[TxOut]) -> f64 {
    let n = outputs.len();
    if n <= 1 {
        return 0.0;
    }

    let mut values: Vec<f64> = outputs.iter().map(|o| o.value as f64).collect();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let weighted: f64 = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();

    let gini = (2.0 * weighted) / (n as f64 * total) - (n as f64 + 1.0) / n as f64;
    ((gini.clamp(0.0, 1.0)) * 100.0).round() / 100.0
}

fn classify_value_concentration(gini: f64) -> &'static str {
    if gini <= 0.2 {
        "dispersed"
    } else if gini <= 0.5 {
        "moderate"
    } else {
        "concentrated"
    }
}

fn classify_shape(topo: &TopologyResult) -> &'static str {
    let (fan_in, fan_out) = (topo.fan_in, topo.fan_out);

    if fan_in <= 2 && fan_out <= 2 {
        if fan_in == 1 && fan_out == 2 {
            return "peel-step";
        }
        return "simple-payment";
    }

    if fan_in >= 3 && fan_out == 1 {
        return "consolidation";
    }

    if fan_in <= 3 && fan_out >= 5 {
        return "batch-payout";
    }

    if topo.io_symmetry <= 0.2 && fan_in >= 5 && fan_out >= 5 {
        return "mixing";
    }

    if fan_in >= 10 || fan_out >= 10 {
        return "hub";
    }

    if fan_in >= 2 && (3..=5).contains(&fan_out) {
        return "multi-payment";
    }

    "complex"
}

/// Fan-out / fan-in ratio: > 1 = payout-dominant, < 1 = consolidation,
/// ≈ 1 = symmetric (mixing).
pub fn fan_ratio(tx: &Transaction) -> f64 {
    if tx.inputs.is_empty() {
        return 0.0;
    }
    ((tx.outputs.len() as f64 / tx.inputs.len() as f64) * 100.0).round() / 100.0
}

/// Largest output as a fraction of total input value.
pub fn value_flow(tx: &Transaction) -> f64 {
    let total_input = tx.total_input_value();
    if total_input <= 0 {
        return 0.0;
    }
    let max_output = tx.outputs.iter().map(|o| o.value).max().unwrap_or(0);
    ((max_output as f64 * 100.0) / total_input as f64).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TxIn;

    fn tx(n_in: usize, output_vals: &[i64]) -> Transaction {
        Transaction {
            inputs: (0..n_in)
                .map(|_| TxIn { value: 1_000_000, ..Default::default() })
                .collect(),
            outputs: output_vals
                .iter()
                .map(|&value| TxOut { value, ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn gini_equal_outputs_is_zero() {
        let t = tx(5, &[100, 100, 100, 100, 100]);
        assert_eq!(gini_coefficient(&t.outputs), 0.0);
    }

    #[test]
    fn gini_concentrated() {
        let t = tx(1, &[1, 1, 1, 1_000_000]);
        assert!(gini_coefficient(&t.outputs) > 0.7);
    }

    #[test]
    fn gini_degenerate_cases() {
        assert_eq!(gini_coefficient(&[]), 0.0);
        assert_eq!(gini_coefficient(&tx(1, &[100]).outputs), 0.0);
        assert_eq!(gini_coefficient(&tx(1, &[0, 0]).outputs), 0.0);
    }

    #[test]
    fn peel_step_shape() {
        let result = analyze_topology(&tx(1, &[60_000, 39_000]));
        assert_eq!(result.shape, "peel-step");
        assert!(!result.is_hub);
    }

    #[test]
    fn simple_payment_shape() {
        let result = analyze_topology(&tx(2, &[99_000]));
        assert_eq!(result.shape, "simple-payment");
    }

    #[test]
    fn consolidation_shape() {
        let result = analyze_topology(&tx(8, &[7_900_000]));
        assert_eq!(result.shape, "consolidation");
        assert_eq!(result.fan_in, 8);
    }

    #[test]
    fn batch_payout_shape() {
        let result = analyze_topology(&tx(2, &[10, 20, 30, 40, 50, 60]));
        assert_eq!(result.shape, "batch-payout");
    }

    #[test]
    fn mixing_shape_symmetric() {
        let result = analyze_topology(&tx(6, &[100, 100, 100, 100, 100, 100]));
        assert_eq!(result.shape, "mixing");
        assert!(result.io_symmetry <= 0.2);
        assert_eq!(result.value_concentration, "dispersed");
    }

    #[test]
    fn hub_detection() {
        let result = analyze_topology(&tx(12, &[100, 200, 300, 400]));
        assert!(result.is_hub);
        assert_eq!(result.shape, "hub");
    }

    #[test]
    fn fan_ratio_and_value_flow() {
        let t = tx(2, &[1_500_000, 100_000]);
        assert!((fan_ratio(&t) - 1.0).abs() < 1e-9);
        assert!((value_flow(&t) - 0.75).abs() < 1e-9);

        let empty = Transaction::default();
        assert_eq!(fan_ratio(&empty), 0.0);
        assert_eq!(value_flow(&empty), 0.0);
    }
}
