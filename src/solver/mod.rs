//! Fee-tolerant subset-sum anonymity-set solver portfolio.
//!
//! The primary lane is an anytime Meet-in-the-Middle search over output
//! subsets; when it proves only a single linkage on a transaction whose
//! structure promises more, the bounded DP-bitset and constraint-propagation
//! lanes are deployed. Every lane has a deterministic refusal gate so the
//! solver never hangs on adversarial WabiSabi/surge transactions.

pub mod cpsat;
pub mod dp;

use tracing::debug;

use crate::core::{modal_value, TxIn, TxOut};

/// Hard cap on combinatorial search: above 15 inputs or outputs the solver
/// falls back to structural counting.
const MAX_COMBINATORIAL_SIDE: usize = 15;

/// Pseudo-polynomial DP lane refuses above this total output value.
pub const DP_VALUE_CAP: i64 = 500_000;

/// Fee tolerance in satoshis for the given fee rate, floored at 1000 sats.
fn fee_tolerance(fee_rate: f64) -> i64 {
    let tau = (fee_rate * 150.0).round() as i64;
    tau.max(1000)
}

/// Calculate the anonymity set: the number of inputs provably consistent
/// with funding the modal mixed denomination, bounded by the structural
/// maximum. Returns 0 when the transaction has no equal-denomination
/// outputs, and never exceeds min(modal multiplicity, input count).
pub fn calculate_anon_set(inputs: &[TxIn], outputs: &[TxOut], fee: i64, vsize: i64) -> usize {
    if inputs.is_empty() || outputs.is_empty() {
        return 0;
    }

    let mut fee_rate = if vsize > 0 { fee as f64 / vsize as f64 } else { 1.0 };
    if fee_rate <= 0.0 {
        fee_rate = 1.0;
    }

    // Refusal gate: 2^15 subsets per side is the compute budget. Beyond it
    // the NP-hard search would hang the processor, so fall back to counting
    // the modal output multiplicity.
    if inputs.len() > MAX_COMBINATORIAL_SIDE || outputs.len() > MAX_COMBINATORIAL_SIDE {
        debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            "anonset solver over compute budget, structural fallback"
        );
        return structural_fallback(outputs);
    }

    let output_vals: Vec<i64> = outputs.iter().map(|o| o.value).collect();

    // The equal-denomination mixed outputs set the structural ceiling.
    let (mix_denomination, modal_count) = modal_value(output_vals.iter().copied());
    if modal_count <= 1 {
        return 0;
    }

    // Prune inputs that cannot mathematically fund the mix denomination.
    let candidate_inputs: Vec<i64> = inputs
        .iter()
        .map(|i| i.value)
        .filter(|&v| v >= mix_denomination)
        .collect();

    let tau = fee_tolerance(fee_rate);

    // Each mix participant brings an input ≥ denomination + change + fee.
    // The input is a valid linkage when a subset of change outputs lands in
    // [target − τ, target], target = input − denomination (the true change
    // always sums slightly below target because of the miner fee).
    let mut valid_linkages = 0usize;
    for &input_val in &candidate_inputs {
        let target = input_val - mix_denomination;

        if target >= 0 && target <= tau {
            valid_linkages += 1;
            continue;
        }

        if has_matching_subset_mitm(&output_vals, target, tau) {
            valid_linkages += 1;
        }
    }

    let mut anon_set = valid_linkages.min(modal_count).min(inputs.len());

    // Escalation: MitM proved only one linkage on a transaction whose modal
    // structure promises more. Deploy the strictly bounded lanes.
    if anon_set == 1 && modal_count > 1 {
        let sum_outputs: i64 = output_vals.iter().sum();
        let escalated = if sum_outputs <= DP_VALUE_CAP {
            debug!("MitM inconclusive, running DP-bitset lane");
            dp::solve_dp_bitset(&candidate_inputs, &output_vals, tau)
        } else {
            debug!("MitM inconclusive, running CP-SAT lane");
            cpsat::solve_cpsat(&candidate_inputs, &output_vals, tau)
        };

        if escalated > anon_set {
            anon_set = escalated;
        }
        anon_set = anon_set.min(modal_count).min(inputs.len());
    }

    anon_set
}

/// Structural fallback for massive transactions: the multiplicity of the
/// most frequent output value, normalized to 0 when no two outputs match.
pub fn structural_fallback(outputs: &[TxOut]) -> usize {
    let (_, count) = modal_value(outputs.iter().map(|o| o.value));
    if count < 2 {
        0
    } else {
        count
    }
}

/// Meet-in-the-Middle subset-sum: split the values in halves, enumerate all
/// subset sums of each side, and test whether any combined sum falls in
/// [target − τ, target].
fn has_matching_subset_mitm(vals: &[i64], target: i64, tau: i64) -> bool {
    let n = vals.len();
    let mid = n / 2;

    let mut left_sums = Vec::with_capacity(1 << mid);
    for mask in 0..(1u32 << mid) {
        let mut sum = 0i64;
        for (j, &v) in vals[..mid].iter().enumerate() {
            if mask & (1 << j) != 0 {
                sum += v;
            }
        }
        left_sums.push(sum);
    }
    left_sums.sort_unstable();

    let right = &vals[mid..];
    for mask in 0..(1u32 << right.len()) {
        let mut sum = 0i64;
        for (j, &v) in right.iter().enumerate() {
            if mask & (1 << j) != 0 {
                sum += v;
            }
        }

        // Any left sum in [target − τ − sum, target − sum] completes a match.
        let lo = target - tau - sum;
        let hi = target - sum;
        let idx = left_sums.partition_point(|&s| s < lo);
        if idx < left_sums.len() && left_sums[idx] <= hi {
            return true;
        }
    }

    false
}
