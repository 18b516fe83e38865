//! Change output detection by weighted voting over five sub-heuristics:
//! optimal change, round-number payments, script-type matching, address
//! reuse self-spends, and shadow change (fee subtraction). Gated against
//! CoinJoin transactions by the orchestrator, where change detection is
//! meaningless.

use std::collections::HashMap;

use crate::core::{address_type, is_round_amount, AddressType, ChangeOutput, Transaction};

/// Minimum accumulated weight for an output to be declared change.
const MIN_CONFIDENCE: f64 = 0.25;

struct Vote {
    index: usize,
    weight: f64,
    method: &'static str,
}

/// Identify which output most likely returns change to the sender.
/// Returns None when no output accumulates enough weight, or when the
/// output count is outside [2, 5].
pub fn detect_change_output(tx: &Transaction) -> Option<ChangeOutput> {
    if tx.outputs.len() < 2 || tx.outputs.len() > 5 {
        return None;
    }

    let mut votes: Vec<Vote> = Vec::new();
    let mut is_round_payment = false;

    // 1. Optimal change: the smallest output strictly below the smallest
    //    input. Wallets construct change as the remainder after paying the
    //    exact amount.
    if !tx.inputs.is_empty() {
        let min_input = tx
            .inputs
            .iter()
            .filter(|i| i.value > 0)
            .map(|i| i.value)
            .min()
            .unwrap_or(i64::MAX);

        let mut smallest: Option<(usize, i64)> = None;
        for (i, out) in tx.outputs.iter().enumerate() {
            if out.value > 0 && out.value < min_input {
                match smallest {
                    Some((_, v)) if out.value >= v => {}
                    _ => smallest = Some((i, out.value)),
                }
            }
        }
        if let Some((idx, _)) = smallest {
            votes.push(Vote { index: idx, weight: 0.30, method: "optimal_change" });
        }
    }

    // 2. Round number: payments are round, change almost never is. Exactly
    //    one non-round output among round ones is the change.
    let round: Vec<bool> = tx.outputs.iter().map(|o| is_round_amount(o.value)).collect();
    let round_count = round.iter().filter(|&&r| r).count();
    let non_round: Vec<usize> = round
        .iter()
        .enumerate()
        .filter(|(_, &r)| !r)
        .map(|(i, _)| i)
        .collect();
    if round_count >= 1 && non_round.len() == 1 {
        votes.push(Vote { index: non_round[0], weight: 0.35, method: "round_number" });
        is_round_payment = true;
    }

    // 3. Script-type match: wallets generate change to the same address
    //    type as their inputs.
    if !tx.inputs.is_empty() {
        let mut input_types: HashMap<AddressType, usize> = HashMap::new();
        for input in &tx.inputs {
            let t = address_type(&input.address);
            if t != AddressType::Unknown || !input.address.is_empty() {
                *input_types.entry(t).or_insert(0) += 1;
            }
        }

        // Deterministic tie-break on the type name.
        let dominant = input_types
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.as_str().cmp(a.0.as_str())))
            .map(|(&t, _)| t);

        if let Some(dominant) = dominant {
            let matching: Vec<usize> = tx
                .outputs
                .iter()
                .enumerate()
                .filter(|(_, o)| address_type(&o.address) == dominant)
                .map(|(i, _)| i)
                .collect();
            if matching.len() == 1 {
                votes.push(Vote { index: matching[0], weight: 0.25, method: "script_type_match" });
            }
        }
    }

    // 4. Address reuse: an output paying back to an input address is a
    //    self-spend, linkable regardless of change semantics.
    let input_addrs: std::collections::HashSet<&str> = tx
        .inputs
        .iter()
        .filter(|i| !i.address.is_empty())
        .map(|i| i.address.as_str())
        .collect();
    for (i, out) in tx.outputs.iter().enumerate() {
        if !out.address.is_empty() && input_addrs.contains(out.address.as_str()) {
            votes.push(Vote { index: i, weight: 0.50, method: "address_reuse_self" });
        }
    }

    // 5. Shadow change: in 1-in-2-out, if input − fee − other equals one
    //    output exactly, that output is the payment and the other the change.
    if tx.inputs.len() == 1 && tx.outputs.len() == 2 {
        let input_val = tx.inputs[0].value;
        for i in 0..2 {
            let other = 1 - i;
            let expected_payment = input_val - tx.fee - tx.outputs[other].value;
            if expected_payment == tx.outputs[i].value {
                votes.push(Vote { index: other, weight: 0.20, method: "shadow_change" });
            }
        }
    }

    if votes.is_empty() {
        return None;
    }

    // Weighted majority vote across output indexes.
    let mut score_by_index: HashMap<usize, f64> = HashMap::new();
    let mut methods_by_index: HashMap<usize, Vec<&'static str>> = HashMap::new();
    for v in &votes {
        *score_by_index.entry(v.index).or_insert(0.0) += v.weight;
        methods_by_index.entry(v.index).or_default().push(v.method);
    }

    let (best_idx, best_score) = score_by_index
        .iter()
        .max_by(|a, b| {
            a.1.partial_cmp(b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.cmp(a.0)) // deterministic tie-break: lower index wins
        })
        .map(|(&i, &s)| (i, s))?;

    if best_score < MIN_CONFIDENCE {
        return None;
    }

    Some(ChangeOutput {
        index: best_idx,
        confidence: best_score.min(1.0),
        method: methods_by_index[&best_idx].join("+"),
        is_round_payment,
    })
}
