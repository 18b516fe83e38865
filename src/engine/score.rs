//! Calibrated privacy score.
//!
//! Replaces the ad-hoc pipeline penalties with a weighted composition: each
//! signal contributes an additive factor from a calibrated weight table and
//! the final score is clamped to [0, 100]. Traceability is the inverse
//! metric, the probability the transaction can be de-anonymized.

use crate::core::flags::HeuristicFlag;
use crate::core::{AnalysisResult, ScoreBreakdown};

const WEIGHT_ADDRESS_REUSE: i32 = -40;
const WEIGHT_SIMPLE_PAYMENT: i32 = -15;
const WEIGHT_DUST_CONSOLIDATE: i32 = -30;
const WEIGHT_DUST_SURVEILLANCE: i32 = -10;
const WEIGHT_HUB_TOPOLOGY: i32 = -10;

/// Compose the final privacy score from all populated sub-results and write
/// it back to the analysis. Must run after every analyzer the weights read
/// from has filled its field. Returns the decomposition.
pub fn calibrate_privacy_score(res: &mut AnalysisResult) -> ScoreBreakdown {
    let mut bd = ScoreBreakdown {
        base_score: 100,
        ..Default::default()
    };

    let mut score: i32 = 100;

    // Anonymity set: larger sets earn a capped boost, degenerate sets cost.
    if res.anon_set >= 5 {
        let boost = ((res.anon_set as f64 * 2.0).min(35.0)) as i32;
        bd.anon_set_factor = boost;
        score += boost;
    } else if res.anon_set <= 1 {
        bd.anon_set_factor = -10;
        score -= 10;
    }

    // Boltzmann entropy.
    if let Some(entropy) = &res.entropy {
        if entropy.entropy >= 4.0 {
            let boost = ((entropy.entropy * 4.0).min(25.0)) as i32;
            bd.entropy_factor = boost;
            score += boost;
        } else if entropy.entropy <= 0.5 {
            bd.entropy_factor = -10;
            score -= 10;
        }
    }

    // Change detection.
    if let Some(change) = &res.change_output {
        let penalty = (change.confidence * 25.0) as i32;
        bd.change_detection = -penalty;
        score -= penalty;
    }

    // Wallet identification leaks the sender's software.
    if !res.wallet_family.is_empty() && res.wallet_family != "unknown" {
        bd.wallet_leakage = -15;
        score -= 15;
    }

    // Peel chain.
    if let Some(peel) = &res.peel_chain {
        if peel.is_chain {
            let penalty = (peel.confidence * 15.0) as i32;
            bd.peel_chain_penalty = -penalty;
            score -= penalty;
        }
    }

    // Dust involvement.
    if let Some(dust) = &res.dust_analysis {
        match dust.intent.as_str() {
            "consolidation" => {
                bd.dust_risk = WEIGHT_DUST_CONSOLIDATE;
                score += WEIGHT_DUST_CONSOLIDATE;
            }
            "surveillance" => {
                bd.dust_risk = WEIGHT_DUST_SURVEILLANCE;
                score += WEIGHT_DUST_SURVEILLANCE;
            }
            _ => {}
        }
    }

    // Topology.
    if let Some(topo) = &res.topology {
        if topo.is_hub {
            bd.topology_penalty = WEIGHT_HUB_TOPOLOGY;
            score += WEIGHT_HUB_TOPOLOGY;
        }
        if topo.shape == "peel-step" || topo.shape == "simple-payment" {
            bd.topology_penalty += WEIGHT_SIMPLE_PAYMENT;
            score += WEIGHT_SIMPLE_PAYMENT;
        }
    }

    // CoinJoin unmixability.
    if let Some(unmix) = &res.unmix_result {
        if unmix.linkability_score > 0.0 {
            let penalty = (unmix.linkability_score * 30.0) as i32;
            bd.unmix_penalty = -penalty;
            score -= penalty;
        }
    }

    // Address reuse remains the single strongest deanonymization signal.
    if res.heuristic_flags.contains(HeuristicFlag::AddressReuse) {
        bd.address_reuse = WEIGHT_ADDRESS_REUSE;
        score += WEIGHT_ADDRESS_REUSE;
    }

    score = score.clamp(0, 100);

    bd.traceability = ((1.0 - score as f64 / 100.0) * 100.0).round() / 100.0;

    res.privacy_score = score;
    if bd.traceability >= 0.8 {
        res.heuristic_flags.set(HeuristicFlag::HighTraceability);
    }

    bd
}

/// Inverse privacy metric: 0.0 = untraceable, 1.0 = fully transparent.
pub fn compute_traceability(privacy_score: i32) -> f64 {
    ((1.0 - privacy_score as f64 / 100.0) * 100.0).round() / 100.0
}
