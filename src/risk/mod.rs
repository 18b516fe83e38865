//! Real-time threat scoring.
//!
//! Composites every pipeline signal plus watchlist hits and taint exposure
//! into a single risk verdict per transaction. The base score starts at 0
//! and signals add weighted points; watchlist hits escalate immediately and
//! the coinjoin + watchlist + high-value compound adds a final surcharge.

pub mod taint;
pub mod watchlist;

use serde::{Deserialize, Serialize};

use crate::core::flags::HeuristicFlag;
use crate::core::{AnalysisResult, Transaction};
use self::taint::TaintMap;
use self::watchlist::WatchlistHit;

/// Real-time risk verdict for a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub txid: String,
    /// 0-100.
    pub risk_score: i32,
    /// "info"/"low"/"medium"/"high"/"critical"
    pub severity: String,
    /// Contributing risk signal tokens, in evaluation order.
    pub signals: Vec<String>,
    /// "none"/"log"/"review"/"alert"/"escalate"
    pub recommended_action: String,
    pub is_watchlist_hit: bool,
    pub is_coinjoin: bool,
    pub value_btc: f64,
}

/// Produce a threat assessment from the analysis result, watchlist hits and
/// the shared taint map.
pub fn score_transaction(
    tx: &Transaction,
    result: &AnalysisResult,
    watchlist_hits: &[WatchlistHit],
    taint: &TaintMap,
) -> ThreatAssessment {
    let mut assessment = ThreatAssessment {
        txid: tx.txid.clone(),
        risk_score: 0,
        severity: String::new(),
        signals: Vec::new(),
        recommended_action: String::new(),
        is_watchlist_hit: false,
        is_coinjoin: false,
        value_btc: 0.0,
    };

    let mut risk: i32 = 0;

    // Prefer the larger observed side so partially zeroed prevout values
    // cannot hide a high-value transaction.
    let total_in = tx.total_input_value();
    let total_out = tx.total_output_value();
    let total_value = total_in.max(total_out);
    assessment.value_btc = total_value as f64 / 100_000_000.0;

    if total_value > 100_000_000 {
        risk += 5;
        assessment.signals.push("high_value_tx".to_string());
    }
    if total_value > 1_000_000_000 {
        risk += 10;
        assessment.signals.push("very_high_value_tx".to_string());
    }

    // Watchlist hits escalate immediately, weighted by category.
    if !watchlist_hits.is_empty() {
        assessment.is_watchlist_hit = true;
        for hit in watchlist_hits {
            match hit.category.as_str() {
                "theft" => {
                    risk += 50;
                    assessment.signals.push(format!("watchlist:theft:{}", hit.label));
                }
                "sanctioned" => {
                    risk += 60;
                    assessment.signals.push(format!("watchlist:sanctioned:{}", hit.label));
                }
                "suspect" => {
                    risk += 40;
                    assessment.signals.push(format!("watchlist:suspect:{}", hit.label));
                }
                other => {
                    risk += 20;
                    assessment.signals.push(format!("watchlist:{}:{}", other, hit.label));
                }
            }
        }
    }

    let flags = result.heuristic_flags;

    if flags.contains(HeuristicFlag::WhirlpoolStruct)
        || flags.contains(HeuristicFlag::WasabiSuspect)
        || flags.contains(HeuristicFlag::LikelyCollabConstruct)
    {
        assessment.is_coinjoin = true;
        risk += 15;
        assessment.signals.push("coinjoin_detected".to_string());
    }

    if flags.contains(HeuristicFlag::PostMixLeakage) {
        risk += 20;
        assessment.signals.push("post_mix_leakage".to_string());
    }

    if flags.contains(HeuristicFlag::HighTraceability) {
        risk += 10;
        assessment.signals.push("high_traceability".to_string());
    }

    if flags.contains(HeuristicFlag::DustAttackSuspect) {
        risk += 15;
        assessment.signals.push("dust_attack".to_string());
    }

    // Taint: continuous contribution plus the flag-driven surcharge, with a
    // safety net when the analysis flags are stale but the map is fresh.
    let (taint_level, taint_high_risk) = taint.check_inputs(tx);
    if taint_level > 0.0 {
        risk += (taint_level * 25.0).round().min(25.0) as i32;
        assessment.signals.push("taint_exposure".to_string());
    }
    if flags.contains(HeuristicFlag::HighRisk) {
        risk += 30;
        assessment.signals.push("tainted_funds".to_string());
    } else if taint_high_risk {
        risk += 25;
        assessment.signals.push("taint_high_risk".to_string());
    }

    if flags.contains(HeuristicFlag::BotBehavior) {
        risk += 10;
        assessment.signals.push("bot_pattern".to_string());
    }

    if flags.contains(HeuristicFlag::AncientUtxo) {
        risk += 8;
        assessment.signals.push("ancient_utxo_movement".to_string());
    }

    if flags.contains(HeuristicFlag::KnownServicePattern) {
        risk += 5;
        assessment.signals.push("known_service_pattern".to_string());
    }

    if result.privacy_score < 30 {
        risk += 3;
        assessment.signals.push("low_privacy_score".to_string());
    }

    if flags.contains(HeuristicFlag::LightningChannel) {
        risk -= 5;
        assessment.signals.push("lightning_channel".to_string());
    }

    if flags.contains(HeuristicFlag::StrategicConsolidation) {
        risk += 5;
        assessment.signals.push("consolidation".to_string());
    }

    // Compound escalation: watchlisted funds entering a mixer at size.
    if assessment.is_coinjoin && assessment.is_watchlist_hit && total_value > 100_000_000 {
        risk += 20;
        assessment.signals.push("compound_escalation".to_string());
    }

    assessment.risk_score = risk.clamp(0, 100);
    assessment.severity = classify_severity(assessment.risk_score).to_string();
    assessment.recommended_action = recommend_action(assessment.risk_score).to_string();

    assessment
}

/// Severity bands over the risk score.
pub fn classify_severity(score: i32) -> &'static str {
    if score <= 10 {
        "info"
    } else if score <= 30 {
        "low"
    } else if score <= 50 {
        "medium"
    } else if score <= 75 {
        "high"
    } else {
        "critical"
    }
}

/// Recommended action over the same bands.
pub fn recommend_action(score: i32) -> &'static str {
    if score <= 10 {
        "none"
    } else if score <= 30 {
        "log"
    } else if score <= 50 {
        "review"
    } else if score <= 75 {
        "alert"
    } else {
        "escalate"
    }
}
