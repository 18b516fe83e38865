//! Behavioral analysis: structural bot signals for single transactions and
//! pattern-of-life profiling over transaction timestamp histories.
//!
//! Timing is nearly impossible to fake: two entities with identical wallet
//! fingerprints but activity in different timezones are provably distinct.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::core::Transaction;

/// Temporal behavioral profile over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralProfile {
    /// Estimated UTC offset, e.g. "UTC-5".
    pub inferred_timezone: String,
    /// Most active hour, 0-23 UTC.
    pub peak_hour_utc: u32,
    /// Fraction of transactions on weekdays.
    pub weekday_ratio: f64,
    /// 0.0 (random) to 1.0 (perfectly periodic).
    pub regularity: f64,
    /// Average transactions per day.
    pub tx_frequency: f64,
    /// "bot"/"service"/"business"/"human"/"unknown"
    pub entity_type: String,
    pub is_bot: bool,
}

impl Default for BehavioralProfile {
    fn default() -> Self {
        Self {
            inferred_timezone: "unknown".to_string(),
            peak_hour_utc: 0,
            weekday_ratio: 0.0,
            regularity: 0.0,
            tx_frequency: 0.0,
            entity_type: "unknown".to_string(),
            is_bot: false,
        }
    }
}

/// Structural bot detection for a single transaction. Bot signatures:
/// exact-round output values, high fan-out, identical-value distribution.
/// Two or more signals trigger the flag.
pub fn detect_bot_behavior(tx: &Transaction) -> bool {
    let mut signals = 0;

    // Exact-round satoshi values (multiples of 0.01 BTC).
    let round_outputs = tx
        .outputs
        .iter()
        .filter(|o| o.value > 0 && o.value % 1_000_000 == 0)
        .count();
    if round_outputs >= 3 {
        signals += 1;
    }

    // High fan-out suggests a distribution bot.
    if tx.outputs.len() > 20 {
        signals += 1;
    }

    // All outputs identical (distribution pattern).
    if tx.outputs.len() >= 3 && tx.outputs.windows(2).all(|w| w[0].value == w[1].value) {
        signals += 1;
    }

    signals >= 2
}

/// Compute a behavioral profile from transaction timestamps. Needs at
/// least three data points; degrades to the unknown default otherwise.
pub fn analyze_behavioral_pattern(tx_times: &[DateTime<Utc>]) -> BehavioralProfile {
    let mut profile = BehavioralProfile::default();

    if tx_times.len() < 3 {
        return profile;
    }

    let mut hour_counts = [0usize; 24];
    let mut weekday_count = 0usize;
    for t in tx_times {
        hour_counts[t.hour() as usize] += 1;
        let wd = t.weekday();
        if wd != Weekday::Sat && wd != Weekday::Sun {
            weekday_count += 1;
        }
    }

    let mut max_count = 0;
    for (hour, &count) in hour_counts.iter().enumerate() {
        if count > max_count {
            max_count = count;
            profile.peak_hour_utc = hour as u32;
        }
    }

    profile.inferred_timezone = infer_timezone_from_peak(profile.peak_hour_utc);
    profile.weekday_ratio =
        ((weekday_count as f64 * 100.0) / tx_times.len() as f64).round() / 100.0;
    profile.regularity = compute_regularity(tx_times);

    let span = *tx_times.last().unwrap() - tx_times[0];
    let span_hours = span.num_seconds() as f64 / 3600.0;
    if span_hours > 0.0 {
        profile.tx_frequency =
            ((tx_times.len() as f64 * 100.0) / (span_hours / 24.0)).round() / 100.0;
    }

    profile.entity_type = classify_entity(&profile).to_string();
    profile.is_bot = profile.entity_type == "bot";

    profile
}

/// Estimate the UTC offset assuming peak activity sits near 13:00 local.
fn infer_timezone_from_peak(peak_hour_utc: u32) -> String {
    let mut offset = peak_hour_utc as i32 - 13;
    if offset > 12 {
        offset -= 24;
    }
    if offset < -12 {
        offset += 24;
    }

    if offset >= 0 {
        format!("UTC+{offset}")
    } else {
        format!("UTC{offset}")
    }
}

/// Regularity as 1/(1+CV) of the inter-transaction intervals: bots sit
/// near 1.0, humans in the middle, noise near 0.
fn compute_regularity(times: &[DateTime<Utc>]) -> f64 {
    if times.len() < 3 {
        return 0.0;
    }

    let intervals: Vec<f64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 3600.0)
        .collect();

    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }

    let variance = intervals
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / intervals.len() as f64;
    let cv = variance.sqrt() / mean;

    ((1.0 / (1.0 + cv)) * 100.0).round() / 100.0
}

fn classify_entity(p: &BehavioralProfile) -> &'static str {
    if p.regularity >= 0.8 && p.tx_frequency >= 10.0 {
        "bot"
    } else if p.regularity >= 0.6 && p.tx_frequency >= 5.0 {
        "service"
    } else if p.weekday_ratio >= 0.8 && p.tx_frequency >= 1.0 {
        "business"
    } else if p.tx_frequency >= 0.1 {
        "human"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TxOut;
    use chrono::TimeZone;

    fn tx_with_outputs(vals: &[i64]) -> Transaction {
        Transaction {
            outputs: vals
                .iter()
                .map(|&value| TxOut { value, ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn round_values_plus_uniform_is_bot() {
        // 3 round outputs AND all identical: two signals.
        let tx = tx_with_outputs(&[1_000_000, 1_000_000, 1_000_000]);
        assert!(detect_bot_behavior(&tx));
    }

    #[test]
    fn high_fanout_with_identical_outputs_is_bot() {
        let tx = tx_with_outputs(&vec![777; 25]);
        assert!(detect_bot_behavior(&tx));
    }

    #[test]
    fn single_signal_not_bot() {
        // Identical but non-round, small fan-out: one signal only.
        let tx = tx_with_outputs(&[777, 777, 777]);
        assert!(!detect_bot_behavior(&tx));
    }

    #[test]
    fn ordinary_payment_not_bot() {
        let tx = tx_with_outputs(&[123_456, 654_321]);
        assert!(!detect_bot_behavior(&tx));
    }

    #[test]
    fn too_few_timestamps_unknown() {
        let times = vec![Utc.timestamp_opt(1_700_000_000, 0).unwrap()];
        let profile = analyze_behavioral_pattern(&times);
        assert_eq!(profile.entity_type, "unknown");
    }

    #[test]
    fn perfectly_periodic_high_frequency_is_bot() {
        // One tx every hour for 3 days.
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let times: Vec<_> = (0..72).map(|i| start + chrono::Duration::hours(i)).collect();
        let profile = analyze_behavioral_pattern(&times);
        assert!(profile.regularity > 0.95);
        assert!(profile.tx_frequency >= 10.0);
        assert_eq!(profile.entity_type, "bot");
        assert!(profile.is_bot);
    }

    #[test]
    fn irregular_sparse_activity_is_human() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let offsets = [0i64, 26, 55, 120, 170, 300];
        let times: Vec<_> = offsets
            .iter()
            .map(|&h| start + chrono::Duration::hours(h))
            .collect();
        let profile = analyze_behavioral_pattern(&times);
        assert!(profile.regularity < 0.8);
        assert_eq!(profile.entity_type, "human");
    }

    #[test]
    fn timezone_from_peak() {
        assert_eq!(infer_timezone_from_peak(13), "UTC+0");
        assert_eq!(infer_timezone_from_peak(18), "UTC+5");
        assert_eq!(infer_timezone_from_peak(8), "UTC-5");
        assert_eq!(infer_timezone_from_peak(2), "UTC-11");
    }

    #[test]
    fn regularity_of_uniform_intervals() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let times: Vec<_> = (0..5).map(|i| start + chrono::Duration::hours(i * 6)).collect();
        assert!((compute_regularity(&times) - 1.0).abs() < 1e-9);
    }
}
