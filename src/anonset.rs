//! Time-evolving anonymity set tracking.
//!
//! A mix's transaction-local anonymity set erodes as participants leak:
//! exchange deposits, change consolidation, address reuse, timing
//! correlation. The effective set is tracked at T+1d, T+7d, T+30d and
//! T+365d observation windows, decaying multiplicatively per observed
//! erosion event.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Observation windows for the evolving anonymity set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonSetWindow {
    pub txid: String,
    pub output_index: usize,
    /// A_0: transaction-local pool size.
    pub anonset_local: usize,
    pub anonset_1d: usize,
    pub anonset_7d: usize,
    pub anonset_30d: usize,
    pub anonset_365d: usize,
    pub last_updated: DateTime<Utc>,
}

/// An on-chain event reducing a participant's anonymity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErosionEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: ErosionType,
    /// 0.0 (no impact) to 1.0 (fully deanonymized).
    pub severity: f64,
    pub description: String,
}

/// Classification of privacy-reducing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErosionType {
    None = 0,
    ExchangeDeposit = 1,
    ChangeConsolidate = 2,
    AddressReuse = 3,
    TimingCorrelation = 4,
}

/// Compute the decayed anonymity set at each observation window.
///
/// For a window with cutoff T+Δ whose wall-clock has elapsed, the surviving
/// set is `max(1, round(local · Π(1 − severity)))` over events inside
/// (mix_time, cutoff]. Windows not yet reached report the local value.
pub fn compute_windowed_anonset(
    local_anonset: usize,
    mix_time: DateTime<Utc>,
    events: &[ErosionEvent],
) -> AnonSetWindow {
    let now = Utc::now();

    let windowed = |days: i64| {
        let cutoff = mix_time + Duration::days(days);
        if now < cutoff {
            // Not enough real time has elapsed for erosion.
            return local_anonset;
        }
        apply_erosion_decay(local_anonset, mix_time, cutoff, events)
    };

    AnonSetWindow {
        txid: String::new(),
        output_index: 0,
        anonset_local: local_anonset,
        anonset_1d: windowed(1),
        anonset_7d: windowed(7),
        anonset_30d: windowed(30),
        anonset_365d: windowed(365),
        last_updated: now,
    }
}

/// Multiplicative survival under erosion: no single event collapses the
/// set, accumulated erosion compounds. Floored at 1 — the owner always
/// remains a candidate.
fn apply_erosion_decay(
    anonset_local: usize,
    mix_time: DateTime<Utc>,
    window_end: DateTime<Utc>,
    events: &[ErosionEvent],
) -> usize {
    let mut survival = 1.0f64;

    for event in events {
        if event.timestamp > mix_time && event.timestamp < window_end {
            survival *= 1.0 - event.severity;
        }
    }

    ((anonset_local as f64 * survival).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(offset_hours: i64, severity: f64, mix_time: DateTime<Utc>) -> ErosionEvent {
        ErosionEvent {
            timestamp: mix_time + Duration::hours(offset_hours),
            event_type: ErosionType::ExchangeDeposit,
            severity,
            description: String::new(),
        }
    }

    #[test]
    fn no_erosion_keeps_local() {
        let mix_time = Utc::now() - Duration::hours(48);
        let result = compute_windowed_anonset(5, mix_time, &[]);

        assert_eq!(result.anonset_local, 5);
        assert_eq!(result.anonset_1d, 5);
        // 7d window not yet elapsed.
        assert_eq!(result.anonset_7d, 5);
    }

    #[test]
    fn erosion_compounds_across_windows() {
        let mix_time = Utc::now() - Duration::days(30);
        let events = vec![
            event(12, 0.3, mix_time),
            event(3 * 24, 0.2, mix_time),
            event(15 * 24, 0.1, mix_time),
        ];

        let result = compute_windowed_anonset(10, mix_time, &events);

        // T+1d: one event → 10·0.7 = 7
        assert_eq!(result.anonset_1d, 7);
        // T+7d: two events → 10·0.7·0.8 = 5.6 → 6
        assert_eq!(result.anonset_7d, 6);
        // T+30d: all three → 10·0.7·0.8·0.9 = 5.04 → 5
        assert_eq!(result.anonset_30d, 5);
        // T+365d not yet elapsed → local
        assert_eq!(result.anonset_365d, 10);
    }

    #[test]
    fn severe_erosion_floors_at_one() {
        let mix_time = Utc::now() - Duration::days(2);
        let events = vec![event(1, 0.99, mix_time), event(2, 0.99, mix_time)];
        let result = compute_windowed_anonset(5, mix_time, &events);
        assert_eq!(result.anonset_1d, 1);
    }

    #[test]
    fn events_before_mix_ignored() {
        let mix_time = Utc::now() - Duration::days(2);
        let stale = ErosionEvent {
            timestamp: mix_time - Duration::hours(5),
            event_type: ErosionType::AddressReuse,
            severity: 0.9,
            description: String::new(),
        };
        let result = compute_windowed_anonset(8, mix_time, &[stale]);
        assert_eq!(result.anonset_1d, 8);
    }

    #[test]
    fn future_mix_reports_local_everywhere() {
        let mix_time = Utc::now() + Duration::days(1);
        let result = compute_windowed_anonset(6, mix_time, &[]);
        assert_eq!(result.anonset_1d, 6);
        assert_eq!(result.anonset_365d, 6);
    }
}
