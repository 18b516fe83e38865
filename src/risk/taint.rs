//! Taint propagation and exposure scoring.
//!
//! Tracks illicit-fund exposure per address in [0, 1]. Writers are
//! serialized and readers concurrent behind a reader-writer lock; a
//! per-transaction probe takes the read lock once and sees a consistent
//! snapshot. Propagation uses the haircut (proportional) model standard in
//! regulatory frameworks.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::Transaction;

/// A known source of illicit funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintSource {
    pub address: String,
    /// "darknet"/"ransomware"/"theft"/"fraud"/"sanctions"/"mixer"
    pub category: String,
    /// 0.0 to 1.0
    pub taint_level: f64,
    pub label: String,
}

/// Risk assessment for an address or transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintResult {
    /// 0.0 (clean) to 1.0 (fully tainted).
    pub risk_score: f64,
    /// "clean"/"low"/"medium"/"high"/"critical"
    pub risk_level: String,
    pub taint_sources: Vec<TaintSource>,
    pub hops_from_source: usize,
    pub tainted_ratio: f64,
}

impl Default for TaintResult {
    fn default() -> Self {
        Self {
            risk_score: 0.0,
            risk_level: "clean".to_string(),
            taint_sources: Vec::new(),
            hops_from_source: 0,
            tainted_ratio: 0.0,
        }
    }
}

/// Process-wide taint state: address → accumulated taint level. Writes
/// never decrease a known value except via explicit reseed.
#[derive(Debug, Default)]
pub struct TaintMap {
    inner: RwLock<HashMap<String, f64>>,
}

impl TaintMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed theft addresses from active investigations at full taint.
    /// Existing entries are never lowered. Returns the number of new
    /// addresses seeded.
    pub fn seed_from_investigation(&self, addresses: &[String]) -> usize {
        let mut map = self.inner.write().unwrap();
        let mut seeded = 0;

        for addr in addresses {
            let addr = addr.trim();
            if addr.is_empty() {
                continue;
            }
            if !map.contains_key(addr) {
                map.insert(addr.to_string(), 1.0);
                seeded += 1;
            }
        }

        if seeded > 0 {
            info!(seeded, total = map.len(), "taint map seeded from investigations");
        }
        seeded
    }

    /// Seed external intelligence (sanctions lists, known scam wallets)
    /// with source-specific levels, keeping the max of old and new.
    pub fn seed_from_external_intel(&self, sources: &[TaintSource]) -> usize {
        let mut map = self.inner.write().unwrap();
        let mut seeded = 0;

        for src in sources {
            let addr = src.address.trim();
            if addr.is_empty() {
                continue;
            }
            let current = map.get(addr).copied();
            if current.is_none() || src.taint_level > current.unwrap() {
                map.insert(addr.to_string(), src.taint_level);
                seeded += 1;
            }
        }
        seeded
    }

    /// Evaluate taint exposure across the transaction's inputs.
    ///
    /// Returns the weighted exposure (Σ taint·value over the larger of the
    /// input/output sums, robust to missing prevouts) and whether the
    /// high-risk gate fires: exposure ≥ 0.25 or any direct source ≥ 0.85.
    pub fn check_inputs(&self, tx: &Transaction) -> (f64, bool) {
        let map = self.inner.read().unwrap();
        if map.is_empty() {
            return (0.0, false);
        }

        let mut total_in: i64 = 0;
        let mut weighted_taint = 0.0;
        let mut max_taint = 0.0f64;

        for input in &tx.inputs {
            let addr = input.address.trim();
            if addr.is_empty() || input.value <= 0 {
                continue;
            }
            total_in += input.value;
            if let Some(&taint) = map.get(addr) {
                weighted_taint += taint * input.value as f64;
                max_taint = max_taint.max(taint);
            }
        }

        let total_out: i64 = tx.outputs.iter().filter(|o| o.value > 0).map(|o| o.value).sum();
        let denom = total_in.max(total_out);
        if denom <= 0 {
            return (0.0, false);
        }

        let exposure = weighted_taint / denom as f64;
        let is_high = exposure >= 0.25 || max_taint >= 0.85;
        (exposure, is_high)
    }

    /// Spread taint through a transaction using the haircut model: each
    /// output receives the input-weighted taint scaled by its value share.
    /// Taint accumulates; it never decreases.
    pub fn propagate_haircut(&self, tx: &Transaction) {
        let mut total_taint = 0.0;
        let mut total_input_value: i64 = 0;

        {
            let map = self.inner.read().unwrap();
            for input in &tx.inputs {
                if let Some(&taint) = map.get(input.address.as_str()) {
                    if taint > 0.0 {
                        total_taint += taint * input.value as f64;
                    }
                }
                total_input_value += input.value;
            }
        }

        if total_taint <= 0.0 || total_input_value <= 0 {
            return;
        }
        let weighted = total_taint / total_input_value as f64;

        let total_output_value: i64 = tx.outputs.iter().map(|o| o.value).sum();
        if total_output_value <= 0 {
            return;
        }

        let mut map = self.inner.write().unwrap();
        for out in &tx.outputs {
            let share = out.value as f64 / total_output_value as f64;
            let out_taint = (weighted * share).min(1.0);
            let entry = map.entry(out.address.clone()).or_insert(0.0);
            if out_taint > *entry {
                *entry = out_taint;
            }
        }
    }

    pub fn taint_of(&self, addr: &str) -> f64 {
        self.inner.read().unwrap().get(addr).copied().unwrap_or(0.0)
    }

    pub fn is_tainted(&self, addr: &str) -> bool {
        self.taint_of(addr) > 0.01
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Addresses with taint at or above the threshold.
    pub fn tainted_addresses(&self, threshold: f64) -> Vec<String> {
        let map = self.inner.read().unwrap();
        let mut addrs: Vec<String> = map
            .iter()
            .filter(|(_, &t)| t >= threshold)
            .map(|(a, _)| a.clone())
            .collect();
        addrs.sort();
        addrs
    }
}

/// Risk assessment with per-hop decay: farther from the source is less
/// risky, 0.85 per hop.
pub fn assess_risk(taint_level: f64, hops: usize) -> TaintResult {
    let mut result = TaintResult {
        risk_score: (taint_level * 1000.0).round() / 1000.0,
        hops_from_source: hops,
        tainted_ratio: (taint_level * 100.0).round() / 100.0,
        ..Default::default()
    };

    if hops > 0 {
        let decay = 0.85f64.powi(hops as i32 - 1);
        result.risk_score = (taint_level * decay * 1000.0).round() / 1000.0;
    }

    result.risk_level = classify_risk(result.risk_score).to_string();
    result
}

/// Risk level bands per the FATF red-flag thresholds.
pub fn classify_risk(score: f64) -> &'static str {
    if score <= 0.01 {
        "clean"
    } else if score <= 0.10 {
        "low"
    } else if score <= 0.25 {
        "medium"
    } else if score <= 0.50 {
        "high"
    } else {
        "critical"
    }
}
