//! Address watchlist for real-time monitoring.
//!
//! Every analyzed transaction is checked against the watchlist; a watched
//! address appearing as input or output produces a hit. Lookups are O(1);
//! reads run concurrently during the hot path while writes are serialized.
//! A scan takes the read lock once, so one call sees a stable snapshot.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Transaction;

/// Metadata for a monitored address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedAddress {
    pub address: String,
    /// "theft"/"suspect"/"exchange"/"sanctioned"/"service"
    pub category: String,
    pub label: String,
    /// Investigation case reference.
    pub case_id: String,
    pub added_at: DateTime<Utc>,
    /// "info"/"low"/"medium"/"high"/"critical"
    pub alert_level: String,
}

/// A match found while scanning a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistHit {
    pub address: String,
    pub category: String,
    pub label: String,
    pub case_id: String,
    /// "input" or "output"
    pub direction: String,
    /// Sats involved.
    pub value: i64,
    pub alert_level: String,
}

/// Concurrent-safe address monitoring engine.
#[derive(Debug, Default)]
pub struct AddressWatchlist {
    inner: RwLock<HashMap<String, WatchedAddress>>,
}

impl AddressWatchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address for monitoring.
    pub fn add(&self, addr: &str, category: &str, label: &str, case_id: &str, alert_level: &str) {
        let mut map = self.inner.write().unwrap();
        map.insert(
            addr.to_string(),
            WatchedAddress {
                address: addr.to_string(),
                category: category.to_string(),
                label: label.to_string(),
                case_id: case_id.to_string(),
                added_at: Utc::now(),
                alert_level: alert_level.to_string(),
            },
        );
    }

    /// Stop monitoring an address.
    pub fn remove(&self, addr: &str) {
        self.inner.write().unwrap().remove(addr);
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.inner.read().unwrap().contains_key(addr)
    }

    pub fn get(&self, addr: &str) -> Option<WatchedAddress> {
        self.inner.read().unwrap().get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All watched addresses, sorted for stable output.
    pub fn list_all(&self) -> Vec<WatchedAddress> {
        let map = self.inner.read().unwrap();
        let mut list: Vec<WatchedAddress> = map.values().cloned().collect();
        list.sort_by(|a, b| a.address.cmp(&b.address));
        list
    }

    /// Scan a transaction for watchlisted addresses. Hits are reported
    /// inputs first (by index), then outputs (by index); both sides of the
    /// same address can hit.
    pub fn check_transaction(&self, tx: &Transaction) -> Vec<WatchlistHit> {
        let map = self.inner.read().unwrap();
        let mut hits = Vec::new();

        for input in &tx.inputs {
            if input.address.is_empty() {
                continue;
            }
            if let Some(entry) = map.get(&input.address) {
                hits.push(WatchlistHit {
                    address: input.address.clone(),
                    category: entry.category.clone(),
                    label: entry.label.clone(),
                    case_id: entry.case_id.clone(),
                    direction: "input".to_string(),
                    value: input.value,
                    alert_level: entry.alert_level.clone(),
                });
            }
        }

        for out in &tx.outputs {
            if out.address.is_empty() {
                continue;
            }
            if let Some(entry) = map.get(&out.address) {
                hits.push(WatchlistHit {
                    address: out.address.clone(),
                    category: entry.category.clone(),
                    label: entry.label.clone(),
                    case_id: entry.case_id.clone(),
                    direction: "output".to_string(),
                    value: out.value,
                    alert_level: entry.alert_level.clone(),
                });
            }
        }

        hits
    }
}

/// Alert severity for an investigation/watchlist role.
pub fn alert_level_for_role(role: &str) -> &'static str {
    match role {
        "theft" | "sanctioned" => "critical",
        "exchange" | "suspect" => "high",
        "service" => "medium",
        _ => "low",
    }
}

/// Baseline taint level for an investigation/watchlist role.
pub fn taint_level_for_role(role: &str) -> f64 {
    match role {
        "theft" | "sanctioned" => 1.0,
        "suspect" => 0.7,
        "service" => 0.4,
        _ => 0.2,
    }
}
