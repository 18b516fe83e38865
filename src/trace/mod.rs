//! Fund flow tracing.
//!
//! Given theft addresses, downstream UTXO flows are recorded hop-by-hop as
//! a directed acyclic graph: where the value went, which hops passed
//! mixers, and where it exited to exchanges. The graph itself is not
//! thread-safe; one investigation's updates are serialized by its owner.

pub mod exchange;
pub mod investigation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-hop risk decay base.
const HOP_DECAY: f64 = 0.85;

/// The complete fund flow from a set of theft addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub investigation_id: String,
    /// Theft addresses.
    pub source_addresses: Vec<String>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    /// Total sats across edges.
    pub total_tracked: i64,
    pub max_hop_reached: usize,
    pub exchange_exits: usize,
    pub mixers_passed: usize,
    pub created_at: Option<DateTime<Utc>>,
}

/// A single address in the flow graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub address: String,
    /// Distance from the theft.
    pub hop_number: usize,
    pub value_received: i64,
    pub value_sent: i64,
    /// "theft"/"intermediate"/"mixer"/"exchange"/"unspent"/"unknown"
    pub role: String,
    pub label: String,
    /// 0.0-1.0 from taint analysis.
    pub risk_score: f64,
    pub is_flagged: bool,
}

/// A single fund movement between addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from_address: String,
    pub to_address: String,
    pub txid: String,
    pub value: i64,
    pub hop_number: usize,
    /// Passed through a mixer.
    pub is_coinjoin: bool,
    /// 0-1, lower for mixer penetration.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Tracing limits for one investigation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub max_hops: usize,
    /// Branches to follow per hop.
    pub max_branches: usize,
    /// Ignore flows below this many sats.
    pub min_value: i64,
    pub min_confidence: f64,
    pub penetrate_mixers: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: 10,
            max_branches: 50,
            min_value: 10_000,
            min_confidence: 0.3,
            penetrate_mixers: true,
        }
    }
}

impl FlowGraph {
    /// Start a flow graph at the theft addresses: hop 0, maximum risk,
    /// flagged.
    pub fn from_sources(source_addresses: &[String]) -> Self {
        let nodes = source_addresses
            .iter()
            .map(|addr| FlowNode {
                address: addr.clone(),
                hop_number: 0,
                role: "theft".to_string(),
                risk_score: 1.0,
                is_flagged: true,
                ..Default::default()
            })
            .collect();

        Self {
            source_addresses: source_addresses.to_vec(),
            nodes,
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Extend the graph with a discovered fund movement. New destinations
    /// become intermediate (or mixer) nodes whose risk decays with hop
    /// distance; repeated destinations accumulate received value.
    #[allow(clippy::too_many_arguments)]
    pub fn add_hop(
        &mut self,
        from_addr: &str,
        to_addr: &str,
        txid: &str,
        value: i64,
        hop_num: usize,
        is_coinjoin: bool,
        confidence: f64,
    ) {
        self.edges.push(FlowEdge {
            from_address: from_addr.to_string(),
            to_address: to_addr.to_string(),
            txid: txid.to_string(),
            value,
            hop_number: hop_num,
            is_coinjoin,
            confidence,
            timestamp: Utc::now(),
        });

        self.total_tracked += value;
        if hop_num > self.max_hop_reached {
            self.max_hop_reached = hop_num;
        }

        if let Some(node) = self.nodes.iter_mut().find(|n| n.address == to_addr) {
            node.value_received += value;
            return;
        }

        let role = if is_coinjoin {
            self.mixers_passed += 1;
            "mixer"
        } else {
            "intermediate"
        };

        self.nodes.push(FlowNode {
            address: to_addr.to_string(),
            hop_number: hop_num,
            value_received: value,
            role: role.to_string(),
            risk_score: hop_risk(hop_num, confidence),
            ..Default::default()
        });
    }

    /// Tag a node as an exchange deposit — the cash-out point where KYC
    /// records become subpoenable.
    pub fn mark_exchange_exit(&mut self, addr: &str, exchange_name: &str) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.address == addr) {
            node.role = "exchange".to_string();
            node.label = exchange_name.to_string();
            node.is_flagged = true;
            self.exchange_exits += 1;
        }
    }

    /// All exchange exit nodes.
    pub fn exit_points(&self) -> Vec<&FlowNode> {
        self.nodes.iter().filter(|n| n.role == "exchange").collect()
    }

    /// Edges in chronological (insertion, hop-ordered) order.
    pub fn timeline(&self) -> &[FlowEdge] {
        &self.edges
    }

    /// Edges at a specific hop.
    pub fn hop(&self, hop: usize) -> Vec<&FlowEdge> {
        self.edges.iter().filter(|e| e.hop_number == hop).collect()
    }

    pub fn has_node(&self, addr: &str) -> bool {
        self.nodes.iter().any(|n| n.address == addr)
    }
}

/// Risk decays with distance from the theft but stays elevated for
/// high-confidence paths: 0.85^hop × confidence, clamped to [0, 1].
fn hop_risk(hop: usize, confidence: f64) -> f64 {
    (HOP_DECAY.powi(hop as i32) * confidence).clamp(0.0, 1.0)
}
