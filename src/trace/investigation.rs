//! Investigation case management.
//!
//! An investigator opens a case with theft addresses, runs a fund flow
//! trace, tags addresses, reviews the timeline and exit points, and
//! exports the evidence. Each case holds a persistent flow graph updated
//! as new on-chain data appears.
//!
//! Lifecycle: active → paused → completed → archived.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FlowGraph, FlowNode, TraceConfig};
use crate::error::{EngineError, Result};

/// A single incident response case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    pub id: String,
    pub name: String,
    pub description: String,
    /// "active"/"paused"/"completed"/"archived"
    pub status: String,
    pub theft_addresses: Vec<String>,
    pub tagged_addresses: Vec<TaggedAddress>,
    pub flow_graph: Option<FlowGraph>,
    /// Total sats stolen.
    pub total_stolen: i64,
    /// Sats at identified exchange exits.
    pub total_recovered: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub trace_config: TraceConfig,
}

/// Investigator-provided address metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedAddress {
    pub address: String,
    pub label: String,
    /// "theft"/"suspect"/"exchange"/"service"/"unknown"
    pub role: String,
    pub notes: String,
    pub hop_number: usize,
    pub value: i64,
    pub tagged_at: DateTime<Utc>,
    pub tagged_by: String,
}

/// A chronological event in the investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: Option<DateTime<Utc>>,
    /// "theft"/"transfer"/"mixer_entry"/"exchange_deposit"/"tagged"
    pub event_type: String,
    pub description: String,
    pub txid: String,
    pub from_address: String,
    pub to_address: String,
    pub value: i64,
    pub hop_number: usize,
}

impl Investigation {
    /// Open a new active case with default trace limits.
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        theft_addresses: Vec<String>,
        total_stolen: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            status: "active".to_string(),
            theft_addresses,
            tagged_addresses: Vec::new(),
            flow_graph: None,
            total_stolen,
            total_recovered: 0,
            created_at: now,
            updated_at: now,
            trace_config: TraceConfig::default(),
        }
    }

    /// Initialize the flow graph from the theft addresses.
    pub fn run_trace(&mut self) {
        let mut graph = FlowGraph::from_sources(&self.theft_addresses);
        graph.investigation_id = self.id.clone();
        self.flow_graph = Some(graph);
        self.updated_at = Utc::now();
    }

    /// Attach a label and role to an address; replaces any prior tag and
    /// flags the matching flow graph node.
    pub fn tag_address(&mut self, addr: &str, label: &str, role: &str, notes: &str, tagged_by: &str) {
        let tag = TaggedAddress {
            address: addr.to_string(),
            label: label.to_string(),
            role: role.to_string(),
            notes: notes.to_string(),
            hop_number: 0,
            value: 0,
            tagged_at: Utc::now(),
            tagged_by: tagged_by.to_string(),
        };

        if let Some(existing) = self
            .tagged_addresses
            .iter_mut()
            .find(|t| t.address == addr)
        {
            *existing = tag;
        } else {
            self.tagged_addresses.push(tag);
        }
        self.updated_at = Utc::now();

        if let Some(graph) = &mut self.flow_graph {
            if let Some(node) = graph.nodes.iter_mut().find(|n| n.address == addr) {
                node.label = label.to_string();
                node.role = role.to_string();
                node.is_flagged = true;
            }
        }
    }

    /// Flatten theft events, flow edges, exchange deposits and tagging
    /// events into one timeline. Flow events arrive in insertion (hop)
    /// order.
    pub fn timeline(&self) -> Vec<TimelineEvent> {
        let mut events = Vec::new();

        for addr in &self.theft_addresses {
            events.push(TimelineEvent {
                timestamp: Some(self.created_at),
                event_type: "theft".to_string(),
                description: "Funds stolen from address".to_string(),
                txid: String::new(),
                from_address: String::new(),
                to_address: addr.clone(),
                value: self.total_stolen,
                hop_number: 0,
            });
        }

        if let Some(graph) = &self.flow_graph {
            for edge in &graph.edges {
                let (event_type, description) = if edge.is_coinjoin {
                    ("mixer_entry", "Funds entered CoinJoin mixer")
                } else {
                    ("transfer", "Fund transfer")
                };
                events.push(TimelineEvent {
                    timestamp: Some(edge.timestamp),
                    event_type: event_type.to_string(),
                    description: description.to_string(),
                    txid: edge.txid.clone(),
                    from_address: edge.from_address.clone(),
                    to_address: edge.to_address.clone(),
                    value: edge.value,
                    hop_number: edge.hop_number,
                });
            }

            for node in &graph.nodes {
                if node.role == "exchange" {
                    events.push(TimelineEvent {
                        timestamp: None,
                        event_type: "exchange_deposit".to_string(),
                        description: format!("Funds deposited to {}", node.label),
                        txid: String::new(),
                        from_address: String::new(),
                        to_address: node.address.clone(),
                        value: node.value_received,
                        hop_number: node.hop_number,
                    });
                }
            }
        }

        for tag in &self.tagged_addresses {
            events.push(TimelineEvent {
                timestamp: Some(tag.tagged_at),
                event_type: "tagged".to_string(),
                description: format!("Address tagged as: {}", tag.label),
                txid: String::new(),
                from_address: String::new(),
                to_address: tag.address.clone(),
                value: 0,
                hop_number: tag.hop_number,
            });
        }

        events
    }

    /// Exchange deposit points discovered by the trace.
    pub fn exchange_exits(&self) -> Vec<&FlowNode> {
        self.flow_graph
            .as_ref()
            .map(|g| g.exit_points())
            .unwrap_or_default()
    }

    /// Total value at identified exchange exits, cached on the case.
    pub fn compute_recovery(&mut self) -> i64 {
        let total = self
            .exchange_exits()
            .iter()
            .map(|n| n.value_received)
            .sum();
        self.total_recovered = total;
        total
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
        self.updated_at = Utc::now();
    }
}

/// Case registry with serialized writes and concurrent reads.
#[derive(Debug, Default)]
pub struct InvestigationManager {
    cases: RwLock<HashMap<String, Investigation>>,
}

impl InvestigationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new case. A duplicate case id is a conflict.
    pub fn create(
        &self,
        id: &str,
        name: &str,
        description: &str,
        theft_addresses: Vec<String>,
        total_stolen: i64,
    ) -> Result<Investigation> {
        let mut cases = self.cases.write().unwrap();
        if cases.contains_key(id) {
            return Err(EngineError::Conflict(format!("investigation {id} already exists")));
        }
        let inv = Investigation::new(id, name, description, theft_addresses, total_stolen);
        cases.insert(id.to_string(), inv.clone());
        Ok(inv)
    }

    pub fn get(&self, id: &str) -> Result<Investigation> {
        self.cases
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("investigation {id}")))
    }

    /// Replace a stored case with its updated value.
    pub fn update(&self, inv: Investigation) {
        self.cases.write().unwrap().insert(inv.id.clone(), inv);
    }

    /// All cases, sorted by id.
    pub fn list(&self) -> Vec<Investigation> {
        let cases = self.cases.read().unwrap();
        let mut list: Vec<Investigation> = cases.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn len(&self) -> usize {
        self.cases.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> Investigation {
        Investigation::new(
            "case-1",
            "Exchange Hack",
            "Hot wallet drained",
            vec!["theft_a".to_string()],
            500_000_000,
        )
    }

    #[test]
    fn new_case_defaults() {
        let inv = case();
        assert_eq!(inv.status, "active");
        assert_eq!(inv.total_stolen, 500_000_000);
        assert_eq!(inv.trace_config.max_hops, 10);
        assert!(inv.flow_graph.is_none());
    }

    #[test]
    fn trace_initializes_graph() {
        let mut inv = case();
        inv.run_trace();
        let graph = inv.flow_graph.as_ref().expect("graph");
        assert_eq!(graph.investigation_id, "case-1");
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].role, "theft");
    }

    #[test]
    fn tagging_updates_graph_node() {
        let mut inv = case();
        inv.run_trace();
        inv.flow_graph
            .as_mut()
            .unwrap()
            .add_hop("theft_a", "mid_1", "tx1", 100_000, 1, false, 0.9);

        inv.tag_address("mid_1", "Suspect Wallet", "suspect", "", "analyst-1");

        assert_eq!(inv.tagged_addresses.len(), 1);
        let node = inv
            .flow_graph
            .as_ref()
            .unwrap()
            .nodes
            .iter()
            .find(|n| n.address == "mid_1")
            .unwrap();
        assert_eq!(node.role, "suspect");
        assert!(node.is_flagged);

        // Re-tagging replaces, not duplicates.
        inv.tag_address("mid_1", "Binance Deposit", "exchange", "", "analyst-1");
        assert_eq!(inv.tagged_addresses.len(), 1);
        assert_eq!(inv.tagged_addresses[0].role, "exchange");
    }

    #[test]
    fn timeline_flattens_all_sources() {
        let mut inv = case();
        inv.run_trace();
        {
            let graph = inv.flow_graph.as_mut().unwrap();
            graph.add_hop("theft_a", "mixer_1", "tx1", 400_000_000, 1, true, 0.5);
            graph.add_hop("mixer_1", "deposit_1", "tx2", 390_000_000, 2, false, 0.4);
            graph.mark_exchange_exit("deposit_1", "Kraken");
        }
        inv.tag_address("deposit_1", "Kraken Deposit", "exchange", "", "analyst-1");

        let timeline = inv.timeline();
        let types: Vec<&str> = timeline.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"theft"));
        assert!(types.contains(&"mixer_entry"));
        assert!(types.contains(&"transfer"));
        assert!(types.contains(&"exchange_deposit"));
        assert!(types.contains(&"tagged"));
    }

    #[test]
    fn recovery_accounting() {
        let mut inv = case();
        inv.run_trace();
        {
            let graph = inv.flow_graph.as_mut().unwrap();
            graph.add_hop("theft_a", "deposit_1", "tx1", 300_000_000, 1, false, 0.9);
            graph.add_hop("theft_a", "deposit_2", "tx2", 100_000_000, 1, false, 0.9);
            graph.mark_exchange_exit("deposit_1", "Kraken");
            graph.mark_exchange_exit("deposit_2", "Binance");
        }

        assert_eq!(inv.compute_recovery(), 400_000_000);
        assert_eq!(inv.total_recovered, 400_000_000);
        assert_eq!(inv.exchange_exits().len(), 2);
    }

    #[test]
    fn manager_crud_and_conflicts() {
        let manager = InvestigationManager::new();
        manager
            .create("c1", "Case", "", vec!["a".to_string()], 1_000)
            .expect("create");

        let dup = manager.create("c1", "Case", "", vec![], 0);
        assert!(matches!(dup, Err(EngineError::Conflict(_))));

        let missing = manager.get("nope");
        assert!(matches!(missing, Err(EngineError::NotFound(_))));

        let mut inv = manager.get("c1").expect("get");
        inv.set_status("completed");
        manager.update(inv);
        assert_eq!(manager.get("c1").unwrap().status, "completed");
        assert_eq!(manager.len(), 1);
    }
}
