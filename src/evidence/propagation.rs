//! Cross-transaction evidence propagation.
//!
//! A CIOH edge linking A→B in one transaction says nothing about a later
//! spend B→C on its own. Composing the chain with a per-hop decay yields a
//! transitive A→C edge whose strength reflects the growing uncertainty that
//! some intermediate address belongs to a distinct entity (mixer, exchange).

use serde::{Deserialize, Serialize};

use super::{create_edge, llr_to_prob, EvidenceEdge};
use crate::core::flags::{DependencyGroup, EdgeType, CURRENT_SNAPSHOT_ID};

/// Per-hop evidence decay factor; evidence decays below usefulness after
/// five hops.
pub const DEFAULT_HOP_DECAY: f64 = 0.76;

/// Maximum number of hops to propagate.
pub const MAX_PROPAGATION_HOPS: usize = 5;

/// Minimum decayed LLR for a transitive edge to be emitted.
pub const MIN_TRANSITIVE_LLR: f64 = 0.5;

/// One hop in a multi-hop evidence chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChainLink {
    pub edge_id: String,
    pub from_addr: String,
    pub to_addr: String,
    pub llr: f64,
    pub edge_type: i16,
    pub hop_number: usize,
}

/// A transitive evidence edge spanning multiple hops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagatedEdge {
    pub original_edges: Vec<EvidenceChainLink>,
    /// Raw sum of chain LLRs.
    pub total_llr: f64,
    /// After hop decay.
    pub decayed_llr: f64,
    pub hops: usize,
    pub source_addr: String,
    pub sink_addr: String,
    /// Posterior probability of the transitive link.
    pub confidence: f64,
}

/// Compose a chain of evidence edges into a transitive edge with
/// LLR = Σ LLR_i × decay^(hops−1). Returns None for chains outside
/// [2, MAX_PROPAGATION_HOPS] or whose decayed strength falls below
/// MIN_TRANSITIVE_LLR.
pub fn propagate_evidence(chain: &[EvidenceEdge], hop_decay: f64) -> Option<PropagatedEdge> {
    if chain.len() < 2 {
        return None;
    }

    let decay = if hop_decay <= 0.0 || hop_decay > 1.0 {
        DEFAULT_HOP_DECAY
    } else {
        hop_decay
    };

    let hops = chain.len();
    if hops > MAX_PROPAGATION_HOPS {
        return None; // evidence too weak to be actionable
    }

    let mut total_llr = 0.0;
    let mut links = Vec::with_capacity(hops);
    for (i, edge) in chain.iter().enumerate() {
        total_llr += edge.llr_score;
        links.push(EvidenceChainLink {
            edge_id: edge.edge_id.clone(),
            from_addr: edge.src_node_id.clone(),
            to_addr: edge.dst_node_id.clone(),
            llr: edge.llr_score,
            edge_type: edge.edge_type,
            hop_number: i + 1,
        });
    }

    let decayed_llr = total_llr * decay.powi(hops as i32 - 1);
    if decayed_llr < MIN_TRANSITIVE_LLR {
        return None;
    }

    let confidence = llr_to_prob(decayed_llr);

    Some(PropagatedEdge {
        original_edges: links,
        total_llr: (total_llr * 100.0).round() / 100.0,
        decayed_llr: (decayed_llr * 100.0).round() / 100.0,
        hops,
        source_addr: chain[0].src_node_id.clone(),
        sink_addr: chain[chain.len() - 1].dst_node_id.clone(),
        confidence: (confidence * 1000.0).round() / 1000.0,
    })
}

/// Convert a propagated edge into a standard evidence edge for the graph.
pub fn build_transitive_edge(prop: &PropagatedEdge) -> EvidenceEdge {
    create_edge(
        &prop.source_addr,
        &prop.sink_addr,
        EdgeType::Transitive,
        prop.decayed_llr,
        DependencyGroup::None,
        0,
        CURRENT_SNAPSHOT_ID,
    )
}

/// Human-readable reliability band for a multi-hop chain.
pub fn chain_strength(hops: usize, decayed_llr: f64) -> &'static str {
    if hops <= 1 {
        return "direct";
    }
    if decayed_llr >= 3.0 {
        "strong"
    } else if decayed_llr >= 1.5 {
        "moderate"
    } else if decayed_llr >= 0.5 {
        "weak"
    } else {
        "trace"
    }
}

/// How many hops evidence of the given initial strength can travel before
/// decaying below the transitive minimum.
pub fn estimate_max_reach(initial_llr: f64, hop_decay: f64) -> usize {
    if initial_llr <= MIN_TRANSITIVE_LLR || hop_decay <= 0.0 || hop_decay >= 1.0 {
        return 0;
    }
    for hops in 1..=10 {
        if initial_llr * hop_decay.powi(hops as i32) < MIN_TRANSITIVE_LLR {
            return hops;
        }
    }
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_edge(src: &str, dst: &str, llr: f64) -> EvidenceEdge {
        EvidenceEdge {
            edge_id: format!("{src}-{dst}"),
            src_node_id: src.to_string(),
            dst_node_id: dst.to_string(),
            edge_type: 1,
            llr_score: llr,
            ..Default::default()
        }
    }

    #[test]
    fn two_hop_chain_decays() {
        let chain = vec![chain_edge("A", "B", 3.0), chain_edge("B", "C", 2.0)];
        let prop = propagate_evidence(&chain, DEFAULT_HOP_DECAY).expect("edge emitted");

        assert_eq!(prop.hops, 2);
        assert_eq!(prop.source_addr, "A");
        assert_eq!(prop.sink_addr, "C");
        // (3 + 2) * 0.76 = 3.8
        assert!((prop.decayed_llr - 3.8).abs() < 1e-9);
        assert!(prop.confidence > 0.99);
    }

    #[test]
    fn weak_chain_dropped() {
        let chain = vec![chain_edge("A", "B", 0.3), chain_edge("B", "C", 0.2)];
        assert!(propagate_evidence(&chain, DEFAULT_HOP_DECAY).is_none());
    }

    #[test]
    fn single_hop_not_propagated() {
        let chain = vec![chain_edge("A", "B", 3.0)];
        assert!(propagate_evidence(&chain, DEFAULT_HOP_DECAY).is_none());
    }

    #[test]
    fn too_many_hops_refused() {
        let chain: Vec<EvidenceEdge> = (0..6)
            .map(|i| chain_edge(&format!("N{i}"), &format!("N{}", i + 1), 3.0))
            .collect();
        assert!(propagate_evidence(&chain, DEFAULT_HOP_DECAY).is_none());
    }

    #[test]
    fn invalid_decay_falls_back_to_default() {
        let chain = vec![chain_edge("A", "B", 3.0), chain_edge("B", "C", 2.0)];
        let prop = propagate_evidence(&chain, 0.0).expect("edge emitted");
        assert!((prop.decayed_llr - 3.8).abs() < 1e-9);
    }

    #[test]
    fn transitive_edge_shape() {
        let chain = vec![chain_edge("A", "B", 3.0), chain_edge("B", "C", 2.0)];
        let prop = propagate_evidence(&chain, DEFAULT_HOP_DECAY).unwrap();
        let edge = build_transitive_edge(&prop);

        assert_eq!(edge.edge_type, EdgeType::Transitive.as_i16());
        assert_eq!(edge.dependency_group, DependencyGroup::None.as_i32());
        assert_eq!(edge.src_node_id, "A");
        assert_eq!(edge.dst_node_id, "C");
        assert_eq!(edge.snapshot_id, CURRENT_SNAPSHOT_ID);
    }

    #[test]
    fn strength_bands() {
        assert_eq!(chain_strength(1, 5.0), "direct");
        assert_eq!(chain_strength(2, 3.5), "strong");
        assert_eq!(chain_strength(3, 2.0), "moderate");
        assert_eq!(chain_strength(3, 0.6), "weak");
        assert_eq!(chain_strength(4, 0.1), "trace");
    }

    #[test]
    fn max_reach() {
        assert_eq!(estimate_max_reach(0.4, DEFAULT_HOP_DECAY), 0);
        assert!(estimate_max_reach(3.0, DEFAULT_HOP_DECAY) >= 5);
        assert_eq!(estimate_max_reach(3.0, 1.5), 0);
    }
}
