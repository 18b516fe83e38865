//! Address clustering via weighted union-find with path compression.
//!
//! Merges addresses into entity clusters from evidence edges. Gating is
//! strict: CoinJoin-invalidated and PayJoin-suspect edges never merge, and
//! weaker edge families require progressively stronger LLR.

use std::collections::HashMap;

use crate::core::flags::EdgeType;
use crate::core::Transaction;

use super::EvidenceEdge;

/// Weighted union-find over address strings.
#[derive(Debug, Default)]
pub struct ClusterEngine {
    parent: HashMap<String, String>,
    rank: HashMap<String, u32>,
    size: HashMap<String, usize>,
}

impl ClusterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root representative of the cluster containing `addr`, with path
    /// compression. Unknown addresses become their own singleton cluster.
    pub fn find(&mut self, addr: &str) -> String {
        if !self.parent.contains_key(addr) {
            self.parent.insert(addr.to_string(), addr.to_string());
            self.rank.insert(addr.to_string(), 0);
            self.size.insert(addr.to_string(), 1);
            return addr.to_string();
        }

        // Iterative find with path compression: no recursion so deep chains
        // cannot exhaust the stack.
        let mut root = addr.to_string();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }
        let mut cur = addr.to_string();
        while self.parent[&cur] != root {
            let next = self.parent[&cur].clone();
            self.parent.insert(cur, root.clone());
            cur = next;
        }
        root
    }

    /// Merge the clusters containing the two addresses, union by rank.
    /// Returns true when a merge actually occurred.
    pub fn union(&mut self, addr1: &str, addr2: &str) -> bool {
        let root1 = self.find(addr1);
        let root2 = self.find(addr2);

        if root1 == root2 {
            return false;
        }

        let rank1 = self.rank[&root1];
        let rank2 = self.rank[&root2];

        if rank1 < rank2 {
            let s = self.size[&root1];
            self.parent.insert(root1, root2.clone());
            *self.size.get_mut(&root2).unwrap() += s;
        } else if rank1 > rank2 {
            let s = self.size[&root2];
            self.parent.insert(root2, root1.clone());
            *self.size.get_mut(&root1).unwrap() += s;
        } else {
            let s = self.size[&root2];
            self.parent.insert(root2, root1.clone());
            *self.size.get_mut(&root1).unwrap() += s;
            *self.rank.get_mut(&root1).unwrap() += 1;
        }

        true
    }

    /// Process evidence edges and merge addresses. Only strong ownership
    /// signals merge; gating edge families never do.
    pub fn merge_from_edges(&mut self, edges: &[EvidenceEdge]) -> usize {
        let mut merge_count = 0;

        for edge in edges {
            let merged = if edge.edge_type == EdgeType::Cioh.as_i16() {
                self.union(&edge.src_node_id, &edge.dst_node_id)
            } else if edge.edge_type == EdgeType::Change.as_i16() {
                edge.llr_score >= 1.5 && self.union(&edge.src_node_id, &edge.dst_node_id)
            } else if edge.edge_type == EdgeType::CiohInvalidated.as_i16()
                || edge.edge_type == EdgeType::CoinjoinSuspected.as_i16()
                || edge.edge_type == EdgeType::PayJoinSuspect.as_i16()
            {
                false
            } else if edge.edge_type == EdgeType::PeelChain.as_i16() {
                edge.llr_score >= 2.0 && self.union(&edge.src_node_id, &edge.dst_node_id)
            } else {
                edge.llr_score >= 3.0 && self.union(&edge.src_node_id, &edge.dst_node_id)
            };

            if merged {
                merge_count += 1;
            }
        }

        merge_count
    }

    /// Apply CIOH to a single transaction: all inputs of a non-CoinJoin
    /// transaction merge into one cluster.
    pub fn merge_from_transaction(&mut self, tx: &Transaction, is_coinjoin: bool) -> usize {
        if is_coinjoin || tx.inputs.len() < 2 {
            return 0;
        }

        let first = tx.inputs[0].address.clone();
        let mut merge_count = 0;
        for input in tx.inputs.iter().skip(1) {
            if !input.address.is_empty() && input.address != first && self.union(&first, &input.address) {
                merge_count += 1;
            }
        }
        merge_count
    }

    /// All addresses sharing a cluster with `addr`.
    pub fn cluster_of(&mut self, addr: &str) -> Vec<String> {
        let root = self.find(addr);
        let members: Vec<String> = self.parent.keys().cloned().collect();
        members
            .into_iter()
            .filter(|a| self.find(a) == root)
            .collect()
    }

    pub fn cluster_size(&mut self, addr: &str) -> usize {
        let root = self.find(addr);
        self.size[&root]
    }

    pub fn total_clusters(&mut self) -> usize {
        let members: Vec<String> = self.parent.keys().cloned().collect();
        let mut roots = std::collections::HashSet::new();
        for a in members {
            roots.insert(self.find(&a));
        }
        roots.len()
    }

    pub fn total_addresses(&self) -> usize {
        self.parent.len()
    }
}
