pub mod cluster;
pub mod factor_graph;
pub mod propagation;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::flags::{DependencyGroup, EdgeType, CURRENT_SNAPSHOT_ID};
use crate::core::{address_type, Transaction};

/// Synthetic destination node for negative gating edges on CoinJoin inputs.
pub const MIXER_COORDINATOR: &str = "Mixer_Coordinator";

/// A directional, probabilistic linkage in the UTXO graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEdge {
    pub edge_id: String,
    pub created_height: i32,
    pub src_node_id: String,
    pub dst_node_id: String,
    pub edge_type: i16,
    /// Log-Likelihood Ratio; negative values push the posterior away from
    /// the same-entity hypothesis.
    pub llr_score: f64,
    pub dependency_group: i32,
    /// Version of the heuristics engine that generated this edge.
    pub snapshot_id: i64,
    /// SHA-256 digest of the canonical serialization, set at creation and
    /// never rewritten.
    pub audit_hash: String,
}

/// Factor-graph posterior evaluation over a set of evidence edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub posterior_llr: f64,
    /// "high"/"medium"/"low"/"rejected"
    pub confidence_level: String,
    pub discounted_edges: usize,
    pub total_edges: usize,
    pub effective_factors: usize,
}

/// Convert a probability in [0, 1] into a Log-Likelihood Ratio,
/// LLR = log10(p / (1 - p)), saturating at ±999 at the extremes.
pub fn prob_to_llr(probability: f64) -> f64 {
    if probability >= 1.0 {
        return 999.0;
    }
    if probability <= 0.0 {
        return -999.0;
    }
    (probability / (1.0 - probability)).log10()
}

/// Invert an LLR back to a probability: P = 10^LLR / (1 + 10^LLR),
/// saturating outside |LLR| > 10.
pub fn llr_to_prob(llr: f64) -> f64 {
    if llr > 10.0 {
        return 0.999;
    }
    if llr < -10.0 {
        return 0.001;
    }
    let odds = 10f64.powf(llr);
    odds / (1.0 + odds)
}

/// Instantiate an edge with a fresh opaque id and its immutable audit hash.
pub fn create_edge(
    src: &str,
    dst: &str,
    edge_type: EdgeType,
    llr: f64,
    dep_group: DependencyGroup,
    height: i32,
    snapshot_id: i64,
) -> EvidenceEdge {
    let edge_id = Uuid::new_v4().to_string();

    // Canonical serialization of the exact inference state at creation.
    let payload = format!(
        "{}|{}|{}|{}|{:.6}|{}|{}",
        edge_id,
        src,
        dst,
        edge_type.as_i16(),
        llr,
        dep_group.as_i32(),
        snapshot_id
    );
    let digest = Sha256::digest(payload.as_bytes());

    EvidenceEdge {
        edge_id,
        created_height: height,
        src_node_id: src.to_string(),
        dst_node_id: dst.to_string(),
        edge_type: edge_type.as_i16(),
        llr_score: llr,
        dependency_group: dep_group.as_i32(),
        snapshot_id,
        audit_hash: hex::encode(digest),
    }
}

/// Apply the Common-Input-Ownership Heuristic.
///
/// For a non-CoinJoin transaction, all inputs are bound to the first input's
/// address with confidence keyed on script-type homogeneity. For a CoinJoin,
/// negative gating edges are emitted instead so downstream clustering is
/// pushed away from the same-entity hypothesis.
pub fn generate_cioh_edges(
    tx: &Transaction,
    is_coinjoin: bool,
    current_height: i32,
) -> Vec<EvidenceEdge> {
    generate_cioh_edges_versioned(tx, is_coinjoin, current_height, CURRENT_SNAPSHOT_ID)
}

/// As [`generate_cioh_edges`] with an explicit snapshot id (used by shadow runs).
pub fn generate_cioh_edges_versioned(
    tx: &Transaction,
    is_coinjoin: bool,
    current_height: i32,
    snapshot_id: i64,
) -> Vec<EvidenceEdge> {
    let mut edges = Vec::new();

    if tx.inputs.len() < 2 {
        return edges; // nothing to cluster
    }

    if is_coinjoin {
        for input in &tx.inputs {
            // Hard boundary: CIOH invalidated.
            edges.push(create_edge(
                &input.address,
                MIXER_COORDINATOR,
                EdgeType::CiohInvalidated,
                -prob_to_llr(0.99),
                DependencyGroup::Coordination,
                current_height,
                snapshot_id,
            ));
            // Soft gating: coinjoin suspected.
            edges.push(create_edge(
                &input.address,
                MIXER_COORDINATOR,
                EdgeType::CoinjoinSuspected,
                -prob_to_llr(0.85),
                DependencyGroup::Coordination,
                current_height,
                snapshot_id,
            ));
        }
        return edges;
    }

    let primary = &tx.inputs[0].address;
    let primary_type = address_type(primary);
    let all_same_type = tx
        .inputs
        .iter()
        .skip(1)
        .all(|i| address_type(&i.address) == primary_type);

    // Mixing legacy and segwit inputs drops CIOH confidence significantly.
    let confidence = if all_same_type { 0.95 } else { 0.60 };

    for input in tx.inputs.iter().skip(1) {
        edges.push(create_edge(
            primary,
            &input.address,
            EdgeType::Cioh,
            prob_to_llr(confidence),
            DependencyGroup::ScriptHomogeneity,
            current_height,
            snapshot_id,
        ));
    }

    edges
}
