pub mod flags;

use serde::{Deserialize, Serialize};

use crate::evidence::{EvidenceEdge, InferenceResult};
use self::flags::FlagSet;

/// A Bitcoin transaction input with resolved prevout data.
/// `address` may be empty when the prevout could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxIn {
    pub txid: String,
    pub vout: u32,
    /// Prevout value in satoshis.
    pub value: i64,
    pub address: String,
    pub script_sig: String,
    /// nSequence: < 0xFFFFFFFE signals RBF (BIP125), 0xFFFFFFFF final.
    pub sequence: u32,
}

/// A Bitcoin transaction output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in satoshis.
    pub value: i64,
    pub address: String,
    pub script_pubkey: String,
}

/// A parsed Bitcoin transaction enriched with prevout data and block context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    /// Fee in satoshis, never negative. When prevouts are unknown the caller
    /// supplies its best estimate; fee-derived analyzers degrade gracefully.
    pub fee: i64,
    pub weight: i64,
    /// BIP141 virtual size.
    pub vsize: i64,
    pub locktime: u32,
    pub version: i32,
    /// 0 = unconfirmed.
    pub block_height: i32,
    /// Unix seconds; 0 = unknown.
    pub block_time: i64,
}

impl Transaction {
    pub fn total_input_value(&self) -> i64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    pub fn total_output_value(&self) -> i64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// Address type classification by prefix. Mainnet and testnet bech32
/// variants map to the same class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    Legacy,
    Segwit,
    P2shSegwit,
    Taproot,
    Unknown,
}

impl AddressType {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressType::Legacy => "legacy",
            AddressType::Segwit => "segwit",
            AddressType::P2shSegwit => "p2sh-segwit",
            AddressType::Taproot => "taproot",
            AddressType::Unknown => "unknown",
        }
    }
}

/// Classify an address by its prefix. This underpins script-type-match
/// change detection, CIOH confidence, and the migration tracker.
pub fn address_type(addr: &str) -> AddressType {
    if addr.starts_with("bc1p") || addr.starts_with("tb1p") {
        AddressType::Taproot
    } else if addr.starts_with("bc1q") || addr.starts_with("tb1q") {
        AddressType::Segwit
    } else if addr.starts_with('3') {
        AddressType::P2shSegwit
    } else if addr.starts_with('1') {
        AddressType::Legacy
    } else {
        AddressType::Unknown
    }
}

/// Common round denominations in satoshis, largest first.
const ROUND_DENOMINATIONS: &[i64] = &[
    100_000_000, // 1.0 BTC
    50_000_000,  // 0.5 BTC
    10_000_000,  // 0.1 BTC
    5_000_000,   // 0.05 BTC
    1_000_000,   // 0.01 BTC
    500_000,     // 0.005 BTC
    100_000,     // 0.001 BTC
    50_000,      // 0.0005 BTC
    10_000,      // 0.0001 BTC
];

/// Whether a satoshi value is a human "round" BTC amount (a multiple of a
/// common denomination). Payments tend to be round; change almost never is.
pub fn is_round_amount(sats: i64) -> bool {
    if sats <= 0 {
        return false;
    }
    ROUND_DENOMINATIONS.iter().any(|d| sats % d == 0)
}

/// Multiplicity of the most common value in a list. Returns (value, count);
/// (0, 0) for an empty list. Ties break toward the smaller value so callers
/// stay deterministic.
pub fn modal_value(values: impl Iterator<Item = i64>) -> (i64, usize) {
    let mut counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(i64, usize)> = None;
    for (v, c) in counts {
        match best {
            None => best = Some((v, c)),
            Some((bv, bc)) if c > bc || (c == bc && v < bv) => best = Some((v, c)),
            _ => {}
        }
    }
    best.unwrap_or((0, 0))
}

// ─── Sub-result records ─────────────────────────────────────────────────────
//
// Every optional analyzer output is an owned value; AnalysisResult carries
// them as Option fields. Nothing in the data model is cyclic.

/// Detected change output for non-CoinJoin transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOutput {
    pub index: usize,
    pub confidence: f64,
    /// Which sub-heuristics agreed, joined with '+'.
    pub method: String,
    pub is_round_payment: bool,
}

/// Boltzmann transaction entropy analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyResult {
    /// log2(interpretations) in bits.
    pub entropy: f64,
    pub max_entropy: f64,
    /// entropy / max_entropy, capped at 1.0.
    pub efficiency: f64,
    /// "transparent"/"low"/"moderate"/"high"/"maximum"
    pub level: String,
    pub interpretations: u64,
}

impl Default for EntropyResult {
    fn default() -> Self {
        Self {
            entropy: 0.0,
            max_entropy: 0.0,
            efficiency: 0.0,
            level: "transparent".to_string(),
            interpretations: 1,
        }
    }
}

/// Fee-rate intelligence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAnalysisResult {
    /// sat/vB
    pub fee_rate: f64,
    /// "minimal"/"economic"/"normal"/"priority"/"urgent"/"unknown"
    pub fee_rate_class: String,
    /// "1sat"/"5sat"/"10sat"/"precise"/"none"
    pub rounding_pattern: String,
    pub wallet_hint: String,
    pub overpay_ratio: f64,
    pub unnecessary_inputs: usize,
}

impl Default for FeeAnalysisResult {
    fn default() -> Self {
        Self {
            fee_rate: 0.0,
            fee_rate_class: "unknown".to_string(),
            rounding_pattern: "none".to_string(),
            wallet_hint: "unknown".to_string(),
            overpay_ratio: 1.0,
            unnecessary_inputs: 0,
        }
    }
}

/// Peel chain detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeelChainResult {
    pub is_chain: bool,
    /// Single step detected per-tx; a cross-tx scanner upgrades this.
    pub chain_length: usize,
    pub direction: String,
    pub confidence: f64,
    pub change_index: i32,
}

/// Dust attack detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustResult {
    pub has_dust_outputs: bool,
    pub has_dust_inputs: bool,
    pub dust_output_count: usize,
    pub dust_input_count: usize,
    pub total_dust_value: i64,
    /// "surveillance"/"spam"/"consolidation"/"none"
    pub intent: String,
    /// "critical"/"high"/"medium"/"low"/"none"
    pub risk_level: String,
}

impl Default for DustResult {
    fn default() -> Self {
        Self {
            has_dust_outputs: false,
            has_dust_inputs: false,
            dust_output_count: 0,
            dust_input_count: 0,
            total_dust_value: 0,
            intent: "none".to_string(),
            risk_level: "none".to_string(),
        }
    }
}

/// CoinJoin unmixability analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmixResult {
    pub unmixable_outputs: usize,
    pub total_outputs: usize,
    pub deterministic_links: usize,
    /// 0.0 (perfect mix) to 1.0 (fully linkable).
    pub linkability_score: f64,
    pub weak_participants: usize,
    /// "perfect"/"strong"/"moderate"/"weak"/"broken"
    pub mix_quality: String,
}

impl Default for UnmixResult {
    fn default() -> Self {
        Self {
            unmixable_outputs: 0,
            total_outputs: 0,
            deterministic_links: 0,
            linkability_score: 0.0,
            weak_participants: 0,
            mix_quality: "perfect".to_string(),
        }
    }
}

/// UTXO graph topology metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyResult {
    pub shape: String,
    pub fan_in: usize,
    pub fan_out: usize,
    /// |I-O|/max(I,O): 0 = symmetric.
    pub io_symmetry: f64,
    /// 0 = equal outputs, 1 = concentrated.
    pub gini_coefficient: f64,
    pub is_hub: bool,
    /// "dispersed"/"moderate"/"concentrated"
    pub value_concentration: String,
}

/// Calibrated privacy score decomposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: i32,
    pub anon_set_factor: i32,
    pub entropy_factor: i32,
    pub change_detection: i32,
    pub wallet_leakage: i32,
    pub peel_chain_penalty: i32,
    pub dust_risk: i32,
    pub topology_penalty: i32,
    pub unmix_penalty: i32,
    pub address_reuse: i32,
    /// Final traceability probability, 0.0 - 1.0.
    pub traceability: f64,
}

/// Input UTXO lifespan analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoAgeResult {
    pub avg_age_days: f64,
    pub max_age_days: f64,
    pub min_age_days: f64,
    /// Σ(value_btc × age_days)
    pub coin_days_destroyed: f64,
    /// "hot-wallet"/"service"/"user"/"hodler"/"ancient"/"unknown"
    pub holding_pattern: String,
    pub has_ancient_utxo: bool,
}

impl Default for UtxoAgeResult {
    fn default() -> Self {
        Self {
            avg_age_days: 0.0,
            max_age_days: 0.0,
            min_age_days: 0.0,
            coin_days_destroyed: 0.0,
            holding_pattern: "unknown".to_string(),
            has_ancient_utxo: false,
        }
    }
}

/// Value fingerprinting results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePatternResult {
    pub has_round_btc: bool,
    pub has_round_sats: bool,
    /// Matched exchange fee pattern, or "none".
    pub known_service_fee: String,
    pub output_value_entropy: f64,
    pub dominant_denomination: i64,
    pub unique_value_ratio: f64,
}

impl Default for ValuePatternResult {
    fn default() -> Self {
        Self {
            has_round_btc: false,
            has_round_sats: false,
            known_service_fee: "none".to_string(),
            output_value_entropy: 0.0,
            dominant_denomination: 0,
            unique_value_ratio: 0.0,
        }
    }
}

/// Deep script template inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    pub has_multisig: bool,
    pub multisig_m: u8,
    pub multisig_n: u8,
    pub has_htlc: bool,
    pub has_op_return: bool,
    pub op_return_protocol: String,
    pub op_return_size: usize,
    /// "v0"/"v1"/"legacy"
    pub dominant_witness: String,
    /// 0 = key-path only (optimal privacy).
    pub tapscript_depth: u8,
}

impl Default for ScriptAnalysis {
    fn default() -> Self {
        Self {
            has_multisig: false,
            multisig_m: 0,
            multisig_n: 0,
            has_htlc: false,
            has_op_return: false,
            op_return_protocol: String::new(),
            op_return_size: 0,
            dominant_witness: "legacy".to_string(),
            tapscript_depth: 0,
        }
    }
}

/// Complete per-transaction analysis produced by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub txid: String,
    /// Clamped to [0, 100].
    pub privacy_score: i32,
    pub anon_set: usize,
    pub heuristic_flags: FlagSet,
    pub edges: Vec<EvidenceEdge>,
    pub inference: Option<InferenceResult>,
    pub change_output: Option<ChangeOutput>,
    pub wallet_family: String,
    pub whirlpool_pool: String,
    pub entropy: Option<EntropyResult>,
    pub fee_analysis: Option<FeeAnalysisResult>,
    pub peel_chain: Option<PeelChainResult>,
    pub dust_analysis: Option<DustResult>,
    pub unmix_result: Option<UnmixResult>,
    pub topology: Option<TopologyResult>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub utxo_age: Option<UtxoAgeResult>,
    pub value_pattern: Option<ValuePatternResult>,
    pub script_info: Option<ScriptAnalysis>,
}
