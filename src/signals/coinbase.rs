//! Coinbase and mining pool attribution.
//!
//! Coinbase transactions are uniquely identifiable (null prev-txid or
//! 0xFFFFFFFF vout); the scriptSig carries BIP34 height plus pool markers
//! that attribute the block to a mining pool.

use serde::{Deserialize, Serialize};

use crate::core::Transaction;

/// Mining pool analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinbaseResult {
    pub is_coinbase: bool,
    pub pool_name: String,
    pub pool_confidence: f64,
    /// Total block reward (subsidy + fees).
    pub block_reward: i64,
    pub output_count: usize,
    /// "single"/"fpps"/"pps"/"multi"/"unknown"
    pub payout_type: String,
}

impl Default for CoinbaseResult {
    fn default() -> Self {
        Self {
            is_coinbase: false,
            pool_name: "unknown".to_string(),
            pool_confidence: 0.0,
            block_reward: 0,
            output_count: 0,
            payout_type: "unknown".to_string(),
        }
    }
}

const NULL_TXID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Known pool markers found in coinbase scriptSig, lowercase.
const POOL_MARKERS: &[(&str, &str)] = &[
    ("foundry usa", "Foundry USA"),
    ("/foundry/", "Foundry USA"),
    ("antpool", "AntPool"),
    ("viabtc", "ViaBTC"),
    ("f2pool", "F2Pool"),
    ("slush", "Braiins Pool"),
    ("braiins", "Braiins Pool"),
    ("mara pool", "MARA Pool"),
    ("binance", "Binance Pool"),
    ("poolin", "Poolin"),
    ("btc.com", "BTC.com"),
    ("luxor", "Luxor"),
    ("sbicrypto", "SBI Crypto"),
    ("ocean", "OCEAN"),
    ("spider pool", "SpiderPool"),
    ("emcd", "EMCD"),
];

/// Identify a coinbase transaction and attribute it to a mining pool.
pub fn analyze_coinbase_tx(tx: &Transaction) -> CoinbaseResult {
    let mut result = CoinbaseResult::default();

    if !is_coinbase_tx(tx) {
        return result;
    }

    result.is_coinbase = true;
    result.output_count = tx.outputs.len();
    result.block_reward = tx.total_output_value();

    if let Some(input) = tx.inputs.first() {
        let (name, confidence) = identify_pool(&input.script_sig);
        result.pool_name = name.to_string();
        result.pool_confidence = confidence;
    }

    result.payout_type = classify_payout_type(tx).to_string();
    result
}

/// Coinbase: a single input with the null prev-txid or index 0xFFFFFFFF.
pub fn is_coinbase_tx(tx: &Transaction) -> bool {
    if tx.inputs.len() != 1 {
        return false;
    }
    let input = &tx.inputs[0];
    input.txid.is_empty() || input.txid == NULL_TXID || input.vout == 0xFFFF_FFFF
}

/// Match the coinbase scriptSig against known pool markers, preferring the
/// hex-decoded ASCII form (0.95) over a raw hex substring hit (0.85).
fn identify_pool(script_sig: &str) -> (&'static str, f64) {
    if script_sig.is_empty() {
        return ("unknown", 0.0);
    }

    let lower = script_sig.to_ascii_lowercase();
    let decoded = hex_to_printable_ascii(&lower);

    for &(marker, pool) in POOL_MARKERS {
        if decoded.contains(marker) {
            return (pool, 0.95);
        }
        if lower.contains(marker) {
            return (pool, 0.85);
        }
    }

    ("unknown", 0.0)
}

/// Best-effort hex → printable-ASCII decode, lowered.
fn hex_to_printable_ascii(hex: &str) -> String {
    let bytes = hex.as_bytes();
    let mut out = String::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i + 1 < bytes.len() {
        let b = (hex_nibble(bytes[i]) << 4) | hex_nibble(bytes[i + 1]);
        if (32..=126).contains(&b) {
            out.push(b as char);
        }
        i += 2;
    }
    out.to_ascii_lowercase()
}

fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

/// Reward distribution pattern by output count.
fn classify_payout_type(tx: &Transaction) -> &'static str {
    match tx.outputs.len() {
        1 => "single",
        2..=3 => "fpps",
        4..=10 => "pps",
        _ => "multi",
    }
}

/// Heuristic check for a transaction spending coinbase outputs: the origin
/// txid prefix looks null-like. A definitive answer needs a UTXO lookup.
pub fn is_coinbase_spend(tx: &Transaction) -> bool {
    tx.inputs.iter().any(|i| i.txid.starts_with("000000"))
}
