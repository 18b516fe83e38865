//! Script template deep inspection.
//!
//! Goes beyond address prefixes into script internals: multisig templates,
//! HTLC timelocks, OP_RETURN payload protocols, dominant witness version,
//! and tapscript complexity. Script structure is the deepest fingerprinting
//! layer; wallets that randomize ordering and fees cannot hide it.

use crate::core::{address_type, AddressType, ScriptAnalysis, Transaction};

/// Inspect all input and output scripts of the transaction.
pub fn analyze_script_templates(tx: &Transaction) -> ScriptAnalysis {
    let mut result = ScriptAnalysis::default();

    for input in &tx.inputs {
        if is_multisig_script(&input.script_sig) {
            result.has_multisig = true;
            let (m, n) = extract_multisig_mn(&input.script_sig);
            if m > 0 && n > 0 {
                result.multisig_m = m;
                result.multisig_n = n;
            }
        }
        if is_htlc_script(&input.script_sig) {
            result.has_htlc = true;
        }
    }

    for out in &tx.outputs {
        if is_op_return(&out.script_pubkey) {
            result.has_op_return = true;
            result.op_return_protocol = classify_op_return(&out.script_pubkey).to_string();
            result.op_return_size = op_return_size(&out.script_pubkey);
        }
        if is_multisig_script(&out.script_pubkey) {
            result.has_multisig = true;
            let (m, n) = extract_multisig_mn(&out.script_pubkey);
            if m > 0 && n > 0 {
                result.multisig_m = m;
                result.multisig_n = n;
            }
        }
    }

    result.dominant_witness = dominant_witness_version(tx).to_string();
    result.tapscript_depth = estimate_tapscript_depth(tx);

    result
}

/// Multisig pattern: leading OP_M (0x51-0x55) with OP_CHECKMULTISIG (0xae)
/// present. Hex form: 52...ae for 2-of-N.
pub fn is_multisig_script(script: &str) -> bool {
    if script.len() < 10 {
        return false;
    }
    let lower = script.to_ascii_lowercase();
    let has_checkmultisig = lower.contains("ae");
    let op_m_prefix = ["51", "52", "53", "54", "55"]
        .iter()
        .any(|p| lower.starts_with(p));
    has_checkmultisig && op_m_prefix
}

/// Parse M-of-N from a multisig script: first byte is OP_M, the byte before
/// the trailing OP_CHECKMULTISIG is OP_N.
pub fn extract_multisig_mn(script: &str) -> (u8, u8) {
    if script.len() < 4 {
        return (0, 0);
    }
    let lower = script.to_ascii_lowercase();

    let m = parse_op_n(&lower[..2]);

    let ae_idx = match lower.rfind("ae") {
        Some(i) if i >= 2 => i,
        _ => return (0, 0),
    };
    let n = parse_op_n(&lower[ae_idx - 2..ae_idx]);

    if m > 0 && n > 0 && m <= n {
        (m, n)
    } else {
        (0, 0)
    }
}

/// OP_N hex byte → integer (0x51 = OP_1 .. 0x60 = OP_16).
fn parse_op_n(hex_byte: &str) -> u8 {
    match u8::from_str_radix(hex_byte, 16) {
        Ok(b) if (0x51..=0x60).contains(&b) => b - 0x50,
        _ => 0,
    }
}

/// Hash Timelock Contract: co-presence of OP_IF (0x63), OP_HASH160 (0xa9)
/// and OP_CLTV (0xb1) or OP_CSV (0xb2).
pub fn is_htlc_script(script: &str) -> bool {
    let lower = script.to_ascii_lowercase();
    lower.contains("63")
        && lower.contains("a9")
        && (lower.contains("b1") || lower.contains("b2"))
}

/// OP_RETURN output: scriptPubKey begins with 0x6a.
pub fn is_op_return(script_pubkey: &str) -> bool {
    script_pubkey.to_ascii_lowercase().starts_with("6a")
}

/// Identify the protocol behind an OP_RETURN payload.
pub fn classify_op_return(script_pubkey: &str) -> &'static str {
    let lower = script_pubkey.to_ascii_lowercase();
    if lower.len() < 6 {
        return "unknown";
    }

    // Skip OP_RETURN (6a) and the push-length byte.
    let data = &lower[4..];

    if data.starts_with("6f6d6e69") {
        "omni"
    } else if data.starts_with("4f41") {
        "openassets"
    } else if data.starts_with("455843") {
        "exchain"
    } else if data.starts_with("53504b") {
        "counterparty"
    } else if data.starts_with("69643a") {
        "blockstack"
    } else if (40..=80).contains(&data.len()) {
        "timestamp"
    } else {
        "unknown"
    }
}

/// OP_RETURN payload size in bytes (hex pairs minus the opcode).
fn op_return_size(script_pubkey: &str) -> usize {
    script_pubkey.len().saturating_sub(2) / 2
}

/// Most common witness version across inputs, from address types.
fn dominant_witness_version(tx: &Transaction) -> &'static str {
    let mut legacy = 0;
    let mut v0 = 0;
    let mut v1 = 0;

    for input in &tx.inputs {
        match address_type(&input.address) {
            AddressType::Taproot => v1 += 1,
            AddressType::Segwit | AddressType::P2shSegwit => v0 += 1,
            _ => legacy += 1,
        }
    }

    if v1 > v0 && v1 > legacy {
        "v1"
    } else if v0 > legacy && v0 >= v1 {
        "v0"
    } else {
        "legacy"
    }
}

/// Tapscript tree depth estimate: a Taproot input with script data beyond a
/// 64-byte key-path signature implies a script-path spend (depth ≥ 1).
fn estimate_tapscript_depth(tx: &Transaction) -> u8 {
    for input in &tx.inputs {
        if address_type(&input.address) == AddressType::Taproot && input.script_sig.len() > 128 {
            return 1;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxIn, TxOut};

    #[test]
    fn two_of_three_multisig() {
        // OP_2 <keys...> OP_3 OP_CHECKMULTISIG
        let script = "5221aa21bb21cc53ae";
        assert!(is_multisig_script(script));
        assert_eq!(extract_multisig_mn(script), (2, 3));
    }

    #[test]
    fn invalid_multisig_m_greater_than_n() {
        // OP_3 ... OP_2 OP_CHECKMULTISIG is malformed.
        let script = "5321aa21bb52ae";
        assert_eq!(extract_multisig_mn(script), (0, 0));
    }

    #[test]
    fn short_script_not_multisig() {
        assert!(!is_multisig_script("52ae"));
    }

    #[test]
    fn htlc_opcode_pattern() {
        assert!(is_htlc_script("63a914deadbeefb175"));
        assert!(is_htlc_script("63a9b2"));
        assert!(!is_htlc_script("a914deadbeef"));
    }

    #[test]
    fn op_return_protocols() {
        assert!(is_op_return("6a246f6d6e69deadbeef"));
        assert_eq!(classify_op_return("6a246f6d6e69deadbeef"), "omni");
        assert_eq!(classify_op_return("6a044f41beef"), "openassets");
        assert_eq!(classify_op_return("6a0453504baa"), "counterparty");
        // 64 hex chars of data → document hash timestamp.
        let ts = format!("6a20{}", "ab".repeat(32));
        assert_eq!(classify_op_return(&ts), "timestamp");
        assert_eq!(classify_op_return("6a"), "unknown");
    }

    #[test]
    fn full_analysis_sets_flags() {
        let tx = Transaction {
            inputs: vec![TxIn {
                address: "bc1q_a".into(),
                script_sig: "5221aa21bb21cc53ae".into(),
                ..Default::default()
            }],
            outputs: vec![TxOut {
                script_pubkey: "6a246f6d6e69deadbeef".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let result = analyze_script_templates(&tx);
        assert!(result.has_multisig);
        assert_eq!((result.multisig_m, result.multisig_n), (2, 3));
        assert!(result.has_op_return);
        assert_eq!(result.op_return_protocol, "omni");
        assert_eq!(result.op_return_size, 9);
        assert_eq!(result.dominant_witness, "v0");
    }

    #[test]
    fn witness_version_dominance() {
        let tx = Transaction {
            inputs: vec![
                TxIn { address: "bc1p_a".into(), ..Default::default() },
                TxIn { address: "bc1p_b".into(), ..Default::default() },
                TxIn { address: "bc1q_c".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        assert_eq!(analyze_script_templates(&tx).dominant_witness, "v1");

        let legacy_tx = Transaction {
            inputs: vec![TxIn { address: "1abc".into(), ..Default::default() }],
            ..Default::default()
        };
        assert_eq!(analyze_script_templates(&legacy_tx).dominant_witness, "legacy");
    }

    #[test]
    fn tapscript_depth_from_witness_size() {
        let keypath = Transaction {
            inputs: vec![TxIn {
                address: "bc1p_a".into(),
                script_sig: "ab".repeat(64),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(analyze_script_templates(&keypath).tapscript_depth, 0);

        let scriptpath = Transaction {
            inputs: vec![TxIn {
                address: "bc1p_a".into(),
                script_sig: "ab".repeat(80),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(analyze_script_templates(&scriptpath).tapscript_depth, 1);
    }
}
