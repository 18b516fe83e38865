//! Bitcoin Core JSON-RPC boundary client.
//!
//! The only module that talks to the network. Verbose transactions are
//! decoded into the engine's own records — prevout values and addresses are
//! resolved with follow-up lookups, and raw hex falls back to the `bitcoin`
//! crate decoder. Failures surface as typed errors; the core never sees
//! this module.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::{Transaction, TxIn, TxOut};
use crate::error::{EngineError, Result};

/// A block header plus its transaction ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub hash: String,
    pub height: i32,
    pub time: i64,
    pub tx_ids: Vec<String>,
}

/// JSON-RPC client against a Bitcoin Core node.
pub struct BitcoinRpc {
    url: String,
    client: Client,
    auth: Option<String>,
}

impl BitcoinRpc {
    pub fn new(host: &str, port: u16, user: &str, pass: &str) -> Self {
        Self {
            url: format!("http://{host}:{port}"),
            client: Client::new(),
            auth: Some(BASE64.encode(format!("{user}:{pass}"))),
        }
    }

    /// Cookie-less client for nodes with rpcauth disabled.
    pub fn without_auth(host: &str, port: u16) -> Self {
        Self {
            url: format!("http://{host}:{port}"),
            client: Client::new(),
            auth: None,
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(auth) = &self.auth {
            request = request.header("Authorization", format!("Basic {auth}"));
        }

        let resp = request.send().await?;
        let payload: Value = resp.json().await?;

        if let Some(err) = payload.get("error").filter(|e| !e.is_null()) {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error");
            // -5: invalid or unknown txid/block.
            if code == -5 {
                return Err(EngineError::NotFound(format!("{method}: {message}")));
            }
            return Err(EngineError::Network(format!("{method}: {message}")));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Current best block height.
    pub async fn get_block_height(&self) -> Result<i32> {
        let result = self.call("getblockcount", vec![]).await?;
        result
            .as_i64()
            .map(|h| h as i32)
            .ok_or_else(|| EngineError::Decode("getblockcount: non-numeric result".into()))
    }

    /// Block hash and transaction ids at a height.
    pub async fn get_block(&self, height: i32) -> Result<Block> {
        let hash = self
            .call("getblockhash", vec![json!(height)])
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EngineError::Decode("getblockhash: non-string result".into()))?;

        let block = self.call("getblock", vec![json!(hash), json!(1)]).await?;
        let tx_ids = block
            .get("tx")
            .and_then(Value::as_array)
            .ok_or_else(|| EngineError::Decode(format!("getblock {hash}: missing tx array")))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        Ok(Block {
            hash,
            height,
            time: block.get("time").and_then(Value::as_i64).unwrap_or(0),
            tx_ids,
        })
    }

    /// Fetch a transaction and resolve its prevouts into a full record.
    pub async fn get_transaction(&self, txid: &str) -> Result<Transaction> {
        if txid.len() != 64 || !txid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(EngineError::InvalidArgument(format!("malformed txid {txid}")));
        }

        let verbose = self
            .call("getrawtransaction", vec![json!(txid), json!(true)])
            .await?;

        let mut tx = decode_verbose_tx(&verbose)?;

        // Resolve prevout values/addresses. Coinbase inputs have none.
        for input in &mut tx.inputs {
            if input.txid.is_empty() || input.txid.chars().all(|c| c == '0') {
                continue;
            }
            if let Ok(prev) = self
                .call("getrawtransaction", vec![json!(input.txid), json!(true)])
                .await
            {
                if let Some(out) = prev
                    .get("vout")
                    .and_then(Value::as_array)
                    .and_then(|outs| outs.get(input.vout as usize))
                {
                    input.value = btc_value_to_sats(out.get("value"));
                    input.address = script_address(out.get("scriptPubKey"));
                }
            }
        }

        // Fee from resolved sums, floored at zero: unresolved prevouts must
        // not produce a negative fee.
        let total_in = tx.total_input_value();
        let total_out = tx.total_output_value();
        if total_in > 0 {
            tx.fee = (total_in - total_out).max(0);
        }

        Ok(tx)
    }
}

/// Decode a verbose getrawtransaction result into the engine's record.
pub fn decode_verbose_tx(v: &Value) -> Result<Transaction> {
    let txid = v
        .get("txid")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Decode("transaction missing txid".into()))?;

    let mut tx = Transaction {
        txid: txid.to_string(),
        version: v.get("version").and_then(Value::as_i64).unwrap_or(1) as i32,
        locktime: v.get("locktime").and_then(Value::as_u64).unwrap_or(0) as u32,
        vsize: v.get("vsize").and_then(Value::as_i64).unwrap_or(0),
        weight: v.get("weight").and_then(Value::as_i64).unwrap_or(0),
        block_height: v.get("blockheight").and_then(Value::as_i64).unwrap_or(0) as i32,
        block_time: v.get("blocktime").and_then(Value::as_i64).unwrap_or(0),
        ..Default::default()
    };

    for vin in v.get("vin").and_then(Value::as_array).into_iter().flatten() {
        tx.inputs.push(TxIn {
            txid: vin.get("txid").and_then(Value::as_str).unwrap_or("").to_string(),
            vout: vin.get("vout").and_then(Value::as_u64).unwrap_or(0) as u32,
            value: 0,
            address: String::new(),
            script_sig: vin
                .get("scriptSig")
                .and_then(|s| s.get("hex"))
                .and_then(Value::as_str)
                .unwrap_or_else(|| vin.get("coinbase").and_then(Value::as_str).unwrap_or(""))
                .to_string(),
            sequence: vin.get("sequence").and_then(Value::as_u64).unwrap_or(0) as u32,
        });
    }

    for vout in v.get("vout").and_then(Value::as_array).into_iter().flatten() {
        tx.outputs.push(TxOut {
            value: btc_value_to_sats(vout.get("value")),
            address: script_address(vout.get("scriptPubKey")),
            script_pubkey: vout
                .get("scriptPubKey")
                .and_then(|s| s.get("hex"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        });
    }

    if tx.inputs.is_empty() && tx.outputs.is_empty() {
        return Err(EngineError::Decode(format!("transaction {txid} has no inputs or outputs")));
    }

    Ok(tx)
}

/// Decode a raw transaction via the `bitcoin` crate, for paths where only
/// hex is available (ZMQ feeds, raw relay). Addresses resolve from the
/// output scripts; prevout data stays unresolved.
pub fn decode_raw_tx(raw: &[u8]) -> Result<Transaction> {
    let parsed: bitcoin::Transaction = bitcoin::consensus::deserialize(raw)
        .map_err(|e| EngineError::Decode(format!("raw tx: {e}")))?;

    let mut tx = Transaction {
        txid: parsed.compute_txid().to_string(),
        version: parsed.version.0,
        locktime: parsed.lock_time.to_consensus_u32(),
        weight: parsed.weight().to_wu() as i64,
        vsize: parsed.vsize() as i64,
        ..Default::default()
    };

    for vin in &parsed.input {
        tx.inputs.push(TxIn {
            txid: vin.previous_output.txid.to_string(),
            vout: vin.previous_output.vout,
            value: 0,
            address: String::new(),
            script_sig: hex::encode(vin.script_sig.as_bytes()),
            sequence: vin.sequence.0,
        });
    }

    for vout in &parsed.output {
        let address = bitcoin::Address::from_script(&vout.script_pubkey, bitcoin::Network::Bitcoin)
            .map(|a| a.to_string())
            .unwrap_or_default();
        tx.outputs.push(TxOut {
            value: vout.value.to_sat() as i64,
            address,
            script_pubkey: hex::encode(vout.script_pubkey.as_bytes()),
        });
    }

    Ok(tx)
}

/// Convert a JSON BTC amount to satoshis, rounding to kill float noise.
fn btc_value_to_sats(v: Option<&Value>) -> i64 {
    v.and_then(Value::as_f64)
        .map(|btc| (btc * 100_000_000.0).round() as i64)
        .unwrap_or(0)
}

/// Pull the address out of a scriptPubKey object (Core ≥ 22 uses
/// `address`, older nodes `addresses[0]`).
fn script_address(script: Option<&Value>) -> String {
    let Some(script) = script else {
        return String::new();
    };
    if let Some(addr) = script.get("address").and_then(Value::as_str) {
        return addr.to_string();
    }
    script
        .get("addresses")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}
