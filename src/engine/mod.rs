//! Pipeline orchestrator.
//!
//! `HeuristicEngine::analyze` runs the ordered heuristic pipeline over one
//! transaction and fills a single result record. Steps execute in declared
//! order; later steps read fields set by earlier ones, and the score is
//! clamped after every mutating step. The calibration step is authoritative
//! for the signals it reads; the earlier ad-hoc adjustments act as hints
//! that it overwrites, and the steps after it nudge the calibrated value.

pub mod score;

use std::sync::Arc;

use crate::core::flags::{HeuristicFlag, CURRENT_SNAPSHOT_ID};
use crate::core::{address_type, AddressType, AnalysisResult, Transaction};
use crate::evidence::factor_graph::evaluate_factor_graph;
use crate::evidence::generate_cioh_edges_versioned;
use crate::risk::taint::TaintMap;
use crate::risk::watchlist::AddressWatchlist;
use crate::signals;
use crate::signals::protocols::ProtocolMonitor;
use crate::solver;

/// The per-transaction analysis engine. Holds the shared taint map and
/// watchlist the application wires at startup; unit tests build fresh
/// instances for isolation.
pub struct HeuristicEngine {
    taint: Arc<TaintMap>,
    watchlist: Arc<AddressWatchlist>,
    protocols: ProtocolMonitor,
    snapshot_id: i64,
}

impl HeuristicEngine {
    pub fn new(taint: Arc<TaintMap>, watchlist: Arc<AddressWatchlist>) -> Self {
        Self {
            taint,
            watchlist,
            protocols: ProtocolMonitor::new(),
            snapshot_id: CURRENT_SNAPSHOT_ID,
        }
    }

    /// Override the snapshot id stamped on emitted edges (shadow runs).
    pub fn with_snapshot_id(mut self, snapshot_id: i64) -> Self {
        self.snapshot_id = snapshot_id;
        self
    }

    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    pub fn taint_map(&self) -> &Arc<TaintMap> {
        &self.taint
    }

    pub fn watchlist(&self) -> &Arc<AddressWatchlist> {
        &self.watchlist
    }

    /// Run the full heuristic pipeline over one transaction. Never fails:
    /// analyzers degrade to defaults on sparse input and the result is
    /// always complete.
    pub fn analyze(&self, tx: &Transaction) -> AnalysisResult {
        let mut res = AnalysisResult {
            txid: tx.txid.clone(),
            privacy_score: 100,
            wallet_family: String::new(),
            ..Default::default()
        };

        // Step 1: anonymity set. The solver applies its own structural
        // fallback above the combinatorial budget.
        res.anon_set = solver::calculate_anon_set(&tx.inputs, &tx.outputs, tx.fee, tx.vsize);

        // Step 2: CoinJoin gating — collaborative construction needs many
        // participants on both sides and a proven anonymity set.
        let is_cj = tx.inputs.len() >= 5 && tx.outputs.len() >= 5 && res.anon_set >= 5;
        if is_cj {
            res.heuristic_flags.set(HeuristicFlag::LikelyCollabConstruct);
            res.privacy_score = (res.privacy_score + 40).min(100);
        }

        // Step 3: address reuse across inputs.
        let mut seen = std::collections::HashSet::new();
        let mut has_reuse = false;
        for input in &tx.inputs {
            if !seen.insert(input.address.as_str()) {
                has_reuse = true;
            }
        }
        if has_reuse {
            res.heuristic_flags.set(HeuristicFlag::AddressReuse);
            res.privacy_score -= 40;
        }
        clamp(&mut res);

        // Step 4: deterministic script-class flags.
        for input in &tx.inputs {
            match address_type(&input.address) {
                AddressType::Segwit | AddressType::P2shSegwit => {
                    res.heuristic_flags.set(HeuristicFlag::SegWit);
                }
                AddressType::Taproot => {
                    res.heuristic_flags.set(HeuristicFlag::Taproot);
                    // Taproot key-path spends are Schnorr-signed.
                    res.heuristic_flags.set(HeuristicFlag::SchnorrSig);
                }
                _ => {}
            }
        }

        // Step 5: protocol fingerprinting.
        let is_whirlpool_shape = (5..=8).contains(&tx.inputs.len())
            && tx.outputs.len() == tx.inputs.len();
        if is_cj && is_whirlpool_shape && res.anon_set == tx.inputs.len() {
            res.heuristic_flags.set(HeuristicFlag::WhirlpoolStruct);
        }

        if is_cj && tx.inputs.len() >= 5 && tx.outputs.len() >= 10 {
            let mut counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
            for out in &tx.outputs {
                *counts.entry(out.value).or_insert(0) += 1;
            }
            let equal_groups = counts.values().filter(|&&c| c >= 2).count();
            if equal_groups >= 3 || (tx.inputs.len() > 50 && tx.outputs.len() > 50) {
                res.heuristic_flags.set(HeuristicFlag::WasabiSuspect);
            }
        }

        if !is_cj
            && tx.inputs.len() == 2
            && tx.outputs.len() >= 2
            && tx.outputs[0].value == tx.inputs[0].value
        {
            res.heuristic_flags.set(HeuristicFlag::PayjoinSuspect);
        }

        // Step 6: emerging-protocol watch list.
        res.heuristic_flags.union(self.protocols.evaluate(tx));

        // Step 7: change output detection.
        if !is_cj && tx.outputs.len() >= 2 && tx.outputs.len() <= 5 {
            if let Some(change) = signals::change::detect_change_output(tx) {
                res.heuristic_flags.set(HeuristicFlag::LikelyChange);
                res.privacy_score -= (change.confidence * 30.0).round() as i32;
                if change.is_round_payment {
                    res.heuristic_flags.set(HeuristicFlag::RoundPayment);
                }
                res.change_output = Some(change);
                clamp(&mut res);
            }
        }

        // Step 8: wallet fingerprinting.
        let wallet_fp = signals::wallet::detect_wallet_fingerprint(tx);
        if wallet_fp.wallet_family != "unknown" {
            res.wallet_family = wallet_fp.wallet_family.clone();
            res.privacy_score -= (wallet_fp.confidence * 15.0).round() as i32;
        }
        if wallet_fp.is_bip69 {
            res.heuristic_flags.set(HeuristicFlag::Bip69);
        }
        if wallet_fp.is_consolidation {
            res.heuristic_flags.set(HeuristicFlag::Consolidation);
            res.privacy_score -= 20;
        }
        clamp(&mut res);

        // Step 9: Whirlpool pool identification.
        if res.heuristic_flags.contains(HeuristicFlag::WhirlpoolStruct) {
            if let Some(pool) = signals::wallet::identify_whirlpool_pool(tx) {
                res.whirlpool_pool = pool.pool_id;
            }
        }

        // Step 10: Boltzmann entropy.
        let entropy = signals::entropy::compute_boltzmann_entropy(tx);
        if entropy.entropy >= 4.0 {
            res.heuristic_flags.set(HeuristicFlag::HighEntropy);
            res.privacy_score += ((entropy.entropy * 4.0).round() as i32).min(25);
        } else if entropy.entropy <= 0.5 && !is_cj {
            res.privacy_score -= 10;
        }
        res.entropy = Some(entropy);
        clamp(&mut res);

        // Step 11: fee-rate intelligence.
        let fee_result = signals::fee::analyze_fee_pattern(tx);
        if signals::fee::is_suspicious_fee_pattern(&fee_result) {
            res.heuristic_flags.set(HeuristicFlag::SuspiciousFeePattern);
            res.privacy_score -= 5;
        }
        if res.wallet_family.is_empty() && fee_result.wallet_hint != "unknown" {
            res.wallet_family = fee_result.wallet_hint.clone();
        }
        res.fee_analysis = Some(fee_result);
        clamp(&mut res);

        // Step 12: peel chain.
        if !is_cj {
            let candidate = signals::peel::detect_peel_chain_step(tx, is_cj);
            if candidate.is_peel_step {
                res.heuristic_flags.set(HeuristicFlag::PeelChain);
                res.peel_chain = signals::peel::build_peel_chain_result(&candidate);
                res.privacy_score -= (candidate.confidence * 20.0).round() as i32;
                clamp(&mut res);
            }
        }

        // Step 13: timing signals.
        let timing = signals::timing::analyze_timing_signals(tx);
        if timing.has_timing_anomaly {
            res.heuristic_flags.set(HeuristicFlag::TimingAnomaly);
        }
        let timing_wallet = signals::timing::infer_wallet_from_timing(&timing);
        if timing_wallet != "unknown" && res.wallet_family.is_empty() {
            res.wallet_family = timing_wallet.to_string();
        }

        // Step 14: dust attack.
        let dust = signals::dust::detect_dust_attack(tx);
        if dust.has_dust_outputs && dust.intent == "surveillance" {
            res.heuristic_flags.set(HeuristicFlag::DustAttackSuspect);
        }
        if dust.has_dust_inputs && dust.intent == "consolidation" {
            res.heuristic_flags.set(HeuristicFlag::DustConsolidation);
        }
        res.dust_analysis = Some(dust);

        // Step 15: topology.
        let topo = signals::topology::analyze_topology(tx);
        if topo.is_hub {
            res.heuristic_flags.set(HeuristicFlag::HubTransaction);
        }
        res.topology = Some(topo);

        // Step 16: CoinJoin unmixability.
        if is_cj {
            let unmix = signals::unmix::analyze_unmixability(tx, is_cj);
            if unmix.mix_quality == "weak" || unmix.mix_quality == "broken" {
                res.heuristic_flags.set(HeuristicFlag::WeakMix);
            }
            res.unmix_result = Some(unmix);
        }

        // Step 17: calibrated privacy score. Reads every field set by the
        // steps above and overwrites the running score.
        let breakdown = score::calibrate_privacy_score(&mut res);
        res.score_breakdown = Some(breakdown);

        // Step 18: input age and UTXO lifespan.
        let utxo_age = signals::utxo_age::analyze_utxo_age(tx);
        if utxo_age.has_ancient_utxo {
            res.heuristic_flags.set(HeuristicFlag::AncientUtxo);
        }
        let ancient_pattern = utxo_age.holding_pattern == "ancient";
        res.utxo_age = Some(utxo_age);

        // Step 19: value fingerprinting.
        let value_pattern = signals::value_pattern::analyze_value_patterns(tx);
        if value_pattern.known_service_fee != "none" {
            res.heuristic_flags.set(HeuristicFlag::KnownServicePattern);
        }
        res.value_pattern = Some(value_pattern);

        // Step 20: script template inspection.
        let script_info = signals::script::analyze_script_templates(tx);
        if script_info.has_multisig {
            res.heuristic_flags.set(HeuristicFlag::Multisig);
        }
        if script_info.has_op_return {
            res.heuristic_flags.set(HeuristicFlag::HasOpReturn);
        }
        let has_multisig = script_info.has_multisig;
        res.script_info = Some(script_info);

        // Step 21: post-calibration nudges. Ancient UTXOs age out of chain
        // analysis coverage; multisig reveals the custody model.
        if ancient_pattern {
            res.privacy_score = (res.privacy_score + 5).min(100);
        }
        if has_multisig {
            res.privacy_score -= 5;
        }
        clamp(&mut res);

        // Step 22: evidence graph and factor-graph inference.
        res.edges = generate_cioh_edges_versioned(tx, is_cj, tx.block_height, self.snapshot_id);
        if !res.edges.is_empty() {
            res.inference = Some(evaluate_factor_graph(&res.edges));
        }

        // Step 23: address clustering happens externally; the emitted edges
        // are the input a persistent cluster engine merges from.

        // Step 24: post-mix leakage, structural proxy. Without cross-tx
        // context, equal-value inputs being consolidated stand in for mixed
        // UTXOs being recombined.
        if !is_cj && tx.inputs.len() >= 2 && count_equal_input_values(tx) >= 2 {
            res.heuristic_flags.set(HeuristicFlag::PostMixLeakage);
            res.privacy_score -= 10;
            clamp(&mut res);
        }

        // Step 25: Lightning channel detection. Off-chain activity is
        // inherently private.
        let ln = signals::lightning::detect_lightning_channel(tx);
        if ln.is_lightning_tx {
            res.heuristic_flags.set(HeuristicFlag::LightningChannel);
            res.privacy_score = (res.privacy_score + 10).min(100);
        }

        // Step 26: coinbase and pool attribution.
        let cb = signals::coinbase::analyze_coinbase_tx(tx);
        if cb.is_coinbase {
            res.heuristic_flags.set(HeuristicFlag::IsCoinbase);
            if cb.pool_name != "unknown" {
                res.wallet_family = format!("mining:{}", cb.pool_name);
            }
        }

        // Step 27: address-format migration.
        let migration = signals::migration::detect_address_migration(tx);
        if migration.has_mixed_types {
            res.privacy_score -= 3;
        }
        if migration.migration_stage == "taproot-adopter" {
            res.privacy_score = (res.privacy_score + 5).min(100);
        }
        clamp(&mut res);

        // Step 28: consolidation intelligence.
        let consolidation = signals::consolidation::analyze_consolidation(tx);
        if consolidation.is_consolidation {
            res.heuristic_flags.set(HeuristicFlag::StrategicConsolidation);
            res.privacy_score -= 8;
            clamp(&mut res);
        }

        // Step 29: taint check against the shared map.
        let (_exposure, is_high_risk) = self.taint.check_inputs(tx);
        if is_high_risk {
            res.heuristic_flags.set(HeuristicFlag::HighRisk);
            res.privacy_score -= 15;
            clamp(&mut res);
        }

        // Step 30: behavioral bot detection.
        if signals::behavior::detect_bot_behavior(tx) {
            res.heuristic_flags.set(HeuristicFlag::BotBehavior);
        }

        clamp(&mut res);
        res
    }

    /// Taint exposure of the transaction's inputs: (weighted exposure,
    /// high-risk verdict).
    pub fn check_inputs_for_taint(&self, tx: &Transaction) -> (f64, bool) {
        self.taint.check_inputs(tx)
    }

    /// Real-time threat assessment composing the analysis with watchlist
    /// hits and taint.
    pub fn score_transaction(
        &self,
        tx: &Transaction,
        analysis: &AnalysisResult,
        hits: &[crate::risk::watchlist::WatchlistHit],
    ) -> crate::risk::ThreatAssessment {
        crate::risk::score_transaction(tx, analysis, hits, &self.taint)
    }
}

fn clamp(res: &mut AnalysisResult) {
    res.privacy_score = res.privacy_score.clamp(0, 100);
}

/// Highest multiplicity among positive input values — the structural proxy
/// for CoinJoin outputs being consolidated.
fn count_equal_input_values(tx: &Transaction) -> usize {
    let (_, count) =
        crate::core::modal_value(tx.inputs.iter().filter(|i| i.value > 0).map(|i| i.value));
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::FlagSet;
    use crate::core::{TxIn, TxOut};

    fn fresh_engine() -> HeuristicEngine {
        HeuristicEngine::new(Arc::new(TaintMap::new()), Arc::new(AddressWatchlist::new()))
    }

    fn simple_payment() -> Transaction {
        Transaction {
            txid: "simple".into(),
            version: 2,
            fee: 1_000,
            vsize: 200,
            inputs: vec![TxIn {
                txid: "aa".repeat(32),
                value: 10_000_000,
                address: "bc1q_in".into(),
                sequence: 0xFFFF_FFFF,
                ..Default::default()
            }],
            outputs: vec![
                TxOut { value: 5_000_000, address: "bc1q_pay".into(), ..Default::default() },
                TxOut { value: 4_999_000, address: "bc1q_chg".into(), ..Default::default() },
            ],
            ..Default::default()
        }
    }

    fn whirlpool_mix() -> Transaction {
        // 5×5 pool-shape mix at the 0.05 BTC denomination.
        Transaction {
            txid: "whirl".into(),
            version: 1,
            fee: 2_500,
            vsize: 900,
            inputs: (0..5)
                .map(|i| TxIn {
                    txid: format!("{i:064}"),
                    value: 5_001_000,
                    address: format!("bc1q_in{i}"),
                    ..Default::default()
                })
                .collect(),
            outputs: (0..5)
                .map(|i| TxOut {
                    value: 5_000_000,
                    address: format!("bc1q_out{i}"),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn score_always_in_bounds() {
        let engine = fresh_engine();
        for tx in [simple_payment(), whirlpool_mix(), Transaction::default()] {
            let res = engine.analyze(&tx);
            assert!((0..=100).contains(&res.privacy_score), "score {}", res.privacy_score);
        }
    }

    #[test]
    fn coinjoin_detection_and_whirlpool_struct() {
        let engine = fresh_engine();
        let res = engine.analyze(&whirlpool_mix());

        assert_eq!(res.anon_set, 5);
        assert!(res.heuristic_flags.contains(HeuristicFlag::LikelyCollabConstruct));
        assert!(res.heuristic_flags.contains(HeuristicFlag::WhirlpoolStruct));
        assert_eq!(res.whirlpool_pool, "0.05btc");
        // CoinJoin edges are negative gating pairs for every input.
        assert_eq!(res.edges.len(), 10);
        assert!(res.edges.iter().all(|e| e.llr_score < 0.0));
    }

    #[test]
    fn address_reuse_flagged() {
        let engine = fresh_engine();
        let mut tx = simple_payment();
        tx.inputs.push(TxIn {
            txid: "bb".repeat(32),
            value: 1_000_000,
            address: "bc1q_in".into(),
            ..Default::default()
        });
        let res = engine.analyze(&tx);
        assert!(res.heuristic_flags.contains(HeuristicFlag::AddressReuse));
    }

    #[test]
    fn segwit_and_taproot_flags() {
        let engine = fresh_engine();
        let mut tx = simple_payment();
        tx.inputs[0].address = "bc1p_tap".into();
        let res = engine.analyze(&tx);
        assert!(res.heuristic_flags.contains(HeuristicFlag::Taproot));
        assert!(res.heuristic_flags.contains(HeuristicFlag::SchnorrSig));

        let res = engine.analyze(&simple_payment());
        assert!(res.heuristic_flags.contains(HeuristicFlag::SegWit));
    }

    #[test]
    fn payjoin_shape_flagged() {
        let engine = fresh_engine();
        let tx = Transaction {
            txid: "pj".into(),
            inputs: vec![
                TxIn { value: 500_000, address: "bc1q_a".into(), ..Default::default() },
                TxIn { value: 300_000, address: "bc1q_b".into(), ..Default::default() },
            ],
            outputs: vec![
                TxOut { value: 500_000, address: "bc1q_c".into(), ..Default::default() },
                TxOut { value: 299_000, address: "bc1q_d".into(), ..Default::default() },
            ],
            fee: 1_000,
            vsize: 250,
            ..Default::default()
        };
        let res = engine.analyze(&tx);
        assert!(res.heuristic_flags.contains(HeuristicFlag::PayjoinSuspect));
    }

    #[test]
    fn edges_carry_engine_snapshot() {
        let engine = fresh_engine().with_snapshot_id(42);
        let mut tx = simple_payment();
        tx.inputs.push(TxIn {
            txid: "bb".repeat(32),
            value: 500_000,
            address: "bc1q_other".into(),
            ..Default::default()
        });
        let res = engine.analyze(&tx);
        assert!(!res.edges.is_empty());
        assert!(res.edges.iter().all(|e| e.snapshot_id == 42));
    }

    #[test]
    fn analyze_is_deterministic_modulo_edge_ids() {
        let engine = fresh_engine();
        let tx = whirlpool_mix();
        let mut a = engine.analyze(&tx);
        let mut b = engine.analyze(&tx);

        for e in a.edges.iter_mut().chain(b.edges.iter_mut()) {
            e.edge_id = "edge".into();
            e.audit_hash = "hash".into();
        }
        assert_eq!(a, b);
    }

    #[test]
    fn empty_transaction_degrades_cleanly() {
        let engine = fresh_engine();
        let res = engine.analyze(&Transaction::default());
        assert_eq!(res.anon_set, 0);
        assert!(res.edges.is_empty());
        assert!((0..=100).contains(&res.privacy_score));
    }

    #[test]
    fn post_mix_proxy_on_equal_inputs() {
        let engine = fresh_engine();
        let tx = Transaction {
            txid: "postmix".into(),
            fee: 1_000,
            vsize: 300,
            inputs: vec![
                TxIn { txid: "aa".repeat(32), value: 5_000_000, address: "bc1q_m1".into(), ..Default::default() },
                TxIn { txid: "bb".repeat(32), value: 5_000_000, address: "bc1q_m2".into(), ..Default::default() },
            ],
            outputs: vec![TxOut { value: 9_998_000, address: "bc1q_dst".into(), ..Default::default() }],
            ..Default::default()
        };
        let res = engine.analyze(&tx);
        assert!(res.heuristic_flags.contains(HeuristicFlag::PostMixLeakage));
    }

    #[test]
    fn coinbase_attribution() {
        let engine = fresh_engine();
        let tx = Transaction {
            txid: "cb".into(),
            inputs: vec![TxIn {
                txid: "0".repeat(64),
                vout: 0xFFFF_FFFF,
                script_sig: "2f4632506f6f6c2f".into(), // /F2Pool/
                ..Default::default()
            }],
            outputs: vec![TxOut { value: 625_000_000, address: "bc1q_pool".into(), ..Default::default() }],
            ..Default::default()
        };
        let res = engine.analyze(&tx);
        assert!(res.heuristic_flags.contains(HeuristicFlag::IsCoinbase));
        assert_eq!(res.wallet_family, "mining:F2Pool");
    }

    #[test]
    fn tainted_inputs_set_high_risk() {
        let taint = Arc::new(TaintMap::new());
        taint.seed_from_investigation(&["bc1q_stolen".to_string()]);
        let engine = HeuristicEngine::new(taint, Arc::new(AddressWatchlist::new()));

        let tx = Transaction {
            txid: "tainted".into(),
            fee: 500,
            vsize: 150,
            inputs: vec![TxIn {
                txid: "cc".repeat(32),
                value: 50_000,
                address: "bc1q_stolen".into(),
                ..Default::default()
            }],
            outputs: vec![TxOut { value: 49_500, address: "bc1q_dst".into(), ..Default::default() }],
            ..Default::default()
        };

        let clean_engine = fresh_engine();
        let clean = clean_engine.analyze(&tx);
        let res = engine.analyze(&tx);

        assert!(res.heuristic_flags.contains(HeuristicFlag::HighRisk));
        assert!(res.privacy_score <= clean.privacy_score - 15 || clean.privacy_score < 15);
    }

    #[test]
    fn bot_behavior_flagged() {
        let engine = fresh_engine();
        let tx = Transaction {
            txid: "bot".into(),
            inputs: vec![TxIn { value: 100_000_000, address: "bc1q_src".into(), ..Default::default() }],
            outputs: (0..25)
                .map(|i| TxOut {
                    value: 1_000_000,
                    address: format!("bc1q_{i}"),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let res = engine.analyze(&tx);
        assert!(res.heuristic_flags.contains(HeuristicFlag::BotBehavior));
    }

    #[test]
    fn flags_default_empty() {
        assert_eq!(FlagSet::empty().bits(), 0);
    }
}
