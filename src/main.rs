pub mod alerts;
pub mod anonset;
pub mod config;
pub mod core;
pub mod db;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod metrics;
pub mod risk;
pub mod rpc;
pub mod shadow;
pub mod signals;
pub mod solver;
pub mod trace;

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::alerts::AlertManager;
use crate::config::Config;
use crate::core::flags::CURRENT_SNAPSHOT_ID;
use crate::db::{SqliteStore, Store};
use crate::engine::HeuristicEngine;
use crate::risk::taint::TaintMap;
use crate::risk::watchlist::{alert_level_for_role, taint_level_for_role, AddressWatchlist};
use crate::rpc::BitcoinRpc;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("txlens=info".parse().unwrap()),
        )
        .init();

    tracing::info!("txlens starting, engine snapshot {CURRENT_SNAPSHOT_ID}");

    let config = Config::load("config.toml");

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create database directory");
    }
    let store = SqliteStore::open(db_path, CURRENT_SNAPSHOT_ID)
        .expect("failed to open analytics database");
    tracing::info!("analytics database opened at {}", config.database.path);

    // Warm-load active investigations into the shared taint map and
    // watchlist before any analysis runs.
    let taint = Arc::new(TaintMap::new());
    let watchlist = Arc::new(AddressWatchlist::new());
    match store.load_active_investigation_seeds() {
        Ok(seeds) => {
            for seed in &seeds {
                watchlist.add(
                    &seed.address,
                    &seed.role,
                    &seed.label,
                    &seed.case_id,
                    alert_level_for_role(&seed.role),
                );
                taint.seed_from_external_intel(&[risk::taint::TaintSource {
                    address: seed.address.clone(),
                    category: seed.role.clone(),
                    taint_level: taint_level_for_role(&seed.role),
                    label: seed.label.clone(),
                }]);
            }
            tracing::info!(
                seeds = seeds.len(),
                watched = watchlist.len(),
                tainted = taint.len(),
                "investigation seeds loaded"
            );
        }
        Err(e) => tracing::warn!("failed to load investigation seeds: {e}"),
    }

    let engine = HeuristicEngine::new(Arc::clone(&taint), Arc::clone(&watchlist));

    let alert_manager = AlertManager::new(Some(Box::new(|alert| {
        tracing::info!(severity = %alert.severity, title = %alert.title, "ALERT");
    })));
    for webhook in &config.alerts.webhooks {
        alert_manager.register_webhook(
            &webhook.name,
            &webhook.url,
            &webhook.min_severity,
            Default::default(),
        );
    }

    // Analyze any txids passed on the command line, print the results as
    // JSON, and feed assessments through the alert fan-out.
    let txids: Vec<String> = std::env::args().skip(1).collect();
    if txids.is_empty() {
        tracing::info!("no txids given; engine ready (usage: txlens <txid> [txid ...])");
        return;
    }

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    rt.block_on(async {
        let rpc = match (&config.bitcoin.rpc_user, &config.bitcoin.rpc_password) {
            (Some(user), Some(pass)) => {
                BitcoinRpc::new(&config.bitcoin.rpc_host, config.bitcoin.rpc_port, user, pass)
            }
            _ => BitcoinRpc::without_auth(&config.bitcoin.rpc_host, config.bitcoin.rpc_port),
        };

        let height = rpc.get_block_height().await.unwrap_or(0);

        for txid in txids {
            let tx = match rpc.get_transaction(&txid).await {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::error!(%txid, "fetch failed: {e}");
                    continue;
                }
            };

            let analysis = engine.analyze(&tx);
            let hits = watchlist.check_transaction(&tx);
            let assessment = engine.score_transaction(&tx, &analysis, &hits);

            if let Err(e) = store.save_analysis(height, &analysis) {
                tracing::warn!(%txid, "persist failed: {e}");
            }
            let (taint_level, _) = engine.check_inputs_for_taint(&tx);
            if let Err(e) = store.save_risk_assessment(
                height,
                &assessment,
                analysis.privacy_score,
                analysis.heuristic_flags.bits(),
                taint_level,
                tx.inputs.len(),
                tx.outputs.len(),
                tx.total_input_value().max(tx.total_output_value()),
            ) {
                tracing::warn!(%txid, "risk persist failed: {e}");
            }

            alert_manager.emit_from_assessment(assessment.clone(), hits);

            match serde_json::to_string_pretty(&analysis) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(%txid, "serialize failed: {e}"),
            }
            tracing::info!(
                %txid,
                privacy_score = analysis.privacy_score,
                anon_set = analysis.anon_set,
                risk_score = assessment.risk_score,
                severity = %assessment.severity,
                "analysis complete"
            );
        }
    });
}
