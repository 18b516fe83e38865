//! Shadow-mode execution.
//!
//! No new heuristic touches production clusters directly: experimental
//! classifiers run in shadow for an observation window. The runner executes
//! production and shadow functions on every transaction, records the flag
//! and anonset deltas to the store (never to evidence_edge), and logs
//! divergences for monitoring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{AnalysisResult, Transaction};
use crate::db::{DriftReport, Store};
use crate::error::Result;

/// The diff between production and shadow heuristics for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowResult {
    pub txid: String,
    pub shadow_flags: u64,
    pub production_flags: u64,
    pub delta_anonset: i32,
    pub snapshot_id: i64,
    pub created_at: DateTime<Utc>,
}

/// An analysis function the runner can execute.
pub type AnalyzeFn = Arc<dyn Fn(&Transaction) -> AnalysisResult + Send + Sync>;

/// Runs experimental heuristics in parallel with production and persists
/// the comparison.
pub struct ShadowRunner {
    store: Option<Arc<dyn Store>>,
    shadow_snapshot_id: i64,
    production_fn: AnalyzeFn,
    shadow_fn: AnalyzeFn,
    cancelled: Arc<AtomicBool>,
}

impl ShadowRunner {
    /// Build a runner over the given production and shadow functions. Pass
    /// the same function twice to baseline a zero-divergence window.
    pub fn new(
        store: Option<Arc<dyn Store>>,
        shadow_snapshot_id: i64,
        production_fn: AnalyzeFn,
        shadow_fn: AnalyzeFn,
    ) -> Self {
        Self {
            store,
            shadow_snapshot_id,
            production_fn,
            shadow_fn,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancellation handle; a cancelled runner aborts cleanly between
    /// transactions and never partially persists.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Execute both heuristic stacks on a transaction and persist the
    /// comparison. Returns None when cancelled before the run started.
    pub fn run_shadow_analysis(&self, tx: &Transaction) -> Result<Option<ShadowResult>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let prod = (self.production_fn)(tx);
        let shadow = (self.shadow_fn)(tx);

        let result = ShadowResult {
            txid: tx.txid.clone(),
            shadow_flags: shadow.heuristic_flags.bits(),
            production_flags: prod.heuristic_flags.bits(),
            delta_anonset: shadow.anon_set as i32 - prod.anon_set as i32,
            snapshot_id: self.shadow_snapshot_id,
            created_at: Utc::now(),
        };

        if result.shadow_flags != result.production_flags {
            warn!(
                txid = %tx.txid,
                production_flags = result.production_flags,
                shadow_flags = result.shadow_flags,
                delta_anonset = result.delta_anonset,
                "shadow divergence"
            );
        }

        if let Some(store) = &self.store {
            store.save_shadow_result(&result)?;
        }

        Ok(Some(result))
    }

    /// Run a batch, aborting between transactions once cancelled.
    pub fn run_batch(&self, txs: &[Transaction]) -> Result<Vec<ShadowResult>> {
        let mut results = Vec::with_capacity(txs.len());
        for tx in txs {
            match self.run_shadow_analysis(tx)? {
                Some(result) => results.push(result),
                None => break,
            }
        }
        Ok(results)
    }

    /// Divergence totals over all persisted results for this snapshot.
    pub fn generate_drift_report(&self) -> Result<DriftReport> {
        match &self.store {
            Some(store) => store.shadow_drift(self.shadow_snapshot_id),
            None => Ok(DriftReport::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::{HeuristicFlag, CURRENT_SNAPSHOT_ID};
    use crate::db::SqliteStore;

    fn production() -> AnalyzeFn {
        Arc::new(|tx: &Transaction| AnalysisResult {
            txid: tx.txid.clone(),
            anon_set: 3,
            ..Default::default()
        })
    }

    fn experimental() -> AnalyzeFn {
        Arc::new(|tx: &Transaction| {
            let mut res = AnalysisResult {
                txid: tx.txid.clone(),
                anon_set: 5,
                ..Default::default()
            };
            res.heuristic_flags.set(HeuristicFlag::HighEntropy);
            res
        })
    }

    fn tx(txid: &str) -> Transaction {
        Transaction {
            txid: txid.into(),
            ..Default::default()
        }
    }

    #[test]
    fn identical_functions_never_diverge() {
        let runner = ShadowRunner::new(None, CURRENT_SNAPSHOT_ID, production(), production());
        let result = runner
            .run_shadow_analysis(&tx("t1"))
            .expect("run")
            .expect("not cancelled");
        assert_eq!(result.shadow_flags, result.production_flags);
        assert_eq!(result.delta_anonset, 0);
    }

    #[test]
    fn divergence_recorded() {
        let store = Arc::new(SqliteStore::open_in_memory(CURRENT_SNAPSHOT_ID).unwrap());
        let runner = ShadowRunner::new(
            Some(store.clone() as Arc<dyn Store>),
            CURRENT_SNAPSHOT_ID,
            production(),
            experimental(),
        );

        let result = runner.run_shadow_analysis(&tx("t1")).unwrap().unwrap();
        assert_ne!(result.shadow_flags, result.production_flags);
        assert_eq!(result.delta_anonset, 2);

        let report = runner.generate_drift_report().expect("report");
        assert_eq!(report.total_runs, 1);
        assert_eq!(report.divergences, 1);
        assert!((report.avg_delta_anonset - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cancellation_stops_batch() {
        let runner = ShadowRunner::new(None, CURRENT_SNAPSHOT_ID, production(), production());
        runner.cancel_token().store(true, Ordering::SeqCst);

        let txs = vec![tx("a"), tx("b")];
        let results = runner.run_batch(&txs).expect("batch");
        assert!(results.is_empty());
    }

    #[test]
    fn batch_runs_all_when_live() {
        let runner = ShadowRunner::new(None, CURRENT_SNAPSHOT_ID, production(), experimental());
        let txs = vec![tx("a"), tx("b"), tx("c")];
        let results = runner.run_batch(&txs).expect("batch");
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.snapshot_id == CURRENT_SNAPSHOT_ID));
    }
}
