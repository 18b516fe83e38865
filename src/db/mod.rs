//! Persistence boundary.
//!
//! The `Store` trait carries the operations the engine persists through;
//! `SqliteStore` implements them over the schema in [`schema`], and tests
//! use the in-memory variant. Writes whose snapshot id differs from the
//! store's expected version are rejected with a conflict.

pub mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::core::AnalysisResult;
use crate::error::{EngineError, Result};
use crate::risk::ThreatAssessment;
use crate::shadow::ShadowResult;

/// A seed row warm-loading an active investigation into the watchlist and
/// taint map at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSeed {
    pub case_id: String,
    pub name: String,
    pub address: String,
    pub role: String,
    pub label: String,
}

/// Aggregated shadow drift over one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub total_runs: usize,
    pub divergences: usize,
    pub avg_delta_anonset: f64,
}

/// Persistence operations the core exposes to its collaborators.
pub trait Store: Send + Sync {
    /// Persist a complete analysis: heuristic flags, anonset and edges.
    fn save_analysis(&self, block_height: i32, result: &AnalysisResult) -> Result<()>;

    /// Persist one decayed anonymity-set window value.
    /// `window_name` ∈ {anonset_1d, anonset_7d, anonset_30d, anonset_365d}.
    fn save_anonset_window(
        &self,
        txid: &str,
        output_index: usize,
        window_name: &str,
        value: usize,
    ) -> Result<()>;

    /// Persist a risk assessment row.
    fn save_risk_assessment(
        &self,
        block_height: i32,
        assessment: &ThreatAssessment,
        privacy_score: i32,
        heuristic_flags: u64,
        taint_level: f64,
        num_inputs: usize,
        num_outputs: usize,
        total_value_sats: i64,
    ) -> Result<()>;

    /// Persist a shadow comparison. Never touches evidence_edge.
    fn save_shadow_result(&self, result: &ShadowResult) -> Result<()>;

    /// Aggregate shadow drift for a snapshot.
    fn shadow_drift(&self, snapshot_id: i64) -> Result<DriftReport>;

    /// Seeds of all active investigations.
    fn load_active_investigation_seeds(&self) -> Result<Vec<InvestigationSeed>>;
}

const WINDOW_NAMES: &[&str] = &["anonset_1d", "anonset_7d", "anonset_30d", "anonset_365d"];

/// SQLite-backed store. The connection sits behind a mutex so the handle
/// can be cloned across tasks.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    expected_snapshot: i64,
}

impl SqliteStore {
    pub fn open(path: &Path, expected_snapshot: i64) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            expected_snapshot,
        })
    }

    pub fn open_in_memory(expected_snapshot: i64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            expected_snapshot,
        })
    }

    /// Register an investigation seed row (used by the case manager and by
    /// tests; production rows arrive via migrations or the API surface).
    pub fn insert_investigation_seed(&self, seed: &InvestigationSeed) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO investigation_seeds (case_id, name, address, role, label, active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            rusqlite::params![seed.case_id, seed.name, seed.address, seed.role, seed.label],
        )?;
        Ok(())
    }

    fn check_snapshot(&self, snapshot_id: i64, context: &str) -> Result<()> {
        if snapshot_id != self.expected_snapshot {
            return Err(EngineError::Conflict(format!(
                "{context}: snapshot {snapshot_id} does not match expected {}",
                self.expected_snapshot
            )));
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn save_analysis(&self, block_height: i32, result: &AnalysisResult) -> Result<()> {
        for edge in &result.edges {
            self.check_snapshot(edge.snapshot_id, "evidence edge")?;
        }

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO tx_heuristics (block_height, txid, heuristic_flags, anonset_local)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                block_height,
                result.txid,
                result.heuristic_flags.bits() as i64,
                result.anon_set as i64
            ],
        )?;

        for edge in &result.edges {
            conn.execute(
                "INSERT OR REPLACE INTO evidence_edge
                 (edge_id, created_height, src_node_id, dst_node_id, edge_type,
                  llr_score, dependency_group, snapshot_id, audit_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    edge.edge_id,
                    edge.created_height,
                    edge.src_node_id,
                    edge.dst_node_id,
                    edge.edge_type,
                    edge.llr_score,
                    edge.dependency_group,
                    edge.snapshot_id,
                    edge.audit_hash
                ],
            )?;
        }

        Ok(())
    }

    fn save_anonset_window(
        &self,
        txid: &str,
        output_index: usize,
        window_name: &str,
        value: usize,
    ) -> Result<()> {
        if !WINDOW_NAMES.contains(&window_name) {
            return Err(EngineError::InvalidArgument(format!(
                "unknown anonset window {window_name}"
            )));
        }

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO anonset_windows (txid, output_index, last_updated)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT (txid, output_index) DO UPDATE SET last_updated = datetime('now')",
            rusqlite::params![txid, output_index as i64],
        )?;
        // Column name is gate-checked against WINDOW_NAMES above.
        let sql = format!(
            "UPDATE anonset_windows SET {window_name} = ?1 WHERE txid = ?2 AND output_index = ?3"
        );
        conn.execute(&sql, rusqlite::params![value as i64, txid, output_index as i64])?;
        Ok(())
    }

    fn save_risk_assessment(
        &self,
        block_height: i32,
        assessment: &ThreatAssessment,
        privacy_score: i32,
        heuristic_flags: u64,
        taint_level: f64,
        num_inputs: usize,
        num_outputs: usize,
        total_value_sats: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO risk_assessments
             (txid, block_height, risk_score, risk_level, privacy_score, heuristic_flags,
              taint_level, num_inputs, num_outputs, total_value_sats, analyzed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))",
            rusqlite::params![
                assessment.txid,
                block_height,
                assessment.risk_score,
                assessment.severity,
                privacy_score,
                heuristic_flags as i64,
                taint_level,
                num_inputs as i64,
                num_outputs as i64,
                total_value_sats
            ],
        )?;
        Ok(())
    }

    fn save_shadow_result(&self, result: &ShadowResult) -> Result<()> {
        self.check_snapshot(result.snapshot_id, "shadow result")?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO shadow_results
             (txid, shadow_flags, production_flags, delta_anonset, snapshot_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                result.txid,
                result.shadow_flags as i64,
                result.production_flags as i64,
                result.delta_anonset,
                result.snapshot_id,
                result.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn shadow_drift(&self, snapshot_id: i64) -> Result<DriftReport> {
        let conn = self.conn.lock().unwrap();
        let report = conn.query_row(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE shadow_flags != production_flags),
                    COALESCE(AVG(delta_anonset), 0)
             FROM shadow_results WHERE snapshot_id = ?1",
            rusqlite::params![snapshot_id],
            |row| {
                Ok(DriftReport {
                    total_runs: row.get::<_, i64>(0)? as usize,
                    divergences: row.get::<_, i64>(1)? as usize,
                    avg_delta_anonset: row.get(2)?,
                })
            },
        )?;
        Ok(report)
    }

    fn load_active_investigation_seeds(&self) -> Result<Vec<InvestigationSeed>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT case_id, name, address, role, label
             FROM investigation_seeds WHERE active = 1 ORDER BY case_id, address",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InvestigationSeed {
                case_id: row.get(0)?,
                name: row.get(1)?,
                address: row.get(2)?,
                role: row.get(3)?,
                label: row.get(4)?,
            })
        })?;

        let mut seeds = Vec::new();
        for seed in rows {
            seeds.push(seed?);
        }
        Ok(seeds)
    }
}
