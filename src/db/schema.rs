use rusqlite::Connection;

/// Create the persisted analytics tables. Idempotent.
pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS evidence_edge (
            edge_id          TEXT PRIMARY KEY,
            created_height   INTEGER NOT NULL,
            src_node_id      TEXT NOT NULL,
            dst_node_id      TEXT NOT NULL,
            edge_type        INTEGER NOT NULL,
            llr_score        REAL NOT NULL,
            dependency_group INTEGER NOT NULL,
            snapshot_id      INTEGER NOT NULL,
            audit_hash       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tx_heuristics (
            block_height    INTEGER NOT NULL,
            txid            TEXT NOT NULL,
            heuristic_flags INTEGER NOT NULL,
            anonset_local   INTEGER NOT NULL,
            PRIMARY KEY (block_height, txid)
        );

        CREATE TABLE IF NOT EXISTS anonset_windows (
            txid          TEXT NOT NULL,
            output_index  INTEGER NOT NULL,
            anonset_local INTEGER,
            anonset_1d    INTEGER,
            anonset_7d    INTEGER,
            anonset_30d   INTEGER,
            anonset_365d  INTEGER,
            last_updated  TEXT NOT NULL,
            PRIMARY KEY (txid, output_index)
        );

        CREATE TABLE IF NOT EXISTS shadow_results (
            shadow_id        INTEGER PRIMARY KEY AUTOINCREMENT,
            txid             TEXT NOT NULL,
            shadow_flags     INTEGER NOT NULL,
            production_flags INTEGER NOT NULL,
            delta_anonset    INTEGER NOT NULL,
            snapshot_id      INTEGER NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS risk_assessments (
            txid             TEXT PRIMARY KEY,
            block_height     INTEGER NOT NULL,
            risk_score       INTEGER NOT NULL,
            risk_level       TEXT NOT NULL,
            privacy_score    INTEGER NOT NULL,
            heuristic_flags  INTEGER NOT NULL,
            taint_level      REAL NOT NULL,
            num_inputs       INTEGER NOT NULL,
            num_outputs      INTEGER NOT NULL,
            total_value_sats INTEGER NOT NULL,
            analyzed_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS investigation_seeds (
            case_id  TEXT NOT NULL,
            name     TEXT NOT NULL,
            address  TEXT NOT NULL,
            role     TEXT NOT NULL,
            label    TEXT NOT NULL,
            active   INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (case_id, address)
        );

        CREATE INDEX IF NOT EXISTS idx_edge_src ON evidence_edge(src_node_id);
        CREATE INDEX IF NOT EXISTS idx_edge_snapshot ON evidence_edge(snapshot_id);
        CREATE INDEX IF NOT EXISTS idx_shadow_snapshot ON shadow_results(snapshot_id);
        CREATE INDEX IF NOT EXISTS idx_risk_height ON risk_assessments(block_height);
        ",
    )?;
    Ok(())
}
