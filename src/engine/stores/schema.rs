// ── Engram: Store Schema ───────────────────────────────────────────────────
//
// Tables for the bundled SQLite collaborators.
//
// Tables:
//   - fact_items: standalone facts (episodic, semantic, skill) and
//     reconciliation copies of ambiguous relations
//   - graph_relations: subject-predicate-object triples
//   - graph_entities: named nodes referenced by relations
//
// Both item tables share one column layout so the record helpers in
// records.rs work against either. UNIQUE(fingerprint, memory_type) is the
// authoritative dedup tier.
//
// Called once by SqliteStore::open() on the writer connection.
// All statements are idempotent (CREATE IF NOT EXISTS / ADD COLUMN with silent error).

use super::records::search_terms;
use crate::atoms::error::EngineResult;
use log::info;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> EngineResult<()> {
    info!("[engram::store] Running schema migrations");

    conn.execute_batch(&item_table_ddl("fact_items"))?;
    conn.execute_batch(&item_table_ddl("graph_relations"))?;

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_graph_relations_subject
            ON graph_relations(subject, predicate);
        CREATE INDEX IF NOT EXISTS idx_graph_relations_object
            ON graph_relations(object);

        CREATE TABLE IF NOT EXISTS graph_entities (
            name TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL DEFAULT 'entity',
            mention_count INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
        ",
    )?;

    // ── Idempotent column additions ──────────────────────────────────
    // Pattern: try ADD COLUMN, swallow error if already exists.
    for table in ["fact_items", "graph_relations"] {
        let _ = conn.execute(
            &format!("ALTER TABLE {} ADD COLUMN effectiveness_decayed_at TEXT", table),
            [],
        );
        let _ = conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN needs_reconciliation INTEGER NOT NULL DEFAULT 0",
                table
            ),
            [],
        );
        let _ = conn.execute(
            &format!("ALTER TABLE {} ADD COLUMN search_terms TEXT NOT NULL DEFAULT ''", table),
            [],
        );
        backfill_search_terms(conn, table)?;
    }

    Ok(())
}

/// Fill `search_terms` for rows written before the column existed.
fn backfill_search_terms(conn: &Connection, table: &str) -> EngineResult<()> {
    let pending: Vec<(i64, String)> = {
        let mut stmt = conn.prepare(&format!("SELECT seq, content FROM {} WHERE search_terms = ''", table))?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    if pending.is_empty() {
        return Ok(());
    }
    let sql = format!("UPDATE {} SET search_terms = ?1 WHERE seq = ?2", table);
    for (seq, content) in &pending {
        conn.execute(&sql, rusqlite::params![search_terms(content), seq])?;
    }
    info!("[engram::store] Indexed search terms for {} rows in {}", pending.len(), table);
    Ok(())
}

fn item_table_ddl(table: &str) -> String {
    format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            fingerprint TEXT NOT NULL,
            memory_type TEXT NOT NULL,
            content TEXT NOT NULL,
            category TEXT,
            subject TEXT,
            predicate TEXT,
            object TEXT,
            provenance TEXT,
            confidence REAL NOT NULL,
            effectiveness REAL NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 1,
            positive_feedback_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_accessed_at TEXT NOT NULL,
            effectiveness_decayed_at TEXT,
            source_turn_id TEXT NOT NULL DEFAULT '',
            needs_reconciliation INTEGER NOT NULL DEFAULT 0,
            superseded_by TEXT,
            search_terms TEXT NOT NULL DEFAULT '',
            UNIQUE(fingerprint, memory_type)
        );

        CREATE INDEX IF NOT EXISTS idx_{table}_accessed
            ON {table}(last_accessed_at);
        ",
        table = table
    )
}
