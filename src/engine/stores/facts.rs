// ── Engram: SQLite Fact Store ──────────────────────────────────────────────
//
// FactStore over `fact_items`. Writes lock the writer connection; reads go
// through the reader so retrieval never waits on routing.

use super::records::{self, Table};
use super::{FactStore, ItemUpdate, MemoryRecords, RecordCounts, SqliteStore, UpsertOutcome};
use crate::atoms::engram_types::{MemoryItem, MemoryType};
use crate::atoms::error::EngineResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const STORE: &str = "facts";

/// Fact store view over a shared `SqliteStore`.
pub struct SqliteFacts {
    db: Arc<SqliteStore>,
}

impl SqliteFacts {
    pub(crate) fn new(db: Arc<SqliteStore>) -> Self {
        Self { db }
    }
}

impl MemoryRecords for SqliteFacts {
    fn store_name(&self) -> &'static str {
        STORE
    }

    fn get(&self, id: &str) -> EngineResult<Option<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::get(&conn, Table::Facts, id)
    }

    fn get_by_fingerprint(
        &self,
        fingerprint: &str,
        memory_type: MemoryType,
    ) -> EngineResult<Option<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::get_by_fingerprint(&conn, Table::Facts, fingerprint, memory_type)
    }

    fn update(&self, id: &str, update: &ItemUpdate) -> EngineResult<Option<MemoryItem>> {
        let conn = self.db.write_conn(STORE)?;
        records::update(&conn, Table::Facts, id, update)
    }

    fn query(&self, text: &str, types: &[MemoryType], limit: usize) -> EngineResult<Vec<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::query(&conn, Table::Facts, text, types, limit)
    }

    fn idle_items(&self, before: DateTime<Utc>) -> EngineResult<Vec<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::idle_items(&conn, Table::Facts, before)
    }

    fn counts(&self) -> EngineResult<RecordCounts> {
        let conn = self.db.read_conn(STORE)?;
        records::counts(&conn, Table::Facts)
    }
}

impl FactStore for SqliteFacts {
    fn insert(
        &self,
        item: &MemoryItem,
        fingerprint: &str,
        reinforcement: f32,
    ) -> EngineResult<UpsertOutcome> {
        let conn = self.db.write_conn(STORE)?;
        records::upsert(&conn, Table::Facts, item, fingerprint, reinforcement)
    }

    fn revert(&self, written: &UpsertOutcome, prior: Option<&MemoryItem>) -> EngineResult<bool> {
        let conn = self.db.write_conn(STORE)?;
        records::revert(&conn, Table::Facts, written, prior)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::FactCategory;

    #[test]
    fn insert_and_lookup_by_fingerprint() {
        let facts = SqliteStore::open_in_memory().unwrap().facts();
        let mut item = MemoryItem::new(MemoryType::SemanticFact, "result of 2+2 is 4", 0.9, "t1");
        item.category = Some(FactCategory::ToolResult);

        let out = facts.insert(&item, "fp-2plus2", 0.05).unwrap();
        assert!(out.inserted);

        let found = facts.get_by_fingerprint("fp-2plus2", MemoryType::SemanticFact).unwrap();
        assert_eq!(found.map(|i| i.id), Some(item.id.clone()));
        assert!(facts.get_by_fingerprint("fp-2plus2", MemoryType::Skill).unwrap().is_none());
        assert_eq!(facts.counts().unwrap().live, 1);
    }

    #[test]
    fn revert_undoes_insert_and_merge() {
        let facts = SqliteStore::open_in_memory().unwrap().facts();
        let item = MemoryItem::new(MemoryType::SemanticFact, "tea is hot", 0.8, "t1");
        let inserted = facts.insert(&item, "fp-tea", 0.05).unwrap();
        let prior = inserted.item.clone();

        let again = MemoryItem::new(MemoryType::SemanticFact, "tea is hot", 0.4, "t2");
        let merged = facts.insert(&again, "fp-tea", 0.05).unwrap();
        assert_eq!(merged.item.usage_count, 2);

        assert!(facts.revert(&merged, Some(&prior)).unwrap());
        let back = facts.get(&prior.id).unwrap().unwrap();
        assert_eq!(back.usage_count, 1);
        assert!((back.confidence - prior.confidence).abs() < 1e-6);
        // A second revert of the same merge finds the row already changed.
        assert!(!facts.revert(&merged, Some(&prior)).unwrap());

        assert!(facts.revert(&inserted, None).unwrap());
        assert!(facts.get(&prior.id).unwrap().is_none());
    }

    #[test]
    fn update_unknown_id_is_none() {
        let facts = SqliteStore::open_in_memory().unwrap().facts();
        let upd = ItemUpdate { usage_delta: 1, ..Default::default() };
        assert!(facts.update("missing", &upd).unwrap().is_none());
    }
}
