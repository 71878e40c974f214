// ── Engram: SQLite Knowledge Graph ─────────────────────────────────────────
//
// GraphStore over `graph_relations` + `graph_entities`.
// Entities are keyed by their lowercase name; relations reuse the shared
// item layout with subject/predicate/object populated.

use super::records::{self, format_ts, Table};
use super::{GraphStore, ItemUpdate, MemoryRecords, RecordCounts, SqliteStore, UpsertOutcome};
use crate::atoms::engram_types::{MemoryItem, MemoryType};
use crate::atoms::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::sync::Arc;

const STORE: &str = "graph";

/// Knowledge graph view over a shared `SqliteStore`.
pub struct SqliteGraph {
    db: Arc<SqliteStore>,
}

impl SqliteGraph {
    pub(crate) fn new(db: Arc<SqliteStore>) -> Self {
        Self { db }
    }
}

/// Lowercase, non-alphanumerics as single spaces.
fn word_form(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl MemoryRecords for SqliteGraph {
    fn store_name(&self) -> &'static str {
        STORE
    }

    fn get(&self, id: &str) -> EngineResult<Option<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::get(&conn, Table::Relations, id)
    }

    fn get_by_fingerprint(
        &self,
        fingerprint: &str,
        memory_type: MemoryType,
    ) -> EngineResult<Option<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::get_by_fingerprint(&conn, Table::Relations, fingerprint, memory_type)
    }

    fn update(&self, id: &str, update: &ItemUpdate) -> EngineResult<Option<MemoryItem>> {
        let conn = self.db.write_conn(STORE)?;
        records::update(&conn, Table::Relations, id, update)
    }

    fn query(&self, text: &str, types: &[MemoryType], limit: usize) -> EngineResult<Vec<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::query(&conn, Table::Relations, text, types, limit)
    }

    fn idle_items(&self, before: DateTime<Utc>) -> EngineResult<Vec<MemoryItem>> {
        let conn = self.db.read_conn(STORE)?;
        records::idle_items(&conn, Table::Relations, before)
    }

    fn counts(&self) -> EngineResult<RecordCounts> {
        let conn = self.db.read_conn(STORE)?;
        records::counts(&conn, Table::Relations)
    }
}

impl GraphStore for SqliteGraph {
    fn add_entity(&self, name: &str, entity_type: &str) -> EngineResult<()> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(EngineError::InvalidCandidate("empty entity name".into()));
        }
        let conn = self.db.write_conn(STORE)?;
        conn.execute(
            "INSERT INTO graph_entities (name, entity_type, mention_count, created_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(name) DO UPDATE SET mention_count = mention_count + 1",
            params![name, entity_type, format_ts(&Utc::now())],
        )?;
        Ok(())
    }

    fn add_relation(
        &self,
        item: &MemoryItem,
        fingerprint: &str,
        reinforcement: f32,
    ) -> EngineResult<UpsertOutcome> {
        if item.triple.is_none() {
            return Err(EngineError::InvalidCandidate(format!(
                "relation {} has no triple",
                item.id
            )));
        }
        let conn = self.db.write_conn(STORE)?;
        records::upsert(&conn, Table::Relations, item, fingerprint, reinforcement)
    }

    fn query_relations(&self, entity: &str, predicate: Option<&str>) -> EngineResult<Vec<MemoryItem>> {
        let entity = entity.trim().to_lowercase();
        let conn = self.db.read_conn(STORE)?;
        let base = format!(
            "SELECT {} FROM graph_relations
             WHERE superseded_by IS NULL AND (subject = ?1 OR object = ?1)",
            records::ITEM_COLUMNS
        );

        let items: Vec<MemoryItem> = match predicate {
            Some(p) => {
                let sql = format!("{} AND predicate = ?2 ORDER BY seq", base);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![entity, p], records::map_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("{} ORDER BY seq", base);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![entity], records::map_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(items)
    }

    fn search_entities(&self, text: &str) -> EngineResult<Vec<String>> {
        let haystack = word_form(text);
        if haystack.is_empty() {
            return Ok(Vec::new());
        }
        let padded = format!(" {} ", haystack);

        let conn = self.db.read_conn(STORE)?;
        let mut stmt = conn.prepare(
            "SELECT name FROM graph_entities
             WHERE instr(?1, name) > 0
             ORDER BY length(name) DESC, name ASC",
        )?;
        let rows = stmt.query_map(params![text.to_lowercase()], |r| r.get::<_, String>(0))?;

        let names: Vec<String> = rows
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|name| {
                let w = word_form(name);
                !w.is_empty() && padded.contains(&format!(" {} ", w))
            })
            .collect();
        Ok(names)
    }

    fn supersede(&self, old_id: &str, new_id: &str) -> EngineResult<bool> {
        let conn = self.db.write_conn(STORE)?;
        let changed = conn.execute(
            "UPDATE graph_relations SET superseded_by = ?2
             WHERE id = ?1 AND superseded_by IS NULL AND id != ?2",
            params![old_id, new_id],
        )?;
        Ok(changed > 0)
    }

    fn entity_count(&self) -> EngineResult<usize> {
        let conn = self.db.read_conn(STORE)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM graph_entities", [], |r| r.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::RelationshipTriple;

    fn relation(s: &str, p: &str, o: &str) -> MemoryItem {
        let triple = RelationshipTriple::new(s, p, o, 0.9);
        let mut item = MemoryItem::new(MemoryType::Relationship, &triple.text(), 0.9, "t1");
        item.triple = Some(triple);
        item
    }

    #[test]
    fn entities_are_counted_once() {
        let graph = SqliteStore::open_in_memory().unwrap().graph();
        graph.add_entity("User", "person").unwrap();
        graph.add_entity("user", "person").unwrap();
        graph.add_entity("machine learning", "topic").unwrap();
        assert_eq!(graph.entity_count().unwrap(), 2);
        assert!(graph.add_entity("  ", "entity").is_err());
    }

    #[test]
    fn search_entities_matches_whole_words() {
        let graph = SqliteStore::open_in_memory().unwrap().graph();
        graph.add_entity("rust", "topic").unwrap();
        graph.add_entity("machine learning", "topic").unwrap();
        graph.add_entity("ai", "topic").unwrap();

        let found = graph.search_entities("Tell me about Machine Learning and Rust?").unwrap();
        assert_eq!(found, vec!["machine learning".to_string(), "rust".to_string()]);
        // "ai" is inside "said" but not a word of it.
        assert!(graph.search_entities("she said so").unwrap().is_empty());
    }

    #[test]
    fn query_relations_hides_superseded() {
        let graph = SqliteStore::open_in_memory().unwrap().graph();
        let paris = graph.add_relation(&relation("user", "lives_in", "paris"), "fp-paris", 0.0).unwrap();
        let berlin = graph.add_relation(&relation("user", "lives_in", "berlin"), "fp-berlin", 0.0).unwrap();

        assert!(graph.supersede(&paris.item.id, &berlin.item.id).unwrap());
        assert!(!graph.supersede(&paris.item.id, &berlin.item.id).unwrap());

        let live = graph.query_relations("user", Some("lives_in")).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, berlin.item.id);
        assert_eq!(graph.query_relations("berlin", None).unwrap().len(), 1);
    }

    #[test]
    fn relation_without_triple_is_rejected() {
        let graph = SqliteStore::open_in_memory().unwrap().graph();
        let item = MemoryItem::new(MemoryType::Relationship, "loose text", 0.9, "t1");
        let err = graph.add_relation(&item, "fp", 0.0).unwrap_err();
        assert!(!err.is_store_failure());
    }
}
