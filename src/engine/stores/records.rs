// ── Engram: Item Records ───────────────────────────────────────────────────
//
// Row mapping and CRUD shared by `fact_items` and `graph_relations`.
// All methods follow the existing pattern: caller locks a connection,
// helpers run rusqlite statements against it.
//
// Schema lives in stores/schema.rs. Column names here MUST match that schema.

use super::{ItemUpdate, RecordCounts, UpsertOutcome};
use crate::atoms::constants::TIMESTAMP_FORMAT;
use crate::atoms::engram_types::{FactCategory, MemoryItem, MemoryType, Provenance, RelationshipTriple};
use crate::atoms::error::EngineResult;
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// The two item tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Table {
    Facts,
    Relations,
}

impl Table {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Table::Facts => "fact_items",
            Table::Relations => "graph_relations",
        }
    }
}

pub(crate) const ITEM_COLUMNS: &str = "seq, id, memory_type, content, category, subject, predicate, \
     object, provenance, confidence, effectiveness, usage_count, positive_feedback_count, \
     created_at, last_accessed_at, effectiveness_decayed_at, source_turn_id, \
     needs_reconciliation, superseded_by";

// ═══════════════════════════════════════════════════════════════════════════
// Row mapping
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn format_ts(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Map a row selected with `ITEM_COLUMNS`.
pub(crate) fn map_item(row: &Row<'_>) -> rusqlite::Result<MemoryItem> {
    let memory_type: String = row.get(2)?;
    let memory_type = memory_type.parse::<MemoryType>().map_err(|e| conversion_error(2, e))?;

    let category = match row.get::<_, Option<String>>(4)? {
        Some(c) => Some(c.parse::<FactCategory>().map_err(|e| conversion_error(4, e))?),
        None => None,
    };

    let confidence = row.get::<_, f64>(9)? as f32;

    let subject: Option<String> = row.get(5)?;
    let predicate: Option<String> = row.get(6)?;
    let object: Option<String> = row.get(7)?;
    let provenance = match row.get::<_, Option<String>>(8)? {
        Some(json) => serde_json::from_str::<Provenance>(&json).map_err(|e| conversion_error(8, e))?,
        None => Provenance::default(),
    };
    let triple = match (subject, predicate, object) {
        (Some(subject), Some(predicate), Some(object)) => Some(RelationshipTriple {
            subject,
            predicate,
            object,
            confidence,
            provenance,
        }),
        _ => None,
    };

    let created_at: String = row.get(13)?;
    let last_accessed_at: String = row.get(14)?;
    let decayed_at = match row.get::<_, Option<String>>(15)? {
        Some(s) => Some(parse_ts(15, &s)?),
        None => None,
    };

    Ok(MemoryItem {
        seq: row.get(0)?,
        id: row.get(1)?,
        memory_type,
        content: row.get(3)?,
        category,
        triple,
        confidence,
        effectiveness: row.get::<_, f64>(10)? as f32,
        usage_count: row.get(11)?,
        positive_feedback_count: row.get(12)?,
        created_at: parse_ts(13, &created_at)?,
        last_accessed_at: parse_ts(14, &last_accessed_at)?,
        effectiveness_decayed_at: decayed_at,
        source_turn_id: row.get(16)?,
        needs_reconciliation: row.get(17)?,
        superseded_by: row.get(18)?,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Writes
// ═══════════════════════════════════════════════════════════════════════════

/// Atomic insert-or-merge keyed on (fingerprint, memory_type).
///
/// On conflict the existing row absorbs the candidate: confidence becomes the
/// usage-weighted average plus `reinforcement` (capped at 1.0), usage_count
/// increments, last_accessed_at only moves forward. Effectiveness is untouched.
pub(crate) fn upsert(
    conn: &Connection,
    table: Table,
    item: &MemoryItem,
    fingerprint: &str,
    reinforcement: f32,
) -> EngineResult<UpsertOutcome> {
    let t = table.name();
    let sql = format!(
        "INSERT INTO {t} (
            id, fingerprint, memory_type, content, category,
            subject, predicate, object, provenance,
            confidence, effectiveness, usage_count, positive_feedback_count,
            created_at, last_accessed_at, source_turn_id, needs_reconciliation,
            search_terms
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15, ?16, ?17,
            ?19
        )
        ON CONFLICT(fingerprint, memory_type) DO UPDATE SET
            confidence = MIN(1.0,
                ({t}.confidence * {t}.usage_count + excluded.confidence)
                    / ({t}.usage_count + 1) + ?18),
            usage_count = {t}.usage_count + 1,
            last_accessed_at = MAX({t}.last_accessed_at, excluded.last_accessed_at),
            needs_reconciliation = MAX({t}.needs_reconciliation, excluded.needs_reconciliation),
            superseded_by = NULL
        RETURNING {cols}",
        t = t,
        cols = ITEM_COLUMNS
    );

    let provenance = match &item.triple {
        Some(triple) => Some(serde_json::to_string(&triple.provenance)?),
        None => None,
    };

    let stored = conn.query_row(
        &sql,
        params![
            item.id,
            fingerprint,
            item.memory_type.as_str(),
            item.content,
            item.category.map(|c| c.as_str()),
            item.triple.as_ref().map(|tr| tr.subject.as_str()),
            item.triple.as_ref().map(|tr| tr.predicate.as_str()),
            item.triple.as_ref().map(|tr| tr.object.as_str()),
            provenance,
            item.confidence as f64,
            item.effectiveness as f64,
            item.usage_count,
            item.positive_feedback_count,
            format_ts(&item.created_at),
            format_ts(&item.last_accessed_at),
            item.source_turn_id,
            item.needs_reconciliation,
            reinforcement as f64,
            search_terms(&item.content),
        ],
        map_item,
    )?;

    let inserted = stored.id == item.id;
    Ok(UpsertOutcome { item: stored, inserted })
}

/// Undo one `upsert`. An insert is deleted; a merge is rolled back to
/// `prior`. Both are guarded on the usage_count the write left behind, so a
/// concurrent merge in between is never lost. last_accessed_at is kept; it
/// never moves backwards.
pub(crate) fn revert(
    conn: &Connection,
    table: Table,
    written: &UpsertOutcome,
    prior: Option<&MemoryItem>,
) -> EngineResult<bool> {
    let t = table.name();
    let item = &written.item;
    let changed = if written.inserted {
        conn.execute(
            &format!("DELETE FROM {t} WHERE id = ?1 AND usage_count = ?2"),
            params![item.id, item.usage_count],
        )?
    } else {
        let Some(prior) = prior else {
            return Ok(false);
        };
        conn.execute(
            &format!(
                "UPDATE {t} SET confidence = ?1, usage_count = ?2,
                     needs_reconciliation = ?3, superseded_by = ?4
                 WHERE id = ?5 AND usage_count = ?6"
            ),
            params![
                prior.confidence as f64,
                prior.usage_count,
                prior.needs_reconciliation,
                prior.superseded_by,
                item.id,
                item.usage_count,
            ],
        )?
    };
    Ok(changed > 0)
}

/// Apply an `ItemUpdate` in one statement; `None` if the id is unknown
/// (or the idle guard rejected the update).
pub(crate) fn update(
    conn: &Connection,
    table: Table,
    id: &str,
    upd: &ItemUpdate,
) -> EngineResult<Option<MemoryItem>> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(score) = upd.effectiveness {
        values.push(Box::new(score.clamp(0.0, 1.0) as f64));
        sets.push(format!("effectiveness = ?{}", values.len()));
    } else if let Some(step) = upd.ema_step {
        values.push(Box::new(step.alpha as f64));
        let a = values.len();
        values.push(Box::new(step.target as f64));
        let tgt = values.len();
        sets.push(format!(
            "effectiveness = MIN(1.0, MAX(0.0, effectiveness + ?{a} * (?{tgt} - effectiveness)))"
        ));
    }
    if upd.usage_delta > 0 {
        values.push(Box::new(upd.usage_delta));
        sets.push(format!("usage_count = usage_count + ?{}", values.len()));
    }
    if upd.positive_feedback_delta > 0 {
        values.push(Box::new(upd.positive_feedback_delta));
        sets.push(format!("positive_feedback_count = positive_feedback_count + ?{}", values.len()));
    }
    if let Some(at) = upd.accessed_at {
        values.push(Box::new(format_ts(&at)));
        sets.push(format!("last_accessed_at = MAX(last_accessed_at, ?{})", values.len()));
    }
    if let Some(at) = upd.decayed_at {
        values.push(Box::new(format_ts(&at)));
        sets.push(format!("effectiveness_decayed_at = ?{}", values.len()));
    }

    if sets.is_empty() {
        return get(conn, table, id);
    }

    values.push(Box::new(id.to_string()));
    let mut where_clause = format!("id = ?{}", values.len());
    if let Some(idle) = upd.only_if_idle_since {
        values.push(Box::new(format_ts(&idle)));
        where_clause.push_str(&format!(" AND last_accessed_at <= ?{}", values.len()));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        table.name(),
        sets.join(", "),
        where_clause,
        ITEM_COLUMNS
    );
    let item = conn
        .query_row(&sql, rusqlite::params_from_iter(values.iter()), map_item)
        .optional()?;
    Ok(item)
}

// ═══════════════════════════════════════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn get(conn: &Connection, table: Table, id: &str) -> EngineResult<Option<MemoryItem>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", ITEM_COLUMNS, table.name());
    Ok(conn.query_row(&sql, params![id], map_item).optional()?)
}

pub(crate) fn get_by_fingerprint(
    conn: &Connection,
    table: Table,
    fingerprint: &str,
    memory_type: MemoryType,
) -> EngineResult<Option<MemoryItem>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE fingerprint = ?1 AND memory_type = ?2",
        ITEM_COLUMNS,
        table.name()
    );
    Ok(conn
        .query_row(&sql, params![fingerprint, memory_type.as_str()], map_item)
        .optional()?)
}

/// Space-delimited lowercase words of `content`, with a leading and trailing
/// space so `LIKE '% word %'` matches whole words only.
pub(crate) fn search_terms(content: &str) -> String {
    let mut out = String::from(" ");
    for w in content.to_lowercase().split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        out.push_str(w);
        out.push(' ');
    }
    out
}

/// Lowercase alphanumeric words of at least two characters, deduplicated.
fn like_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for w in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(|w| w.to_lowercase())
    {
        if !words.contains(&w) {
            words.push(w);
        }
    }
    words
}

fn type_filter(types: &[MemoryType]) -> String {
    if types.is_empty() {
        return String::new();
    }
    let list: Vec<String> = types.iter().map(|t| format!("'{}'", t.as_str())).collect();
    format!(" AND memory_type IN ({})", list.join(", "))
}

/// Live rows containing any word of `text` as a whole word, most recently used first.
pub(crate) fn query(
    conn: &Connection,
    table: Table,
    text: &str,
    types: &[MemoryType],
    limit: usize,
) -> EngineResult<Vec<MemoryItem>> {
    let words = like_words(text);
    if words.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let likes: Vec<String> = (1..=words.len())
        .map(|i| format!("search_terms LIKE ?{}", i))
        .collect();
    let sql = format!(
        "SELECT {} FROM {} WHERE superseded_by IS NULL AND ({}){}
         ORDER BY last_accessed_at DESC, seq ASC LIMIT {}",
        ITEM_COLUMNS,
        table.name(),
        likes.join(" OR "),
        type_filter(types),
        limit
    );
    let patterns: Vec<String> = words.iter().map(|w| format!("% {} %", w)).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(patterns.iter()), map_item)?;
    let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

pub(crate) fn idle_items(
    conn: &Connection,
    table: Table,
    before: DateTime<Utc>,
) -> EngineResult<Vec<MemoryItem>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE superseded_by IS NULL AND last_accessed_at <= ?1 ORDER BY seq",
        ITEM_COLUMNS,
        table.name()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![format_ts(&before)], map_item)?;
    let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

pub(crate) fn counts(conn: &Connection, table: Table) -> EngineResult<RecordCounts> {
    let sql = format!(
        "SELECT
            COALESCE(SUM(CASE WHEN superseded_by IS NULL THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN superseded_by IS NULL AND needs_reconciliation = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN superseded_by IS NOT NULL THEN 1 ELSE 0 END), 0)
         FROM {}",
        table.name()
    );
    let (live, reconcile, superseded): (i64, i64, i64) =
        conn.query_row(&sql, [], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?;
    Ok(RecordCounts {
        live: live as usize,
        needs_reconciliation: reconcile as usize,
        superseded: superseded as usize,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stores::schema::run_migrations;
    use crate::engine::stores::EmaStep;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn fact(content: &str, confidence: f32) -> MemoryItem {
        let mut item = MemoryItem::new(MemoryType::SemanticFact, content, confidence, "t1");
        item.category = Some(FactCategory::ToolResult);
        item
    }

    #[test]
    fn upsert_inserts_then_merges() {
        let conn = conn();
        let first = upsert(&conn, Table::Facts, &fact("2+2 is 4", 0.8), "fp1", 0.05).unwrap();
        assert!(first.inserted);
        assert_eq!(first.item.usage_count, 1);
        assert!(first.item.seq > 0);

        let second = upsert(&conn, Table::Facts, &fact("2+2 is 4", 0.6), "fp1", 0.05).unwrap();
        assert!(!second.inserted);
        assert_eq!(second.item.id, first.item.id);
        assert_eq!(second.item.usage_count, 2);
        // (0.8·1 + 0.6) / 2 + 0.05 = 0.75
        assert!((second.item.confidence - 0.75).abs() < 1e-4, "got {}", second.item.confidence);
        // Effectiveness is not touched by merges.
        assert!((second.item.effectiveness - first.item.effectiveness).abs() < 1e-6);
    }

    #[test]
    fn merged_confidence_is_capped() {
        let conn = conn();
        upsert(&conn, Table::Facts, &fact("x", 1.0), "fp", 0.5).unwrap();
        let merged = upsert(&conn, Table::Facts, &fact("x", 1.0), "fp", 0.5).unwrap();
        assert!(merged.item.confidence <= 1.0);
    }

    #[test]
    fn last_accessed_never_moves_back() {
        let conn = conn();
        let item = fact("x", 0.9);
        let stored = upsert(&conn, Table::Facts, &item, "fp", 0.0).unwrap().item;
        let past = stored.last_accessed_at - chrono::Duration::days(3);
        let upd = ItemUpdate { accessed_at: Some(past), usage_delta: 1, ..Default::default() };
        let after = update(&conn, Table::Facts, &stored.id, &upd).unwrap().unwrap();
        assert_eq!(after.last_accessed_at, stored.last_accessed_at);
        assert_eq!(after.usage_count, 2);
    }

    #[test]
    fn ema_update_is_bounded() {
        let conn = conn();
        let stored = upsert(&conn, Table::Facts, &fact("x", 0.9), "fp", 0.0).unwrap().item;
        let upd = ItemUpdate {
            ema_step: Some(EmaStep { target: 1.0, alpha: 0.3 }),
            ..Default::default()
        };
        let after = update(&conn, Table::Facts, &stored.id, &upd).unwrap().unwrap();
        // 0.5 + 0.3·(1 − 0.5)
        assert!((after.effectiveness - 0.65).abs() < 1e-4);
    }

    #[test]
    fn idle_guard_rejects_recently_used() {
        let conn = conn();
        let stored = upsert(&conn, Table::Facts, &fact("x", 0.9), "fp", 0.0).unwrap().item;
        let upd = ItemUpdate {
            effectiveness: Some(0.2),
            only_if_idle_since: Some(stored.last_accessed_at - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(update(&conn, Table::Facts, &stored.id, &upd).unwrap().is_none());
    }

    #[test]
    fn query_matches_any_word_and_filters_type() {
        let conn = conn();
        upsert(&conn, Table::Facts, &fact("The capital of France is Paris", 0.9), "a", 0.0).unwrap();
        let mut ep = MemoryItem::new(MemoryType::Episodic, "We talked about Paris trips", 0.9, "t2");
        ep.category = None;
        upsert(&conn, Table::Facts, &ep, "b", 0.0).unwrap();

        let all = query(&conn, Table::Facts, "paris", &[], 10).unwrap();
        assert_eq!(all.len(), 2);
        let facts_only = query(&conn, Table::Facts, "paris", &[MemoryType::SemanticFact], 10).unwrap();
        assert_eq!(facts_only.len(), 1);
        assert!(query(&conn, Table::Facts, "?", &[], 10).unwrap().is_empty());
    }

    #[test]
    fn query_ignores_substring_only_rows() {
        let conn = conn();
        upsert(&conn, Table::Facts, &fact("ai ethics matters", 0.9), "ai", 0.0).unwrap();
        for i in 0..20 {
            let noise = fact(&format!("she said thing {i}"), 0.9);
            upsert(&conn, Table::Facts, &noise, &format!("noise-{i}"), 0.0).unwrap();
        }
        // A pool smaller than the substring-only rows still reaches the real match.
        let found = query(&conn, Table::Facts, "ai", &[], 5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "ai ethics matters");
    }

    #[test]
    fn corrupt_row_fails_the_read() {
        let conn = conn();
        let stored = upsert(&conn, Table::Facts, &fact("broken clock", 0.9), "fp", 0.0).unwrap().item;
        conn.execute(
            "UPDATE fact_items SET created_at = 'not a time' WHERE id = ?1",
            params![stored.id],
        )
        .unwrap();
        assert!(query(&conn, Table::Facts, "clock", &[], 10).is_err());
        let later = stored.last_accessed_at + chrono::Duration::days(1);
        assert!(idle_items(&conn, Table::Facts, later).is_err());
    }

    #[test]
    fn triple_round_trips_with_provenance() {
        let conn = conn();
        let triple = RelationshipTriple::implicit("user", "interested_in", "rust", 0.6, "topic_question");
        let mut item = MemoryItem::new(MemoryType::Relationship, &triple.text(), 0.6, "t1");
        item.triple = Some(triple.clone());
        let stored = upsert(&conn, Table::Relations, &item, "fp", 0.0).unwrap().item;
        let back = stored.triple.unwrap();
        assert_eq!(back.provenance, triple.provenance);
        assert_eq!(back.object, "rust");
    }

    #[test]
    fn counts_split_live_and_superseded() {
        let conn = conn();
        let a = upsert(&conn, Table::Relations, &fact("a", 0.9), "a", 0.0).unwrap().item;
        let b = upsert(&conn, Table::Relations, &fact("b", 0.9), "b", 0.0).unwrap().item;
        conn.execute(
            "UPDATE graph_relations SET superseded_by = ?1 WHERE id = ?2",
            params![b.id, a.id],
        )
        .unwrap();
        let c = counts(&conn, Table::Relations).unwrap();
        assert_eq!(c, RecordCounts { live: 1, needs_reconciliation: 0, superseded: 1 });
    }
}
