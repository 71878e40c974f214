// Engram Stores: persistence collaborators for the memory engine.
//
// The engine only ever talks to the traits below. `SqliteStore` is the
// bundled implementation: one SQLite database holding both the fact store
// and the knowledge graph, with a writer connection and (for file-backed
// databases) a separate WAL reader so retrieval never waits on writers.
//
// Module layout:
//   schema     idempotent migrations
//   records    row mapping + CRUD shared by both item tables
//   facts      FactStore for SqliteFacts
//   graph      GraphStore for SqliteGraph (relations + entities)

use crate::atoms::constants::{APP_DIR_NAME, DEFAULT_DB_FILE};
use crate::atoms::engram_types::{MemoryItem, MemoryType, StoreConfig};
use crate::atoms::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use log::info;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod facts;
mod graph;
mod records;
pub(crate) mod schema;

pub use facts::SqliteFacts;
pub use graph::SqliteGraph;

// ═══════════════════════════════════════════════════════════════════════════
// Collaborator contracts
// ═══════════════════════════════════════════════════════════════════════════

/// One step of an exponential moving average: `score += alpha · (target − score)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaStep {
    pub target: f32,
    pub alpha: f32,
}

/// Field changes applied to one persisted item in a single statement.
/// `None`/zero fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub ema_step: Option<EmaStep>,
    pub effectiveness: Option<f32>,
    pub usage_delta: u32,
    pub positive_feedback_delta: u32,
    /// Written as MAX(current, value); never moves backwards.
    pub accessed_at: Option<DateTime<Utc>>,
    pub decayed_at: Option<DateTime<Utc>>,
    /// Skip the update if the item was accessed after this instant.
    pub only_if_idle_since: Option<DateTime<Utc>>,
}

/// Result of an atomic insert-or-merge.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// The authoritative row after the write.
    pub item: MemoryItem,
    /// `true` when a new row was created, `false` on a merge.
    pub inserted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub live: usize,
    pub needs_reconciliation: usize,
    pub superseded: usize,
}

/// Operations common to every item-holding store.
pub trait MemoryRecords: Send + Sync {
    /// Short name used in logs and StoreUnavailable errors.
    fn store_name(&self) -> &'static str;

    fn get(&self, id: &str) -> EngineResult<Option<MemoryItem>>;

    fn get_by_fingerprint(
        &self,
        fingerprint: &str,
        memory_type: MemoryType,
    ) -> EngineResult<Option<MemoryItem>>;

    /// Apply `update` to item `id`; returns the row afterwards, `None` if absent.
    fn update(&self, id: &str, update: &ItemUpdate) -> EngineResult<Option<MemoryItem>>;

    /// Live items whose content contains any of the words in `text`.
    /// An empty `types` slice means every type.
    fn query(&self, text: &str, types: &[MemoryType], limit: usize) -> EngineResult<Vec<MemoryItem>>;

    /// Live items not accessed since `before`.
    fn idle_items(&self, before: DateTime<Utc>) -> EngineResult<Vec<MemoryItem>>;

    fn counts(&self) -> EngineResult<RecordCounts>;
}

/// The flat fact store.
pub trait FactStore: MemoryRecords {
    /// Insert `item` or merge it into the row with the same (fingerprint, type).
    /// Must be one atomic operation against the store.
    fn insert(&self, item: &MemoryItem, fingerprint: &str, reinforcement: f32)
        -> EngineResult<UpsertOutcome>;

    /// Undo `written`: delete the row it inserted, or put a merged row back
    /// to `prior`. Skipped (returns false) if another write touched the row since.
    fn revert(&self, written: &UpsertOutcome, prior: Option<&MemoryItem>) -> EngineResult<bool>;
}

/// The knowledge graph.
pub trait GraphStore: MemoryRecords {
    fn add_entity(&self, name: &str, entity_type: &str) -> EngineResult<()>;

    /// Insert-or-merge a relation item (its `triple` must be set).
    fn add_relation(&self, item: &MemoryItem, fingerprint: &str, reinforcement: f32)
        -> EngineResult<UpsertOutcome>;

    /// Live relations touching `entity`, optionally filtered by predicate.
    fn query_relations(&self, entity: &str, predicate: Option<&str>) -> EngineResult<Vec<MemoryItem>>;

    /// Known entity names that occur as whole words in `text`.
    fn search_entities(&self, text: &str) -> EngineResult<Vec<String>>;

    /// Mark `old_id` superseded by `new_id`. Returns false if already superseded.
    fn supersede(&self, old_id: &str, new_id: &str) -> EngineResult<bool>;

    fn entity_count(&self) -> EngineResult<usize>;
}

// ═══════════════════════════════════════════════════════════════════════════
// SQLite implementation
// ═══════════════════════════════════════════════════════════════════════════

/// Default database location: `<data dir>/engram-recall/memory.db`.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(DEFAULT_DB_FILE)
}

/// Shared SQLite handle behind both collaborator views.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    /// Separate WAL reader for file databases; `None` for in-memory.
    reader: Option<Mutex<Connection>>,
    timeout: Duration,
}

impl SqliteStore {
    /// Open (or create) the database named by `config` and run migrations.
    pub fn open(config: &StoreConfig) -> EngineResult<Arc<Self>> {
        let path = config.path.clone().unwrap_or_else(default_db_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("[engram::store] Opening memory store at {:?}", path);

        let timeout = Duration::from_millis(config.timeout_ms);
        let writer = Connection::open(&path)?;
        Self::configure_connection(&writer, timeout)?;
        schema::run_migrations(&writer)?;

        let reader = Connection::open(&path)?;
        Self::configure_connection(&reader, timeout)?;

        Ok(Arc::new(SqliteStore {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
            timeout,
        }))
    }

    /// Private in-memory database on a single connection. Used by tests.
    pub fn open_in_memory() -> EngineResult<Arc<Self>> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Arc::new(SqliteStore {
            writer: Mutex::new(conn),
            reader: None,
            timeout: Duration::from_millis(crate::atoms::constants::DEFAULT_STORE_TIMEOUT_MS),
        }))
    }

    /// Fact store view over this database.
    pub fn facts(self: &Arc<Self>) -> Arc<SqliteFacts> {
        Arc::new(SqliteFacts::new(Arc::clone(self)))
    }

    /// Knowledge graph view over this database.
    pub fn graph(self: &Arc<Self>) -> Arc<SqliteGraph> {
        Arc::new(SqliteGraph::new(Arc::clone(self)))
    }

    fn configure_connection(conn: &Connection, timeout: Duration) -> EngineResult<()> {
        conn.busy_timeout(timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch("PRAGMA synchronous=NORMAL;").ok();
        Ok(())
    }

    /// Lock the writer, giving up after the configured timeout.
    pub(crate) fn write_conn(&self, store: &'static str) -> EngineResult<MutexGuard<'_, Connection>> {
        self.writer.try_lock_for(self.timeout).ok_or_else(|| {
            EngineError::store_unavailable(store, format!("writer busy for {:?}", self.timeout))
        })
    }

    /// Lock a connection for reads. File databases never contend with the writer.
    pub(crate) fn read_conn(&self, store: &'static str) -> EngineResult<MutexGuard<'_, Connection>> {
        let lock = self.reader.as_ref().unwrap_or(&self.writer);
        lock.try_lock_for(self.timeout).ok_or_else(|| {
            EngineError::store_unavailable(store, format!("reader busy for {:?}", self.timeout))
        })
    }
}
