// ── Engram: Deduplication Cache ────────────────────────────────────────────
//
// Two tiers:
//   1. The persisted UNIQUE(fingerprint, memory_type) constraint in the
//      stores. Authoritative. Insert-or-merge against it is one statement.
//   2. This in-process LRU of item snapshots. Advisory only: it does not
//      survive restarts and is not shared across processes, so every hit is
//      confirmed against the store before anyone acts on it.
//
// The hint tier also backs degraded retrieval: when a store read fails the
// retrieval engine scores these snapshots and marks the result partial.

use crate::atoms::engram_types::{MemoryItem, MemoryType};
use crate::atoms::error::EngineResult;
use crate::engine::stores::MemoryRecords;
use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

type HintKey = (String, MemoryType);

pub struct DedupCache {
    hints: Mutex<LruCache<HintKey, MemoryItem>>,
}

impl DedupCache {
    /// `capacity` of zero is clamped to one; config validation rejects it earlier.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { hints: Mutex::new(LruCache::new(cap)) }
    }

    /// Advisory lookup only. Never treat the result as ground truth.
    pub fn peek(&self, fingerprint: &str, memory_type: MemoryType) -> Option<String> {
        self.hints
            .lock()
            .peek(&(fingerprint.to_string(), memory_type))
            .map(|item| item.id.clone())
    }

    /// Resolve a fingerprint to its persisted item: hint first, always
    /// confirmed against `store`. Stale hints are evicted; confirmed rows
    /// refresh the hint.
    pub fn check<S: MemoryRecords + ?Sized>(
        &self,
        fingerprint: &str,
        memory_type: MemoryType,
        store: &S,
    ) -> EngineResult<Option<MemoryItem>> {
        let key = (fingerprint.to_string(), memory_type);
        let hinted = self.hints.lock().get(&key).map(|i| i.id.clone());

        match store.get_by_fingerprint(fingerprint, memory_type)? {
            Some(item) => {
                if hinted.as_deref() != Some(item.id.as_str()) {
                    debug!("[engram::dedup] Hint refreshed from {} ({})", store.store_name(), memory_type);
                }
                self.hints.lock().put(key, item.clone());
                Ok(Some(item))
            }
            None => {
                if hinted.is_some() {
                    debug!("[engram::dedup] Evicting stale hint ({})", memory_type);
                    self.hints.lock().pop(&key);
                }
                Ok(None)
            }
        }
    }

    /// Record the authoritative post-write row. Called after every insert-or-merge.
    pub fn register(&self, fingerprint: &str, item: &MemoryItem) {
        self.hints
            .lock()
            .put((fingerprint.to_string(), item.memory_type), item.clone());
    }

    /// Drop every hint pointing at `id` (e.g. after it was superseded).
    pub fn forget(&self, id: &str) {
        let mut hints = self.hints.lock();
        let stale: Vec<HintKey> = hints
            .iter()
            .filter(|(_, item)| item.id == id)
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale {
            hints.pop(&k);
        }
    }

    /// Copies of every live hinted item, most recently used first.
    pub fn snapshots(&self) -> Vec<MemoryItem> {
        self.hints
            .lock()
            .iter()
            .filter(|(_, item)| item.is_live())
            .map(|(_, item)| item.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
