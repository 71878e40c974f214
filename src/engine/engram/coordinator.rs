// ── Engram: Memory Coordinator ─────────────────────────────────────────────
//
// The façade the conversation pipeline talks to. Owns the validated config,
// both store collaborators, the dedup cache and every engine component:
//
//   store(turn, candidates)   memory-storage step: route explicit candidates,
//                             then the implicit relations found in the turn
//   retrieve(query, context)  context-building step
//   record_use(id, feedback)  reflection step, after the response went out;
//                             failures are logged, never returned
//   apply_decay(now)          periodic maintenance
//
// A turn is processed sequentially. The coordinator itself is Send + Sync and
// may be shared by many conversations; the stores carry the concurrency.

use crate::atoms::engram_types::{
    Candidate, ConversationContext, DecayReport, EffectivenessRecord, Feedback, MemoryConfig,
    MemoryItem, MemoryStats, MemoryType, RelationshipTriple, RetrievalQuery, RetrievalResult,
    StorageReport, TurnContext, ValidatedConfig,
};
use crate::atoms::error::EngineResult;
use crate::engine::engram::dedup_cache::DedupCache;
use crate::engine::engram::effectiveness::EffectivenessTracker;
use crate::engine::engram::fingerprint::{fingerprint_content, fingerprint_triple};
use crate::engine::engram::implicit_relations::ImplicitRelationExtractor;
use crate::engine::engram::retrieval::{RetrievalEngine, StoreView};
use crate::engine::engram::router::{FactRouter, RouteTargets};
use crate::engine::stores::{FactStore, GraphStore, SqliteStore};
use chrono::{DateTime, Utc};
use log::{error, info};
use std::sync::Arc;

pub struct MemoryCoordinator {
    config: ValidatedConfig,
    facts: Arc<dyn FactStore>,
    graph: Arc<dyn GraphStore>,
    dedup: DedupCache,
    router: FactRouter,
    extractor: ImplicitRelationExtractor,
    tracker: EffectivenessTracker,
    retrieval: RetrievalEngine,
}

impl MemoryCoordinator {
    /// Build from an already-validated config and two store collaborators.
    pub fn new(
        config: ValidatedConfig,
        facts: Arc<dyn FactStore>,
        graph: Arc<dyn GraphStore>,
    ) -> EngineResult<Self> {
        let raw = &config.raw;
        let router = FactRouter::new(raw.routing.clone(), raw.effectiveness.initial_score)?;
        let extractor = ImplicitRelationExtractor::new(&raw.implicit)?;
        let tracker = EffectivenessTracker::new(raw.effectiveness.clone());
        let retrieval = RetrievalEngine::new(config.strategy, raw.retrieval.clone(), config.type_weights);
        let dedup = DedupCache::new(raw.dedup.cache_size);

        info!(
            "[engram] Memory coordinator ready: strategy={}, dedup cache={}, implicit={}",
            config.strategy, raw.dedup.cache_size, raw.implicit.enabled
        );
        Ok(Self { config, facts, graph, dedup, router, extractor, tracker, retrieval })
    }

    /// Validate `config` and open the bundled SQLite stores it names.
    pub fn open(config: &MemoryConfig) -> EngineResult<Self> {
        let validated = config.validate()?;
        let db = SqliteStore::open(&validated.raw.store)?;
        let facts: Arc<dyn FactStore> = db.facts();
        let graph: Arc<dyn GraphStore> = db.graph();
        Self::new(validated, facts, graph)
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Storage
    // ═══════════════════════════════════════════════════════════════════════

    /// Route every explicit candidate, then every implicit relation the turn
    /// implies. Never fails: problems show up as Discarded outcomes.
    pub fn store(&self, turn: &TurnContext, candidates: Vec<Candidate>) -> StorageReport {
        let implicit = self.extractor.extract(&turn.utterance, turn.prior_turn.as_deref());
        let targets = RouteTargets {
            facts: self.facts.as_ref(),
            graph: self.graph.as_ref(),
            dedup: &self.dedup,
        };

        let explicit = candidates.into_iter().map(|mut c| {
            if c.source_turn_id.is_empty() {
                c.source_turn_id = turn.turn_id.clone();
            }
            c
        });
        let derived = implicit.into_iter().map(|t| Candidate::relation(t, &turn.turn_id));

        let mut report = StorageReport::default();
        for candidate in explicit.chain(derived) {
            let routed = self.router.route(&candidate, &targets);
            report.superseded += routed.superseded;
            report.record(routed.outcome);
        }

        if report.total() > 0 {
            info!(
                "[engram] Turn {}: stored={} merged={} discarded={} superseded={}",
                turn.turn_id, report.stored, report.merged, report.discarded, report.superseded
            );
        }
        report
    }

    /// Persisted fact with the same normalized content and type, if any.
    pub fn find_existing(&self, content: &str, memory_type: MemoryType) -> EngineResult<Option<MemoryItem>> {
        let fp = fingerprint_content(memory_type, content);
        self.dedup.check(&fp, memory_type, self.facts.as_ref())
    }

    /// Persisted relation with the same canonical triple, if any.
    pub fn find_relation(&self, triple: &RelationshipTriple) -> EngineResult<Option<MemoryItem>> {
        let fp = fingerprint_triple(triple);
        self.dedup.check(&fp, MemoryType::Relationship, self.graph.as_ref())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Retrieval
    // ═══════════════════════════════════════════════════════════════════════

    pub fn retrieve(&self, query: &RetrievalQuery, context: &ConversationContext) -> RetrievalResult {
        self.retrieve_at(query, context, Utc::now())
    }

    pub fn retrieve_at(
        &self,
        query: &RetrievalQuery,
        context: &ConversationContext,
        now: DateTime<Utc>,
    ) -> RetrievalResult {
        let stores = StoreView { facts: self.facts.as_ref(), graph: self.graph.as_ref() };
        self.retrieval.retrieve_at(query, context, &stores, &self.dedup, now)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Effectiveness
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply feedback for one retrieved memory. Failures are logged and
    /// swallowed; the user-facing path never sees them.
    pub fn record_use(&self, memory_item_id: &str, feedback: Feedback) -> Option<EffectivenessRecord> {
        match self.tracker.record_use(memory_item_id, feedback, self.facts.as_ref(), self.graph.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                error!("[engram::effectiveness] record_use({}) failed: {}", memory_item_id, e);
                None
            }
        }
    }

    /// Fire-and-forget `record_use`: on the blocking pool when a tokio runtime
    /// is running, inline otherwise.
    pub fn spawn_record_use(self: &Arc<Self>, memory_item_id: &str, feedback: Feedback) {
        let id = memory_item_id.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = Arc::clone(self);
                handle.spawn_blocking(move || {
                    this.record_use(&id, feedback);
                });
            }
            Err(_) => {
                self.record_use(&id, feedback);
            }
        }
    }

    /// Decay stale effectiveness scores as of `now`.
    pub fn apply_decay(&self, now: DateTime<Utc>) -> EngineResult<DecayReport> {
        self.tracker.apply_decay(now, self.facts.as_ref(), self.graph.as_ref())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stats
    // ═══════════════════════════════════════════════════════════════════════

    pub fn memory_stats(&self) -> EngineResult<MemoryStats> {
        let facts = self.facts.counts()?;
        let relations = self.graph.counts()?;
        Ok(MemoryStats {
            facts: facts.live,
            relations: relations.live,
            entities: self.graph.entity_count()?,
            needs_reconciliation: facts.needs_reconciliation + relations.needs_reconciliation,
            superseded: facts.superseded + relations.superseded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::{Destination, FactCategory, RouteOutcome};

    fn coordinator() -> MemoryCoordinator {
        let db = SqliteStore::open_in_memory().unwrap();
        let validated = MemoryConfig::default().validate().unwrap();
        MemoryCoordinator::new(validated, db.facts(), db.graph()).unwrap()
    }

    #[test]
    fn explicit_candidates_inherit_turn_id() {
        let c = coordinator();
        let turn = TurnContext::new("turn-9", "ok");
        let report = c.store(&turn, vec![Candidate::fact("the sky is blue", FactCategory::Generic, 0.9, "")]);
        assert_eq!(report.stored, 1);
        let item = c.find_existing("The sky is blue.", MemoryType::SemanticFact).unwrap().unwrap();
        assert_eq!(item.source_turn_id, "turn-9");
    }

    #[test]
    fn implicit_relations_are_routed_after_explicit() {
        let c = coordinator();
        let turn = TurnContext::new("t1", "Thanks, that's really helpful!");
        let report = c.store(&turn, vec![Candidate::fact("2+2 is 4", FactCategory::ToolResult, 0.9, "t1")]);
        assert_eq!(report.stored, 2);
        assert!(matches!(
            report.outcomes[0],
            RouteOutcome::Stored { destination: Destination::FactStore, .. }
        ));
        assert!(matches!(
            report.outcomes[1],
            RouteOutcome::Stored { destination: Destination::KnowledgeGraph, .. }
        ));
        let rel = c
            .find_relation(&RelationshipTriple::new("user", "satisfied_with", "interaction", 0.6))
            .unwrap();
        assert!(rel.is_some());
    }

    #[test]
    fn record_use_on_unknown_id_is_quiet() {
        let c = coordinator();
        assert!(c.record_use("missing", Feedback::Helpful).is_none());
    }

    #[test]
    fn spawn_without_runtime_runs_inline() {
        let c = Arc::new(coordinator());
        let turn = TurnContext::new("t1", "");
        let report = c.store(&turn, vec![Candidate::fact("tea is hot", FactCategory::Generic, 0.9, "t1")]);
        let RouteOutcome::Stored { ids, .. } = &report.outcomes[0] else {
            panic!("expected Stored");
        };
        c.spawn_record_use(&ids[0], Feedback::Helpful);
        let item = c.find_existing("tea is hot", MemoryType::SemanticFact).unwrap().unwrap();
        assert_eq!(item.positive_feedback_count, 1);
    }

    #[test]
    fn stats_count_both_stores() {
        let c = coordinator();
        let turn = TurnContext::new("t1", "");
        c.store(
            &turn,
            vec![
                Candidate::fact("rust 1.80 shipped", FactCategory::Generic, 0.9, "t1"),
                Candidate::fact("I really like green tea", FactCategory::Preference, 0.9, "t1"),
            ],
        );
        let stats = c.memory_stats().unwrap();
        assert_eq!(stats.facts, 2);
        assert_eq!(stats.relations, 1);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.needs_reconciliation, 2);
    }
}
