// ── Engram: Memory Coordination Module ─────────────────────────────────────
//
// Decides what gets remembered, where it is stored, and how it is recalled.
//
// Architecture:
//   candidates → Fact Router → {Knowledge Graph, Fact Store}   (write path)
//   query      → Retrieval Strategy Engine → ranked memories   (read path)
//   feedback   → Effectiveness Tracker → ranking multiplier    (feedback loop)
//
// Sub-modules:
//   - fingerprint: Normalisation + SHA-256 content identity
//   - dedup_cache: Advisory LRU tier over the persisted uniqueness constraint
//   - router: Graph / fact store / both routing, contradiction guard
//   - implicit_relations: Data-driven pattern table for unstated relations
//   - intent_classifier: Query profile → per-type weights (adaptive strategy)
//   - retrieval: Strategy engine, the five strategies, scoring and ordering
//   - effectiveness: Feedback EMA and idle decay
//   - context_lines: Prompt rendering of retrieval results
//   - coordinator: The façade the conversation pipeline calls

pub mod context_lines;
pub mod coordinator;
pub mod dedup_cache;
pub mod effectiveness;
pub mod fingerprint;
pub mod implicit_relations;
pub mod intent_classifier;
pub mod retrieval;
pub mod router;

// Re-exports for convenience
pub use context_lines::context_lines;
pub use coordinator::MemoryCoordinator;
pub use dedup_cache::DedupCache;
pub use effectiveness::{decayed_score, EffectivenessTracker};
pub use fingerprint::{fingerprint_content, fingerprint_triple, normalize_text};
pub use implicit_relations::{default_rules, ImplicitRelationExtractor, PatternRule, PatternSource, Template};
pub use intent_classifier::{classify_query, profile_weights};
pub use retrieval::{RetrievalEngine, StoreView};
pub use router::{FactRouter, RoutePlan, RouteTargets, Routed};
