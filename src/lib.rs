// Engram Recall: memory coordination & retrieval engine for conversational agents.
//
// Routes extracted facts to a knowledge graph and/or a flat fact store with
// atomic deduplication, mines implicit relations from conversation turns,
// serves ranked memories through configurable retrieval strategies, and
// folds post-hoc usefulness feedback back into ranking.
//
// Layering:
//   atoms/   pure data: types, errors, defaults
//   engine/  business logic, store collaborators, configuration

pub mod atoms;
pub mod engine;

pub use atoms::engram_types::{
    Candidate, ConversationContext, DecayReport, Destination, DiscardReason, EffectivenessRecord,
    FactCategory, Feedback, MemoryConfig, MemoryItem, MemoryStats, MemoryType, Provenance,
    RelationshipTriple, RetrievalQuery, RetrievalResult, RouteOutcome, ScoredMemory,
    StorageReport, StrategyKind, TurnContext, ValidatedConfig,
};
pub use atoms::error::{EngineError, EngineResult};
pub use engine::engram::{context_lines, MemoryCoordinator};
pub use engine::stores::{FactStore, GraphStore, MemoryRecords, SqliteStore};
