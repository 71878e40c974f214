// ── Engram Atoms: Constants ────────────────────────────────────────────────
// Default values for every tunable in `MemoryConfig`. The engine itself
// never reads these directly. They only seed `Default` impls, so a
// deployment can override any of them from configuration.

// ── Routing ────────────────────────────────────────────────────────────────
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_AMBIGUOUS_LOW: f32 = 0.35;
pub const DEFAULT_AMBIGUOUS_HIGH: f32 = 0.65;
pub const DEFAULT_AMBIGUITY_CONFIDENCE_SCALE: f32 = 0.8;
/// Added on top of the weighted average when a duplicate is merged.
pub const DEFAULT_MERGE_REINFORCEMENT: f32 = 0.05;

/// Predicates that always denote a relation between two entities.
pub const DEFAULT_RELATIONAL_PREDICATES: &[&str] = &[
    "likes",
    "dislikes",
    "prefers",
    "knows",
    "friend_of",
    "works_at",
    "works_as",
    "lives_in",
    "owns",
    "has",
    "interested_in",
    "satisfied_with",
    "dissatisfied_with",
];

/// Single-valued predicates: a new object supersedes the old one.
pub const DEFAULT_EXCLUSIVE_PREDICATES: &[&str] = &["lives_in", "works_at", "works_as"];

// ── Dedup ──────────────────────────────────────────────────────────────────
pub const DEFAULT_DEDUP_CACHE_SIZE: usize = 1024;

// ── Implicit relations ─────────────────────────────────────────────────────
pub const DEFAULT_IMPLICIT_CONFIDENCE: f32 = 0.6;

// ── Retrieval ──────────────────────────────────────────────────────────────
pub const DEFAULT_STRATEGY: &str = "keyword";
pub const DEFAULT_MAX_ITEMS: usize = 10;
/// Upper bound on candidates pulled from each store per query.
pub const DEFAULT_CANDIDATE_POOL: usize = 200;
pub const DEFAULT_RECENCY_HALF_LIFE_DAYS: f64 = 30.0;
pub const DEFAULT_RECENCY_FLOOR: f64 = 0.1;
pub const DEFAULT_ENHANCED_MIN_GRAPH_RESULTS: usize = 3;

/// Static per-type weights for the prioritized strategy.
pub const DEFAULT_TYPE_WEIGHTS: &[(&str, f32)] = &[
    ("episodic", 0.3),
    ("semantic_fact", 0.4),
    ("skill", 0.2),
    ("relationship", 0.1),
];

// ── Effectiveness ──────────────────────────────────────────────────────────
pub const DEFAULT_INITIAL_EFFECTIVENESS: f32 = 0.5;
pub const DEFAULT_EMA_ALPHA: f32 = 0.3;
pub const DEFAULT_DECAY_RATE: f32 = 0.1;
pub const DEFAULT_DECAY_FLOOR: f32 = 0.1;
pub const DEFAULT_DECAY_INTERVAL_SECS: u64 = 7 * 24 * 3600; // 1 week

// ── Store ──────────────────────────────────────────────────────────────────
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_DB_FILE: &str = "memory.db";
pub const APP_DIR_NAME: &str = "engram-recall";

/// Timestamp format for persisted times: RFC 3339, UTC, millisecond precision.
/// Lexicographic order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
