// ── Engram Atoms: Memory Coordination Types ────────────────────────────────
//
// Type definitions for the memory coordination & retrieval engine.
// These are pure data types (no DB access, no I/O). Behaviour that needs a
// store lives in engine/; only small constructors and conversions live here.

use crate::atoms::constants::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Memory Items
// ═══════════════════════════════════════════════════════════════════════════

/// Which kind of memory an item is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Episodic,
    SemanticFact,
    Skill,
    Relationship,
}

impl MemoryType {
    pub const ALL: [MemoryType; 4] = [
        MemoryType::Episodic,
        MemoryType::SemanticFact,
        MemoryType::Skill,
        MemoryType::Relationship,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Episodic => "episodic",
            MemoryType::SemanticFact => "semantic_fact",
            MemoryType::Skill => "skill",
            MemoryType::Relationship => "relationship",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "episodic" => Ok(MemoryType::Episodic),
            "semantic_fact" | "semantic-fact" | "semantic" | "fact" => Ok(MemoryType::SemanticFact),
            "skill" | "skills" => Ok(MemoryType::Skill),
            "relationship" | "relation" | "kg" => Ok(MemoryType::Relationship),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// Category of a standalone fact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    PersonalInfo,
    Preference,
    Capability,
    ToolResult,
    #[default]
    Generic,
}

impl FactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactCategory::PersonalInfo => "personal_info",
            FactCategory::Preference => "preference",
            FactCategory::Capability => "capability",
            FactCategory::ToolResult => "tool_result",
            FactCategory::Generic => "generic",
        }
    }
}

impl std::fmt::Display for FactCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FactCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal_info" => Ok(FactCategory::PersonalInfo),
            "preference" => Ok(FactCategory::Preference),
            "capability" => Ok(FactCategory::Capability),
            "tool_result" => Ok(FactCategory::ToolResult),
            "generic" => Ok(FactCategory::Generic),
            _ => Err(format!("Unknown fact category: {}", s)),
        }
    }
}

/// Where a relationship triple came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by an upstream (LLM or rule) extractor.
    #[default]
    Explicit,
    /// Produced by the implicit relation extractor.
    Implicit { pattern: String },
    /// Derived by the router from a relational cue in a plain fact.
    Derived,
}

/// A (subject, predicate, object) relation, always persisted through the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    #[serde(default)]
    pub provenance: Provenance,
}

impl RelationshipTriple {
    pub fn new(subject: &str, predicate: &str, object: &str, confidence: f32) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            confidence,
            provenance: Provenance::Explicit,
        }
    }

    /// A triple emitted by a named implicit pattern.
    pub fn implicit(subject: &str, predicate: &str, object: &str, confidence: f32, pattern: &str) -> Self {
        Self {
            provenance: Provenance::Implicit { pattern: pattern.to_string() },
            ..Self::new(subject, predicate, object, confidence)
        }
    }

    /// Searchable text form, e.g. `user interested in machine learning`.
    pub fn text(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate.replace('_', " "), self.object)
    }
}

/// A persisted unit of remembered content.
///
/// Owned by whichever store persists it; the engine only ever holds copies
/// it re-reads from the store (or advisory snapshots in the dedup hint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryItem {
    pub id: String,
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FactCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triple: Option<RelationshipTriple>,
    /// Extraction-time certainty, refined only by dedup merges.
    pub confidence: f32,
    /// Feedback-driven usefulness, set only by the effectiveness tracker.
    pub effectiveness: f32,
    pub usage_count: u32,
    pub positive_feedback_count: u32,
    pub created_at: DateTime<Utc>,
    /// Monotonically non-decreasing.
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveness_decayed_at: Option<DateTime<Utc>>,
    pub source_turn_id: String,
    /// Stored under the ambiguous-routing policy; reconcile later.
    #[serde(default)]
    pub needs_reconciliation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    /// Store-assigned insertion sequence (0 until persisted).
    #[serde(default)]
    pub seq: i64,
}

impl MemoryItem {
    pub fn new(memory_type: MemoryType, content: &str, confidence: f32, source_turn_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            memory_type,
            content: content.to_string(),
            category: None,
            triple: None,
            confidence,
            effectiveness: DEFAULT_INITIAL_EFFECTIVENESS,
            usage_count: 1,
            positive_feedback_count: 0,
            created_at: now,
            last_accessed_at: now,
            effectiveness_decayed_at: None,
            source_turn_id: source_turn_id.to_string(),
            needs_reconciliation: false,
            superseded_by: None,
            seq: 0,
        }
    }

    /// Refresh `last_accessed_at` without ever moving it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_accessed_at {
            self.last_accessed_at = at;
        }
    }

    /// Superseded relations stay persisted but are no longer served.
    pub fn is_live(&self) -> bool {
        self.superseded_by.is_none()
    }

    pub fn effectiveness_record(&self) -> EffectivenessRecord {
        EffectivenessRecord {
            memory_item_id: self.id.clone(),
            usage_count: self.usage_count,
            positive_feedback_count: self.positive_feedback_count,
            score: self.effectiveness,
        }
    }
}

/// Feedback-tracking view of a memory item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectivenessRecord {
    pub memory_item_id: String,
    pub usage_count: u32,
    pub positive_feedback_count: u32,
    pub score: f32,
}

/// Post-hoc usage signal for a retrieved memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Helpful,
    NotHelpful,
    Unknown,
}

impl Feedback {
    /// EMA target, or `None` when the score must not move.
    pub fn signal(&self) -> Option<f32> {
        match self {
            Feedback::Helpful => Some(1.0),
            Feedback::NotHelpful => Some(0.0),
            Feedback::Unknown => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Routing
// ═══════════════════════════════════════════════════════════════════════════

/// A candidate fact or relation produced by an extractor.
/// The router accepts this shape regardless of which extractor produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub content: String,
    #[serde(default)]
    pub category: FactCategory,
    pub confidence: f32,
    pub source_turn_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triple: Option<RelationshipTriple>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
}

impl Candidate {
    /// A standalone statement.
    pub fn fact(content: &str, category: FactCategory, confidence: f32, source_turn_id: &str) -> Self {
        Self {
            content: content.to_string(),
            category,
            confidence,
            source_turn_id: source_turn_id.to_string(),
            triple: None,
            memory_type: None,
        }
    }

    /// A (subject, predicate, object) candidate.
    pub fn relation(triple: RelationshipTriple, source_turn_id: &str) -> Self {
        Self {
            content: triple.text(),
            category: FactCategory::Generic,
            confidence: triple.confidence,
            source_turn_id: source_turn_id.to_string(),
            triple: Some(triple),
            memory_type: None,
        }
    }

    pub fn with_memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    /// Memory type used for the fact-store copy.
    pub fn fact_type(&self) -> MemoryType {
        match self.memory_type {
            Some(MemoryType::Relationship) | None => MemoryType::SemanticFact,
            Some(t) => t,
        }
    }
}

/// The conversation turn being stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnContext {
    pub turn_id: String,
    /// The user's utterance for this turn.
    pub utterance: String,
    /// The preceding user turn, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_turn: Option<String>,
}

impl TurnContext {
    pub fn new(turn_id: &str, utterance: &str) -> Self {
        Self {
            turn_id: turn_id.to_string(),
            utterance: utterance.to_string(),
            prior_turn: None,
        }
    }

    pub fn with_prior_turn(mut self, prior: &str) -> Self {
        self.prior_turn = Some(prior.to_string());
        self
    }
}

/// Which store(s) a candidate was routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    KnowledgeGraph,
    FactStore,
    Both,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::KnowledgeGraph => write!(f, "knowledge_graph"),
            Destination::FactStore => write!(f, "fact_store"),
            Destination::Both => write!(f, "both"),
        }
    }
}

/// Why a candidate never reached a store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    BelowThreshold,
    InvalidInput,
    StoreUnavailable,
}

impl DiscardReason {
    pub fn code(&self) -> &'static str {
        match self {
            DiscardReason::BelowThreshold => "below_threshold",
            DiscardReason::InvalidInput => "invalid_input",
            DiscardReason::StoreUnavailable => "store_unavailable",
        }
    }
}

/// Terminal state of one routed candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// At least one new row was inserted.
    Stored { ids: Vec<String>, destination: Destination },
    /// Every write hit an existing fingerprint and was merged in place.
    Merged { ids: Vec<String>, destination: Destination, usage_count: u32 },
    Discarded { reason: DiscardReason },
}

/// Per-turn summary of routing outcomes. Observability only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageReport {
    pub stored: usize,
    pub merged: usize,
    pub discarded: usize,
    /// Older exclusive relations retired by a newer object.
    pub superseded: usize,
    pub discard_reasons: BTreeMap<DiscardReason, usize>,
    pub outcomes: Vec<RouteOutcome>,
}

impl StorageReport {
    pub fn record(&mut self, outcome: RouteOutcome) {
        match &outcome {
            RouteOutcome::Stored { .. } => self.stored += 1,
            RouteOutcome::Merged { .. } => self.merged += 1,
            RouteOutcome::Discarded { reason } => {
                self.discarded += 1;
                *self.discard_reasons.entry(*reason).or_default() += 1;
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.stored + self.merged + self.discarded
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Retrieval
// ═══════════════════════════════════════════════════════════════════════════

/// The closed set of retrieval policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Lexical token overlap; never needs the vectorizer.
    Keyword,
    /// Keyword plus graph entity lookup, graph results first.
    Default,
    /// Graph first, fact store only below a count threshold.
    Enhanced,
    /// Per-call type weights from context signals.
    Adaptive,
    /// Static per-type weight table.
    Prioritized,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Keyword,
        StrategyKind::Default,
        StrategyKind::Enhanced,
        StrategyKind::Adaptive,
        StrategyKind::Prioritized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Keyword => "keyword",
            StrategyKind::Default => "default",
            StrategyKind::Enhanced => "enhanced",
            StrategyKind::Adaptive => "adaptive",
            StrategyKind::Prioritized => "prioritized",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown retrieval strategy: {}", s))
    }
}

/// Multiplicative score factor per memory type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TypeWeights {
    pub episodic: f32,
    pub semantic_fact: f32,
    pub skill: f32,
    pub relationship: f32,
}

impl TypeWeights {
    /// All types weighted equally.
    pub fn uniform() -> Self {
        Self { episodic: 1.0, semantic_fact: 1.0, skill: 1.0, relationship: 1.0 }
    }

    pub fn get(&self, t: MemoryType) -> f32 {
        match t {
            MemoryType::Episodic => self.episodic,
            MemoryType::SemanticFact => self.semantic_fact,
            MemoryType::Skill => self.skill,
            MemoryType::Relationship => self.relationship,
        }
    }

    pub fn set(&mut self, t: MemoryType, w: f32) {
        match t {
            MemoryType::Episodic => self.episodic = w,
            MemoryType::SemanticFact => self.semantic_fact = w,
            MemoryType::Skill => self.skill = w,
            MemoryType::Relationship => self.relationship = w,
        }
    }

    /// Scale so the heaviest type weighs exactly 1.0.
    pub fn normalized(&self) -> Self {
        let max = MemoryType::ALL.iter().map(|t| self.get(*t)).fold(0.0_f32, f32::max);
        if max <= 0.0 {
            return Self::uniform();
        }
        let mut out = *self;
        for t in MemoryType::ALL {
            out.set(t, self.get(t) / max);
        }
        out
    }
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Coarse query profile used by the adaptive strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryProfile {
    /// About the user: "what's my favorite color"
    Personal,
    /// About the world: "what is a monad"
    Factual,
    /// Small talk: "hi", "thanks"
    Conversational,
    General,
}

impl QueryProfile {
    /// Relative per-type emphasis for this profile (un-normalized).
    pub fn type_weights(&self) -> TypeWeights {
        match self {
            QueryProfile::Personal => TypeWeights { episodic: 5.0, semantic_fact: 4.0, skill: 1.0, relationship: 5.0 },
            QueryProfile::Factual => TypeWeights { episodic: 1.0, semantic_fact: 5.0, skill: 3.0, relationship: 2.0 },
            QueryProfile::Conversational => TypeWeights { episodic: 4.0, semantic_fact: 1.0, skill: 1.0, relationship: 1.0 },
            QueryProfile::General => TypeWeights { episodic: 3.0, semantic_fact: 2.0, skill: 2.0, relationship: 3.0 },
        }
    }
}

/// Per-profile confidence scores (sum ≈ 1.0).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QueryClassification {
    pub personal: f32,
    pub factual: f32,
    pub conversational: f32,
    pub general: f32,
}

impl QueryClassification {
    /// Highest-scoring profile; ties resolve in declaration order.
    pub fn dominant(&self) -> QueryProfile {
        let candidates = [
            (QueryProfile::Personal, self.personal),
            (QueryProfile::Factual, self.factual),
            (QueryProfile::Conversational, self.conversational),
            (QueryProfile::General, self.general),
        ];
        let mut best = candidates[0];
        for c in &candidates[1..] {
            if c.1 > best.1 {
                best = *c;
            }
        }
        best.0
    }

    /// Score-weighted blend of every profile's type weights.
    pub fn blended_weights(&self) -> TypeWeights {
        let mut out = TypeWeights { episodic: 0.0, semantic_fact: 0.0, skill: 0.0, relationship: 0.0 };
        for (profile, score) in [
            (QueryProfile::Personal, self.personal),
            (QueryProfile::Factual, self.factual),
            (QueryProfile::Conversational, self.conversational),
            (QueryProfile::General, self.general),
        ] {
            let w = profile.type_weights();
            for t in MemoryType::ALL {
                out.set(t, out.get(t) + score * w.get(t));
            }
        }
        out
    }
}

/// How much a retrieval may return.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RetrievalBudget {
    /// 0 means "use the configured default".
    pub max_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_type_cap: Option<usize>,
}

/// A read request from the context-building step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub text: String,
    /// Recent conversation lines (most recent last).
    #[serde(default)]
    pub context_window: Vec<String>,
    /// Requested memory types; empty means all.
    #[serde(default)]
    pub memory_types: Vec<MemoryType>,
    #[serde(default)]
    pub budget: RetrievalBudget,
}

impl RetrievalQuery {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string(), ..Default::default() }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.budget.max_items = max_items;
        self
    }

    pub fn with_per_type_cap(mut self, cap: usize) -> Self {
        self.budget.per_type_cap = Some(cap);
        self
    }

    pub fn with_types(mut self, types: &[MemoryType]) -> Self {
        self.memory_types = types.to_vec();
        self
    }

    pub fn with_context_window(mut self, lines: Vec<String>) -> Self {
        self.context_window = lines;
        self
    }

    pub fn accepts(&self, t: MemoryType) -> bool {
        self.memory_types.is_empty() || self.memory_types.contains(&t)
    }
}

/// Conversation-level signals available to the adaptive strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub turn_count: usize,
    #[serde(default)]
    pub recent_topics: Vec<String>,
}

/// Which path produced a scored result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Graph,
    FactStore,
    KeywordFallback,
    DegradedCache,
}

/// The factors behind a result's rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub base_relevance: f64,
    pub recency: f64,
    pub effectiveness: f64,
    pub type_weight: f64,
    /// base_relevance × recency × effectiveness × type_weight
    pub composite: f64,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMemory {
    pub item: MemoryItem,
    pub score: ScoreBreakdown,
}

/// Ranked retrieval output. Consumed by iteration; not restartable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    memories: Vec<ScoredMemory>,
    pub strategy: StrategyKind,
    /// The primary source was empty and Keyword was re-run over the full store.
    pub fallback_used: bool,
    /// A store was unavailable; results come from the advisory cache only.
    pub partial: bool,
}

impl RetrievalResult {
    pub fn new(memories: Vec<ScoredMemory>, strategy: StrategyKind, fallback_used: bool, partial: bool) -> Self {
        Self { memories, strategy, fallback_used, partial }
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Borrowed view, for rendering and assertions.
    pub fn memories(&self) -> &[ScoredMemory] {
        &self.memories
    }

    pub fn ids(&self) -> Vec<String> {
        self.memories.iter().map(|m| m.item.id.clone()).collect()
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredMemory;
    type IntoIter = std::vec::IntoIter<ScoredMemory>;

    fn into_iter(self) -> Self::IntoIter {
        self.memories.into_iter()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Maintenance & Stats
// ═══════════════════════════════════════════════════════════════════════════

/// Result of one effectiveness decay pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecayReport {
    pub examined: usize,
    pub decayed: usize,
}

/// Summary counts across both stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryStats {
    pub facts: usize,
    pub relations: usize,
    pub entities: usize,
    pub needs_reconciliation: usize,
    pub superseded: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 5: Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level engine configuration. Every field has a documented default;
/// nothing in the engine hardcodes these values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Active retrieval strategy name (keyword, default, enhanced, adaptive, prioritized).
    pub strategy: String,
    pub routing: RoutingConfig,
    pub dedup: DedupConfig,
    pub implicit: ImplicitConfig,
    pub retrieval: RetrievalConfig,
    pub effectiveness: EffectivenessConfig,
    pub store: StoreConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            strategy: DEFAULT_STRATEGY.into(),
            routing: RoutingConfig::default(),
            dedup: DedupConfig::default(),
            implicit: ImplicitConfig::default(),
            retrieval: RetrievalConfig::default(),
            effectiveness: EffectivenessConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Candidates below this confidence are discarded.
    pub min_confidence: f32,
    /// Relational scores at or below this go to the fact store.
    pub ambiguous_low: f32,
    /// Relational scores at or above this go to the graph.
    pub ambiguous_high: f32,
    /// Confidence multiplier for Both-destination writes.
    pub ambiguity_confidence_scale: f32,
    /// Bonus added to the weighted average on a dedup merge.
    pub merge_reinforcement: f32,
    pub relational_predicates: Vec<String>,
    pub exclusive_predicates: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            ambiguous_low: DEFAULT_AMBIGUOUS_LOW,
            ambiguous_high: DEFAULT_AMBIGUOUS_HIGH,
            ambiguity_confidence_scale: DEFAULT_AMBIGUITY_CONFIDENCE_SCALE,
            merge_reinforcement: DEFAULT_MERGE_REINFORCEMENT,
            relational_predicates: DEFAULT_RELATIONAL_PREDICATES.iter().map(|s| s.to_string()).collect(),
            exclusive_predicates: DEFAULT_EXCLUSIVE_PREDICATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
    /// Capacity of the in-process advisory tier.
    pub cache_size: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { cache_size: DEFAULT_DEDUP_CACHE_SIZE }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImplicitConfig {
    pub enabled: bool,
    /// Fixed confidence for every implicit triple.
    pub confidence: f32,
}

impl Default for ImplicitConfig {
    fn default() -> Self {
        Self { enabled: true, confidence: DEFAULT_IMPLICIT_CONFIDENCE }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_max_items: usize,
    pub candidate_pool: usize,
    pub recency_half_life_days: f64,
    pub recency_floor: f64,
    pub enhanced_min_graph_results: usize,
    /// Raw weight table keyed by memory type name; validated at startup.
    pub type_weights: BTreeMap<String, f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_max_items: DEFAULT_MAX_ITEMS,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            recency_half_life_days: DEFAULT_RECENCY_HALF_LIFE_DAYS,
            recency_floor: DEFAULT_RECENCY_FLOOR,
            enhanced_min_graph_results: DEFAULT_ENHANCED_MIN_GRAPH_RESULTS,
            type_weights: DEFAULT_TYPE_WEIGHTS.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EffectivenessConfig {
    pub initial_score: f32,
    /// Weight of the newest feedback signal in the moving average.
    pub ema_alpha: f32,
    /// Fraction of the distance to the floor lost per idle interval.
    pub decay_rate: f32,
    pub decay_floor: f32,
    pub decay_interval_secs: u64,
}

impl Default for EffectivenessConfig {
    fn default() -> Self {
        Self {
            initial_score: DEFAULT_INITIAL_EFFECTIVENESS,
            ema_alpha: DEFAULT_EMA_ALPHA,
            decay_rate: DEFAULT_DECAY_RATE,
            decay_floor: DEFAULT_DECAY_FLOOR,
            decay_interval_secs: DEFAULT_DECAY_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `None` means the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Per-call timeout against the store. Expiry counts as StoreUnavailable.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: None, timeout_ms: DEFAULT_STORE_TIMEOUT_MS }
    }
}

/// A configuration that passed startup validation.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub raw: MemoryConfig,
    pub strategy: StrategyKind,
    /// Normalized prioritized-strategy weights.
    pub type_weights: TypeWeights,
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
