// ── Engram: Fact Router ────────────────────────────────────────────────────
//
// Decides where each extracted candidate is persisted:
//
//   relational score ≥ ambiguous_high   → knowledge graph
//   relational score ≤ ambiguous_low    → fact store
//   in between, with a (derivable) triple → both, confidence scaled down,
//                                           flagged needs_reconciliation
//
// Every write is one atomic insert-or-merge against the store, keyed on the
// content fingerprint; the in-process dedup tier is consulted before and
// reconciled after. Nothing here raises to the caller: invalid input, low
// confidence and store failures all end as a Discarded outcome.
//
// Single-valued predicates (lives_in, works_at, …) retire the older live
// relation for the same subject instead of keeping a contradiction.

use crate::atoms::engram_types::{
    Candidate, Destination, DiscardReason, FactCategory, MemoryItem, MemoryType, Provenance,
    RelationshipTriple, RouteOutcome, RoutingConfig,
};
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::engram::dedup_cache::DedupCache;
use crate::engine::engram::fingerprint::{
    fingerprint_content, fingerprint_triple, normalize_text, normalize_triple,
};
use crate::engine::stores::{FactStore, GraphStore, UpsertOutcome};
use log::{debug, info, warn};
use regex::Regex;

/// Fact-store half of a write, kept so a failed Both write can be undone.
struct FactWrite {
    outcome: UpsertOutcome,
    fingerprint: String,
    prior: Option<MemoryItem>,
}

/// Relational score of a triple whose predicate is not in the known vocabulary.
const UNKNOWN_PREDICATE_SCORE: f32 = 0.5;
/// Relational score of plain content that contains a relational cue.
const CUE_SCORE: f32 = 0.5;

const DERIVED_SUBJECT: &str = "user";
const PERSON_ENTITIES: &[&str] = &["user", "assistant"];
const TOPIC_PREDICATES: &[&str] = &["interested_in"];

/// Relational cues in plain content: (predicate, detector, object capture).
const CUES: &[(&str, &str, &str)] = &[
    ("likes", r"\bfavou?rite\b", r"\bfavou?rite\b.*?\b(?:is|are)\s+(?P<object>.+)"),
    (
        "likes",
        r"\b(?:likes|loves|enjoys)\b|\bi\s+(?:really\s+)?(?:like|love|enjoy)\b",
        r"\b(?:likes|loves|enjoys|like|love|enjoy)\s+(?P<object>.+)",
    ),
    ("lives_in", r"\blives?\s+in\b", r"\blives?\s+in\s+(?P<object>.+)"),
    ("works_at", r"\bworks?\s+at\b", r"\bworks?\s+at\s+(?P<object>.+)"),
    ("works_as", r"\bworks?\s+as\b", r"\bworks?\s+as\s+(?:an?\s+)?(?P<object>.+)"),
    ("friend_of", r"\bfriends?\b", r"\bfriends?\s+(?:with|named|called)\s+(?P<object>.+)"),
    ("knows", r"\bknows\b", r"\bknows\s+(?P<object>.+)"),
    ("owns", r"\b(?:owns|i\s+own)\b", r"\bown(?:s)?\s+(?:an?\s+|the\s+)?(?P<object>.+)"),
    ("interested_in", r"\binterested\s+in\b", r"\binterested\s+in\s+(?P<object>.+)"),
];

struct RelationalCue {
    predicate: &'static str,
    detect: Regex,
    derive: Regex,
}

/// Where a candidate will go, decided before any store is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub destination: Destination,
    pub relational_score: f32,
    /// Normalized triple for the graph copy, if any.
    pub triple: Option<RelationshipTriple>,
}

/// One routed candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub outcome: RouteOutcome,
    /// Older exclusive relations retired by this write.
    pub superseded: usize,
}

impl Routed {
    fn discarded(reason: DiscardReason) -> Self {
        Self { outcome: RouteOutcome::Discarded { reason }, superseded: 0 }
    }
}

/// Store handles for one routing call.
pub struct RouteTargets<'a> {
    pub facts: &'a dyn FactStore,
    pub graph: &'a dyn GraphStore,
    pub dedup: &'a DedupCache,
}

pub struct FactRouter {
    config: RoutingConfig,
    initial_effectiveness: f32,
    cues: Vec<RelationalCue>,
}

impl FactRouter {
    pub fn new(config: RoutingConfig, initial_effectiveness: f32) -> EngineResult<Self> {
        let cues = CUES
            .iter()
            .map(|(predicate, detect, derive)| {
                let compile = |p: &str| {
                    Regex::new(&format!("(?i){}", p))
                        .map_err(|e| EngineError::config(format!("relational cue '{}': {}", predicate, e)))
                };
                Ok(RelationalCue { predicate: *predicate, detect: compile(detect)?, derive: compile(derive)? })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self { config, initial_effectiveness, cues })
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    // ── Classification ─────────────────────────────────────────────────

    /// Validate and classify `candidate` without touching any store.
    pub fn plan(&self, candidate: &Candidate) -> Result<RoutePlan, DiscardReason> {
        validate(candidate)?;
        if candidate.confidence < self.config.min_confidence {
            return Err(DiscardReason::BelowThreshold);
        }

        let score = self.relational_score(candidate);
        let triple = candidate.triple.as_ref().map(normalize_triple);

        if score >= self.config.ambiguous_high {
            // Only triples reach 1.0; anything else this high has no graph shape.
            return Ok(match triple {
                Some(t) => RoutePlan { destination: Destination::KnowledgeGraph, relational_score: score, triple: Some(t) },
                None => RoutePlan { destination: Destination::FactStore, relational_score: score, triple: None },
            });
        }
        if score <= self.config.ambiguous_low {
            return Ok(RoutePlan { destination: Destination::FactStore, relational_score: score, triple: None });
        }

        match triple.or_else(|| self.derive_triple(candidate)) {
            Some(t) => Ok(RoutePlan { destination: Destination::Both, relational_score: score, triple: Some(t) }),
            None => Ok(RoutePlan { destination: Destination::FactStore, relational_score: score, triple: None }),
        }
    }

    /// How strongly `candidate` looks like a relation between two entities, in [0, 1].
    pub fn relational_score(&self, candidate: &Candidate) -> f32 {
        if candidate.category == FactCategory::ToolResult {
            return 0.0;
        }
        if let Some(triple) = &candidate.triple {
            let predicate = normalize_text(&triple.predicate).replace(' ', "_");
            return if self.config.relational_predicates.iter().any(|p| *p == predicate) {
                1.0
            } else {
                UNKNOWN_PREDICATE_SCORE
            };
        }
        if self.cues.iter().any(|c| c.detect.is_match(&candidate.content)) {
            CUE_SCORE
        } else {
            0.0
        }
    }

    /// `(user, cue predicate, remainder)` from plain content, if a cue captures an object.
    fn derive_triple(&self, candidate: &Candidate) -> Option<RelationshipTriple> {
        let content = &candidate.content;
        self.cues.iter().filter(|cue| cue.detect.is_match(content)).find_map(|cue| {
            let caps = cue.derive.captures(content)?;
            let object = normalize_text(caps.name("object")?.as_str());
            if object.is_empty() {
                return None;
            }
            Some(RelationshipTriple {
                subject: DERIVED_SUBJECT.to_string(),
                predicate: cue.predicate.to_string(),
                object,
                confidence: candidate.confidence,
                provenance: Provenance::Derived,
            })
        })
    }

    // ── Routing ────────────────────────────────────────────────────────

    /// Route one candidate to its store(s). Never fails; see `Routed`.
    pub fn route(&self, candidate: &Candidate, targets: &RouteTargets<'_>) -> Routed {
        let plan = match self.plan(candidate) {
            Ok(plan) => plan,
            Err(reason) => {
                debug!("[engram::router] Discarded ({}) turn={}", reason.code(), candidate.source_turn_id);
                return Routed::discarded(reason);
            }
        };

        match self.write(candidate, &plan, targets) {
            Ok(routed) => routed,
            Err(EngineError::InvalidCandidate(msg)) => {
                debug!("[engram::router] Rejected by store: {}", msg);
                Routed::discarded(DiscardReason::InvalidInput)
            }
            Err(e) => {
                warn!(
                    "[engram::router] Store write failed ({}), candidate discarded: {}",
                    plan.destination, e
                );
                Routed::discarded(DiscardReason::StoreUnavailable)
            }
        }
    }

    fn write(&self, candidate: &Candidate, plan: &RoutePlan, targets: &RouteTargets<'_>) -> EngineResult<Routed> {
        let both = plan.destination == Destination::Both;
        let confidence = if both {
            (candidate.confidence * self.config.ambiguity_confidence_scale).clamp(0.0, 1.0)
        } else {
            candidate.confidence
        };

        let fact = match plan.destination {
            Destination::FactStore | Destination::Both => Some(self.write_fact(candidate, confidence, both, targets)?),
            Destination::KnowledgeGraph => None,
        };

        let mut superseded = 0;
        let mut relation = None;
        if let (Some(triple), Destination::KnowledgeGraph | Destination::Both) = (&plan.triple, plan.destination) {
            let outcome = match self.write_relation(candidate, triple, confidence, both, targets) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Some(fact) = &fact {
                        self.roll_back_fact(fact, targets);
                    }
                    return Err(e);
                }
            };
            superseded = match self.supersede_older(triple, &outcome.item, targets) {
                Ok(n) => n,
                Err(e) => {
                    warn!("[engram::router] Contradiction check failed for {}: {}", outcome.item.id, e);
                    0
                }
            };
            relation = Some(outcome);
        }

        let writes: Vec<UpsertOutcome> = fact.map(|f| f.outcome).into_iter().chain(relation).collect();
        let ids: Vec<String> = writes.iter().map(|w| w.item.id.clone()).collect();
        let outcome = if writes.iter().any(|w| w.inserted) {
            info!("[engram::router] Stored {} → {} (score {:.2})", ids.join(","), plan.destination, plan.relational_score);
            RouteOutcome::Stored { ids, destination: plan.destination }
        } else {
            let usage_count = writes.iter().map(|w| w.item.usage_count).max().unwrap_or(0);
            info!("[engram::router] Merged {} → {} (uses {})", ids.join(","), plan.destination, usage_count);
            RouteOutcome::Merged { ids, destination: plan.destination, usage_count }
        };
        Ok(Routed { outcome, superseded })
    }

    fn write_fact(
        &self,
        candidate: &Candidate,
        confidence: f32,
        reconcile: bool,
        targets: &RouteTargets<'_>,
    ) -> EngineResult<FactWrite> {
        let memory_type = candidate.fact_type();
        let content = candidate.content.trim();
        let fp = fingerprint_content(memory_type, content);
        if let Some(id) = targets.dedup.peek(&fp, memory_type) {
            debug!("[engram::dedup] Hint suggests merge into {}", id);
        }
        // A reconciliation copy may have to be rolled back if its graph twin fails.
        let prior = if reconcile {
            targets.facts.get_by_fingerprint(&fp, memory_type)?
        } else {
            None
        };

        let mut item = self.new_item(memory_type, content, confidence, candidate, reconcile);
        item.category = Some(candidate.category);
        let outcome = targets.facts.insert(&item, &fp, self.config.merge_reinforcement)?;
        targets.dedup.register(&fp, &outcome.item);
        Ok(FactWrite { outcome, fingerprint: fp, prior })
    }

    /// Undo the fact-store half of a Both write whose graph half failed.
    fn roll_back_fact(&self, fact: &FactWrite, targets: &RouteTargets<'_>) {
        let id = &fact.outcome.item.id;
        targets.dedup.forget(id);
        match targets.facts.revert(&fact.outcome, fact.prior.as_ref()) {
            Ok(true) => {
                if let (false, Some(prior)) = (fact.outcome.inserted, &fact.prior) {
                    targets.dedup.register(&fact.fingerprint, prior);
                }
                debug!("[engram::router] Rolled back fact {} after graph failure", id);
            }
            Ok(false) => warn!("[engram::router] Fact {} changed concurrently, left in place", id),
            Err(e) => warn!("[engram::router] Rollback of fact {} failed: {}", id, e),
        }
    }

    fn write_relation(
        &self,
        candidate: &Candidate,
        triple: &RelationshipTriple,
        confidence: f32,
        reconcile: bool,
        targets: &RouteTargets<'_>,
    ) -> EngineResult<UpsertOutcome> {
        let fp = fingerprint_triple(triple);
        if let Some(id) = targets.dedup.peek(&fp, MemoryType::Relationship) {
            debug!("[engram::dedup] Hint suggests merge into {}", id);
        }

        targets.graph.add_entity(&triple.subject, entity_type(&triple.subject, None))?;
        targets.graph.add_entity(&triple.object, entity_type(&triple.object, Some(&triple.predicate)))?;

        let mut stored = triple.clone();
        stored.confidence = confidence;
        let mut item = self.new_item(MemoryType::Relationship, &stored.text(), confidence, candidate, reconcile);
        item.triple = Some(stored);

        let outcome = targets.graph.add_relation(&item, &fp, self.config.merge_reinforcement)?;
        targets.dedup.register(&fp, &outcome.item);
        Ok(outcome)
    }

    /// Retire live relations that contradict `current` on a single-valued predicate.
    fn supersede_older(
        &self,
        triple: &RelationshipTriple,
        current: &MemoryItem,
        targets: &RouteTargets<'_>,
    ) -> EngineResult<usize> {
        if !self.config.exclusive_predicates.iter().any(|p| *p == triple.predicate) {
            return Ok(0);
        }
        let mut retired = 0;
        for old in targets.graph.query_relations(&triple.subject, Some(&triple.predicate))? {
            let contradicts = old.id != current.id
                && old.triple.as_ref().is_some_and(|t| t.subject == triple.subject && t.object != triple.object);
            if contradicts && targets.graph.supersede(&old.id, &current.id)? {
                info!(
                    "[engram::router] Superseded {} ({} {}) by {}",
                    old.id, triple.subject, triple.predicate, current.id
                );
                targets.dedup.forget(&old.id);
                retired += 1;
            }
        }
        Ok(retired)
    }

    fn new_item(
        &self,
        memory_type: MemoryType,
        content: &str,
        confidence: f32,
        candidate: &Candidate,
        reconcile: bool,
    ) -> MemoryItem {
        let mut item = MemoryItem::new(memory_type, content, confidence, &candidate.source_turn_id);
        item.effectiveness = self.initial_effectiveness;
        item.needs_reconciliation = reconcile;
        item
    }
}

/// Reject malformed candidates before any routing decision.
fn validate(candidate: &Candidate) -> Result<(), DiscardReason> {
    if candidate.content.trim().is_empty() {
        return Err(DiscardReason::InvalidInput);
    }
    if !candidate.confidence.is_finite() || !(0.0..=1.0).contains(&candidate.confidence) {
        return Err(DiscardReason::InvalidInput);
    }
    if let Some(t) = &candidate.triple {
        let parts = [&t.subject, &t.predicate, &t.object];
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(DiscardReason::InvalidInput);
        }
    }
    Ok(())
}

fn entity_type(name: &str, predicate: Option<&str>) -> &'static str {
    if PERSON_ENTITIES.contains(&name) {
        "person"
    } else if predicate.is_some_and(|p| TOPIC_PREDICATES.contains(&p)) {
        "topic"
    } else {
        "entity"
    }
}
