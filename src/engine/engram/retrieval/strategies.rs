// ── Engram: Retrieval Strategies ───────────────────────────────────────────
//
// The closed set of retrieval policies. Each is a pure function of
// (input, store view) → ranked candidates; none keeps state between calls.
// Dispatch is a `match` on `StrategyKind`, so a configured name maps to
// exactly one policy and adding one is a compile-checked change.
//
//   Keyword      lexical overlap over both stores
//   Default      graph entity hits first, then keyword hits (merged by id)
//   Enhanced     graph first; fact store only when the graph is thin
//   Adaptive     per-call type weights from query profile + context
//   Prioritized  static per-type weight table

use super::scoring::{keyword_relevance, score_item, sort_ranked, tokenize, ScoreContext};
use super::StoreView;
use crate::atoms::engram_types::{
    ConversationContext, MemoryType, ResultSource, RetrievalQuery, ScoredMemory, StrategyKind,
    TypeWeights,
};
use crate::atoms::error::EngineResult;
use crate::engine::engram::intent_classifier::profile_weights;
use std::collections::HashSet;

/// Base relevance of a relation reached through a matched entity.
const ENTITY_MATCH_RELEVANCE: f64 = 0.8;
/// Multiplier on relationship weight when the query continues a recent topic.
const TOPIC_CONTINUITY_BOOST: f32 = 1.5;
/// Multiplier on episodic weight for long conversations.
const LONG_CONVERSATION_BOOST: f32 = 1.5;
const LONG_CONVERSATION_TURNS: usize = 10;

/// Everything a strategy needs besides the stores.
pub struct StrategyInput<'a> {
    pub query: &'a RetrievalQuery,
    pub context: &'a ConversationContext,
    pub tokens: Vec<String>,
    pub score: ScoreContext,
    pub pool: usize,
    pub enhanced_min_graph_results: usize,
    /// Normalized prioritized weights.
    pub prioritized: TypeWeights,
}

/// Run `kind` and return its ranked candidates (type filter applied, budget not).
pub fn run(kind: StrategyKind, input: &StrategyInput<'_>, stores: &StoreView<'_>) -> EngineResult<Vec<ScoredMemory>> {
    match kind {
        StrategyKind::Keyword => keyword_strategy(input, stores),
        StrategyKind::Default => default_strategy(input, stores),
        StrategyKind::Enhanced => enhanced_strategy(input, stores),
        StrategyKind::Adaptive => {
            let weights = adaptive_weights(input.query, input.context);
            weighted_strategy(input, stores, &weights)
        }
        StrategyKind::Prioritized => weighted_strategy(input, stores, &input.prioritized),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Strategies
// ═══════════════════════════════════════════════════════════════════════════

fn keyword_strategy(input: &StrategyInput<'_>, stores: &StoreView<'_>) -> EngineResult<Vec<ScoredMemory>> {
    let mut items = keyword_search(input, stores, true, None)?;
    sort_ranked(&mut items);
    Ok(items)
}

fn default_strategy(input: &StrategyInput<'_>, stores: &StoreView<'_>) -> EngineResult<Vec<ScoredMemory>> {
    let mut graph = graph_search(input, stores)?;
    sort_ranked(&mut graph);
    let seen: HashSet<String> = graph.iter().map(|s| s.item.id.clone()).collect();

    let mut keyword: Vec<ScoredMemory> = keyword_search(input, stores, true, None)?
        .into_iter()
        .filter(|s| !seen.contains(&s.item.id))
        .collect();
    sort_ranked(&mut keyword);

    graph.extend(keyword);
    Ok(graph)
}

fn enhanced_strategy(input: &StrategyInput<'_>, stores: &StoreView<'_>) -> EngineResult<Vec<ScoredMemory>> {
    let mut graph = graph_search(input, stores)?;
    sort_ranked(&mut graph);
    if graph.len() >= input.enhanced_min_graph_results {
        return Ok(graph);
    }

    let mut facts = keyword_search(input, stores, false, None)?;
    sort_ranked(&mut facts);
    graph.extend(facts);
    Ok(graph)
}

fn weighted_strategy(
    input: &StrategyInput<'_>,
    stores: &StoreView<'_>,
    weights: &TypeWeights,
) -> EngineResult<Vec<ScoredMemory>> {
    let mut merged = graph_search(input, stores)?;
    let seen: HashSet<String> = merged.iter().map(|s| s.item.id.clone()).collect();
    merged.extend(
        keyword_search(input, stores, true, None)?
            .into_iter()
            .filter(|s| !seen.contains(&s.item.id)),
    );

    for s in merged.iter_mut() {
        let w = weights.get(s.item.memory_type) as f64;
        s.score.type_weight = w;
        s.score.composite = s.score.base_relevance * s.score.recency * s.score.effectiveness * w;
    }
    sort_ranked(&mut merged);
    Ok(merged)
}

/// Per-call weights: query profile blended with conversation signals,
/// normalized so the heaviest type weighs 1.0.
pub fn adaptive_weights(query: &RetrievalQuery, context: &ConversationContext) -> TypeWeights {
    let mut weights = profile_weights(&query.text);

    let query_tokens: HashSet<String> = tokenize(&query.text).into_iter().collect();
    let topic_text = context
        .recent_topics
        .iter()
        .chain(query.context_window.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let continues_topic = tokenize(&topic_text).iter().any(|t| query_tokens.contains(t));
    if continues_topic {
        weights.relationship *= TOPIC_CONTINUITY_BOOST;
    }
    if context.turn_count >= LONG_CONVERSATION_TURNS {
        weights.episodic *= LONG_CONVERSATION_BOOST;
    }
    weights.normalized()
}

// ═══════════════════════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════════════════════

/// Keyword overlap over the fact store and, when `include_graph`, the graph.
/// Items with zero overlap are not results.
pub(crate) fn keyword_search(
    input: &StrategyInput<'_>,
    stores: &StoreView<'_>,
    include_graph: bool,
    source_override: Option<ResultSource>,
) -> EngineResult<Vec<ScoredMemory>> {
    if input.tokens.is_empty() {
        return Ok(Vec::new());
    }
    let text = input.tokens.join(" ");
    let types = &input.query.memory_types;

    let mut raw = Vec::new();
    for item in stores.facts.query(&text, types, input.pool)? {
        raw.push((item, source_override.unwrap_or(ResultSource::FactStore)));
    }
    if include_graph && input.query.accepts(MemoryType::Relationship) {
        for item in stores.graph.query(&text, types, input.pool)? {
            raw.push((item, source_override.unwrap_or(ResultSource::Graph)));
        }
    }

    let mut seen = HashSet::new();
    let scored = raw
        .into_iter()
        .filter(|(item, _)| input.query.accepts(item.memory_type) && seen.insert(item.id.clone()))
        .filter_map(|(item, source)| {
            let base = keyword_relevance(&input.tokens, &item.content);
            (base > 0.0).then(|| score_item(item, base, 1.0, source, &input.score))
        })
        .collect();
    Ok(scored)
}

/// Relations touching any entity named in the query.
fn graph_search(input: &StrategyInput<'_>, stores: &StoreView<'_>) -> EngineResult<Vec<ScoredMemory>> {
    if !input.query.accepts(MemoryType::Relationship) {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for entity in stores.graph.search_entities(&input.query.text)? {
        for item in stores.graph.query_relations(&entity, None)? {
            if out.len() >= input.pool {
                return Ok(out);
            }
            if !input.query.accepts(item.memory_type) || !seen.insert(item.id.clone()) {
                continue;
            }
            let base = keyword_relevance(&input.tokens, &item.content).max(ENTITY_MATCH_RELEVANCE);
            out.push(score_item(item, base, 1.0, ResultSource::Graph, &input.score));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_conversation_boosts_episodic() {
        let q = RetrievalQuery::new("asdf qwerty");
        let short = adaptive_weights(&q, &ConversationContext { turn_count: 2, recent_topics: vec![] });
        let long = adaptive_weights(&q, &ConversationContext { turn_count: 12, recent_topics: vec![] });
        assert!(long.episodic > long.semantic_fact, "got {long:?}");
        assert!(long.episodic >= short.episodic);
    }

    #[test]
    fn test_topic_continuity_boosts_relationships() {
        let q = RetrievalQuery::new("more on rust lifetimes");
        let cold = adaptive_weights(&q, &ConversationContext::default());
        let warm = adaptive_weights(
            &q,
            &ConversationContext { turn_count: 1, recent_topics: vec!["rust".into()] },
        );
        let ratio = |w: &TypeWeights| w.relationship / w.episodic;
        assert!(ratio(&warm) > ratio(&cold), "cold {cold:?} warm {warm:?}");
    }

    #[test]
    fn test_adaptive_weights_normalized() {
        let w = adaptive_weights(&RetrievalQuery::new("what is my favorite food"), &ConversationContext::default());
        let max = MemoryType::ALL.iter().map(|t| w.get(*t)).fold(0.0_f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
    }
}
