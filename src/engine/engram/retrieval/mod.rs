// ── Engram: Retrieval Strategy Engine ──────────────────────────────────────
//
// Serves ranked memories to the context-building step.
//
// Pipeline per call:
//   1. tokenize the query
//   2. run the configured strategy (strategies.rs)
//   3. zero results → re-run Keyword over the full store (fallback_used)
//   4. a store failure anywhere → score the dedup cache's advisory
//      snapshots instead and mark the result partial
//   5. apply the budget (per-type cap, max items) in rank order
//
// Reads never take the writer lock (see stores/mod.rs), so a fact written
// mid-retrieval may or may not be visible to that call.

pub mod scoring;
pub mod strategies;

use crate::atoms::engram_types::{
    ConversationContext, ResultSource, RetrievalConfig, RetrievalQuery, RetrievalResult,
    ScoredMemory, StrategyKind, TypeWeights,
};
use crate::atoms::error::EngineResult;
use crate::engine::engram::dedup_cache::DedupCache;
use crate::engine::stores::{FactStore, GraphStore};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use scoring::{keyword_relevance, score_item, sort_ranked, tokenize, ScoreContext};
use std::collections::HashMap;
use strategies::StrategyInput;

/// Borrowed view of both stores for one retrieval call.
pub struct StoreView<'a> {
    pub facts: &'a dyn FactStore,
    pub graph: &'a dyn GraphStore,
}

pub struct RetrievalEngine {
    strategy: StrategyKind,
    config: RetrievalConfig,
    prioritized: TypeWeights,
}

impl RetrievalEngine {
    pub fn new(strategy: StrategyKind, config: RetrievalConfig, prioritized: TypeWeights) -> Self {
        Self { strategy, config, prioritized: prioritized.normalized() }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn retrieve(
        &self,
        query: &RetrievalQuery,
        context: &ConversationContext,
        stores: &StoreView<'_>,
        dedup: &DedupCache,
    ) -> RetrievalResult {
        self.retrieve_at(query, context, stores, dedup, Utc::now())
    }

    /// `retrieve` with an explicit clock, for deterministic ranking.
    pub fn retrieve_at(
        &self,
        query: &RetrievalQuery,
        context: &ConversationContext,
        stores: &StoreView<'_>,
        dedup: &DedupCache,
        now: DateTime<Utc>,
    ) -> RetrievalResult {
        let input = StrategyInput {
            query,
            context,
            tokens: tokenize(&query.text),
            score: ScoreContext {
                now,
                half_life_days: self.config.recency_half_life_days,
                recency_floor: self.config.recency_floor,
            },
            pool: self.config.candidate_pool.max(1),
            enhanced_min_graph_results: self.config.enhanced_min_graph_results,
            prioritized: self.prioritized,
        };

        let (ranked, fallback_used) = match self.ranked(&input, stores) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    "[engram::retrieval] Store unavailable during {} retrieval, serving cache only: {}",
                    self.strategy, e
                );
                let degraded = degraded_results(&input, dedup);
                return RetrievalResult::new(self.apply_budget(query, degraded), self.strategy, false, true);
            }
        };

        let items = self.apply_budget(query, ranked);
        debug!(
            "[engram::retrieval] {} → {} result(s){}",
            self.strategy,
            items.len(),
            if fallback_used { " (keyword fallback)" } else { "" }
        );
        RetrievalResult::new(items, self.strategy, fallback_used, false)
    }

    /// Primary strategy, then the keyword fallback when it came back empty.
    fn ranked(&self, input: &StrategyInput<'_>, stores: &StoreView<'_>) -> EngineResult<(Vec<ScoredMemory>, bool)> {
        let primary = strategies::run(self.strategy, input, stores)?;
        if !primary.is_empty() || self.strategy == StrategyKind::Keyword {
            return Ok((primary, false));
        }

        let mut fallback =
            strategies::keyword_search(input, stores, true, Some(ResultSource::KeywordFallback))?;
        sort_ranked(&mut fallback);
        let used = !fallback.is_empty();
        Ok((fallback, used))
    }

    /// Truncate to `max_items`, honoring `per_type_cap`, in rank order.
    fn apply_budget(&self, query: &RetrievalQuery, ranked: Vec<ScoredMemory>) -> Vec<ScoredMemory> {
        let max_items = match query.budget.max_items {
            0 => self.config.default_max_items,
            n => n,
        };
        let mut per_type: HashMap<_, usize> = HashMap::new();
        let mut out = Vec::with_capacity(max_items.min(ranked.len()));
        for s in ranked {
            if out.len() >= max_items {
                break;
            }
            if !query.accepts(s.item.memory_type) {
                continue;
            }
            let count = per_type.entry(s.item.memory_type).or_insert(0);
            if query.budget.per_type_cap.is_some_and(|cap| *count >= cap) {
                continue;
            }
            *count += 1;
            out.push(s);
        }
        out
    }
}

/// Keyword scoring over the advisory cache only.
fn degraded_results(input: &StrategyInput<'_>, dedup: &DedupCache) -> Vec<ScoredMemory> {
    let mut items: Vec<ScoredMemory> = dedup
        .snapshots()
        .into_iter()
        .filter(|item| input.query.accepts(item.memory_type))
        .filter_map(|item| {
            let base = keyword_relevance(&input.tokens, &item.content);
            (base > 0.0).then(|| score_item(item, base, 1.0, ResultSource::DegradedCache, &input.score))
        })
        .collect();
    sort_ranked(&mut items);
    items
}
