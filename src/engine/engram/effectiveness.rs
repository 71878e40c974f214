// ── Engram: Effectiveness Tracking ─────────────────────────────────────────
//
// Post-hoc usefulness of each memory, independent of extraction confidence.
//
//   record_use   EMA of feedback (helpful = 1, not_helpful = 0, unknown = no
//                change); every call counts a use and refreshes last access
//   apply_decay  items idle for at least one interval drift toward the floor:
//                score = floor + (score − floor)·(1 − rate)^(Δ / interval)
//
// Δ runs from the later of last access and the previous decay pass, so
// repeated passes add up to exactly the continuous-time decay instead of
// compounding. Retrieval only ever reads the resulting score.

use crate::atoms::engram_types::{DecayReport, EffectivenessConfig, EffectivenessRecord, Feedback};
use crate::atoms::error::EngineResult;
use crate::engine::stores::{EmaStep, FactStore, GraphStore, ItemUpdate, MemoryRecords};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Pure decay: `floor + (score − floor)·(1 − rate)^(elapsed / interval)`.
/// Scores at or below the floor are returned unchanged.
pub fn decayed_score(score: f32, floor: f32, rate: f32, elapsed_secs: f64, interval_secs: f64) -> f32 {
    if score <= floor || elapsed_secs <= 0.0 || interval_secs <= 0.0 {
        return score;
    }
    let retained = (1.0 - rate as f64).powf(elapsed_secs / interval_secs);
    (floor as f64 + (score - floor) as f64 * retained) as f32
}

pub struct EffectivenessTracker {
    config: EffectivenessConfig,
}

impl EffectivenessTracker {
    pub fn new(config: EffectivenessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EffectivenessConfig {
        &self.config
    }

    /// Apply one feedback signal to `id`, wherever it lives.
    /// `None` when neither store knows the id.
    pub fn record_use(
        &self,
        id: &str,
        feedback: Feedback,
        facts: &dyn FactStore,
        graph: &dyn GraphStore,
    ) -> EngineResult<Option<EffectivenessRecord>> {
        self.record_use_at(id, feedback, facts, graph, Utc::now())
    }

    pub fn record_use_at(
        &self,
        id: &str,
        feedback: Feedback,
        facts: &dyn FactStore,
        graph: &dyn GraphStore,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<EffectivenessRecord>> {
        let update = ItemUpdate {
            ema_step: feedback
                .signal()
                .map(|target| EmaStep { target, alpha: self.config.ema_alpha }),
            usage_delta: 1,
            positive_feedback_delta: u32::from(feedback == Feedback::Helpful),
            accessed_at: Some(now),
            ..Default::default()
        };

        let updated = match facts.update(id, &update)? {
            Some(item) => Some(item),
            None => graph.update(id, &update)?,
        };

        match updated {
            Some(item) => {
                debug!(
                    "[engram::effectiveness] {} {:?} → score {:.3} (uses {})",
                    id, feedback, item.effectiveness, item.usage_count
                );
                Ok(Some(item.effectiveness_record()))
            }
            None => {
                debug!("[engram::effectiveness] Unknown memory id {}", id);
                Ok(None)
            }
        }
    }

    /// Decay every live item idle for at least one interval as of `now`.
    pub fn apply_decay(
        &self,
        now: DateTime<Utc>,
        facts: &dyn FactStore,
        graph: &dyn GraphStore,
    ) -> EngineResult<DecayReport> {
        let mut report = DecayReport::default();
        let interval_secs = self.config.decay_interval_secs;
        let cutoff = i64::try_from(interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|interval| now.checked_sub_signed(interval));
        let Some(cutoff) = cutoff else {
            return Ok(report);
        };

        self.decay_store(facts, now, cutoff, &mut report)?;
        self.decay_store(graph, now, cutoff, &mut report)?;

        if report.decayed > 0 {
            info!(
                "[engram::effectiveness] Decay pass: {} examined, {} decayed",
                report.examined, report.decayed
            );
        }
        Ok(report)
    }

    fn decay_store<S: MemoryRecords + ?Sized>(
        &self,
        store: &S,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        report: &mut DecayReport,
    ) -> EngineResult<()> {
        let cfg = &self.config;
        for item in store.idle_items(cutoff)? {
            report.examined += 1;
            if item.effectiveness <= cfg.decay_floor {
                continue;
            }
            let since = match item.effectiveness_decayed_at {
                Some(d) if d > item.last_accessed_at => d,
                _ => item.last_accessed_at,
            };
            let elapsed = (now - since).num_milliseconds() as f64 / 1000.0;
            let score = decayed_score(
                item.effectiveness,
                cfg.decay_floor,
                cfg.decay_rate,
                elapsed,
                cfg.decay_interval_secs as f64,
            );
            if score >= item.effectiveness {
                continue;
            }

            let update = ItemUpdate {
                effectiveness: Some(score),
                decayed_at: Some(now),
                only_if_idle_since: Some(cutoff),
                ..Default::default()
            };
            if store.update(&item.id, &update)?.is_some() {
                report.decayed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::{MemoryItem, MemoryType};
    use crate::engine::stores::SqliteStore;
    use std::sync::Arc;

    fn stores() -> (Arc<crate::engine::stores::SqliteFacts>, Arc<crate::engine::stores::SqliteGraph>) {
        let db = SqliteStore::open_in_memory().unwrap();
        (db.facts(), db.graph())
    }

    fn stored(facts: &dyn FactStore, content: &str, accessed: DateTime<Utc>) -> MemoryItem {
        let mut item = MemoryItem::new(MemoryType::SemanticFact, content, 0.9, "t1");
        item.created_at = accessed;
        item.last_accessed_at = accessed;
        item.effectiveness = 0.8;
        facts.insert(&item, content, 0.0).unwrap().item
    }

    #[test]
    fn test_decayed_score_math() {
        // One full interval at rate 0.1: 0.1 + 0.7·0.9
        let s = decayed_score(0.8, 0.1, 0.1, 100.0, 100.0);
        assert!((s - 0.73).abs() < 1e-5, "got {s}");
        assert_eq!(decayed_score(0.05, 0.1, 0.1, 100.0, 100.0), 0.05);
        assert!(decayed_score(0.8, 0.1, 0.1, 1e9, 100.0) >= 0.1);
    }

    #[test]
    fn test_helpful_feedback_moves_toward_one() {
        let (facts, graph) = stores();
        let item = stored(facts.as_ref(), "a", Utc::now());
        let t = EffectivenessTracker::new(EffectivenessConfig::default());

        let rec = t.record_use(&item.id, Feedback::Helpful, facts.as_ref(), graph.as_ref()).unwrap().unwrap();
        // 0.8 + 0.3·(1 − 0.8)
        assert!((rec.score - 0.86).abs() < 1e-4, "got {}", rec.score);
        assert_eq!(rec.positive_feedback_count, 1);
        assert_eq!(rec.usage_count, 2);

        let rec = t.record_use(&item.id, Feedback::NotHelpful, facts.as_ref(), graph.as_ref()).unwrap().unwrap();
        assert!(rec.score < 0.86);
        assert_eq!(rec.positive_feedback_count, 1);
    }

    #[test]
    fn test_unknown_feedback_keeps_score() {
        let (facts, graph) = stores();
        let item = stored(facts.as_ref(), "a", Utc::now());
        let t = EffectivenessTracker::new(EffectivenessConfig::default());
        let rec = t.record_use(&item.id, Feedback::Unknown, facts.as_ref(), graph.as_ref()).unwrap().unwrap();
        assert!((rec.score - 0.8).abs() < 1e-6);
        assert_eq!(rec.usage_count, 2);
        assert!(t.record_use("nope", Feedback::Helpful, facts.as_ref(), graph.as_ref()).unwrap().is_none());
    }

    #[test]
    fn test_confidence_untouched_by_feedback() {
        let (facts, graph) = stores();
        let item = stored(facts.as_ref(), "a", Utc::now());
        let t = EffectivenessTracker::new(EffectivenessConfig::default());
        t.record_use(&item.id, Feedback::NotHelpful, facts.as_ref(), graph.as_ref()).unwrap();
        let after = facts.get(&item.id).unwrap().unwrap();
        assert!((after.confidence - item.confidence).abs() < 1e-6);
    }

    #[test]
    fn test_idle_items_decay_and_fresh_do_not() {
        let (facts, graph) = stores();
        let now = Utc::now();
        let stale = stored(facts.as_ref(), "stale", now - Duration::days(10));
        let fresh = stored(facts.as_ref(), "fresh", now - Duration::days(1));
        let t = EffectivenessTracker::new(EffectivenessConfig::default());

        let report = t.apply_decay(now, facts.as_ref(), graph.as_ref()).unwrap();
        assert_eq!(report, DecayReport { examined: 1, decayed: 1 });

        let stale = facts.get(&stale.id).unwrap().unwrap();
        let fresh = facts.get(&fresh.id).unwrap().unwrap();
        assert!(stale.effectiveness < fresh.effectiveness);
        assert!(stale.effectiveness_decayed_at.is_some());
    }

    #[test]
    fn test_repeated_passes_do_not_compound() {
        let start = Utc::now() - Duration::days(30);
        let (facts_a, graph_a) = stores();
        let (facts_b, graph_b) = stores();
        let a = stored(facts_a.as_ref(), "a", start);
        let b = stored(facts_b.as_ref(), "b", start);
        let t = EffectivenessTracker::new(EffectivenessConfig::default());

        // a is decayed at days 14, 21 and 28; b once at day 28.
        for day in [14, 21, 28] {
            t.apply_decay(start + Duration::days(day), facts_a.as_ref(), graph_a.as_ref()).unwrap();
        }
        t.apply_decay(start + Duration::days(28), facts_b.as_ref(), graph_b.as_ref()).unwrap();

        let a_score = facts_a.get(&a.id).unwrap().unwrap().effectiveness;
        let b_score = facts_b.get(&b.id).unwrap().unwrap().effectiveness;
        assert!(a_score < 0.8);
        assert!((a_score - b_score).abs() < 1e-4, "a {a_score} b {b_score}");
    }
}
