// Engram Config: loading and startup validation for `MemoryConfig`.
//
// Configuration is TOML. Every section and field is optional; omitted values
// take the documented defaults from atoms::constants. Validation is fail-fast:
// any unknown strategy, malformed weight table or out-of-range threshold is an
// `EngineError::Config` before the coordinator exists.

use crate::atoms::engram_types::{MemoryConfig, MemoryType, StrategyKind, TypeWeights, ValidatedConfig};
use crate::atoms::error::{EngineError, EngineResult};
use log::info;
use std::path::Path;

impl MemoryConfig {
    /// Parse a TOML document. An empty document yields the defaults.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        Ok(toml::from_str::<MemoryConfig>(content)?)
    }

    /// Read and parse a TOML file. A missing file is an error.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("[engram::config] Loaded memory config from {:?}", path);
        Ok(config)
    }

    /// Check every tunable and resolve names into typed values.
    pub fn validate(&self) -> EngineResult<ValidatedConfig> {
        let strategy = self
            .strategy
            .parse::<StrategyKind>()
            .map_err(|e| EngineError::config(format!("strategy: {}", e)))?;

        let r = &self.routing;
        unit("routing.min_confidence", r.min_confidence)?;
        unit("routing.ambiguous_low", r.ambiguous_low)?;
        unit("routing.ambiguous_high", r.ambiguous_high)?;
        unit("routing.ambiguity_confidence_scale", r.ambiguity_confidence_scale)?;
        unit("routing.merge_reinforcement", r.merge_reinforcement)?;
        if r.ambiguous_low > r.ambiguous_high {
            return Err(EngineError::config(format!(
                "routing.ambiguous_low ({}) exceeds routing.ambiguous_high ({})",
                r.ambiguous_low, r.ambiguous_high
            )));
        }
        if let Some(p) = r
            .relational_predicates
            .iter()
            .chain(r.exclusive_predicates.iter())
            .find(|p| p.trim().is_empty())
        {
            return Err(EngineError::config(format!("routing: empty predicate name {:?}", p)));
        }

        if self.dedup.cache_size == 0 {
            return Err(EngineError::config("dedup.cache_size must be at least 1"));
        }
        unit("implicit.confidence", self.implicit.confidence)?;

        let rt = &self.retrieval;
        if rt.default_max_items == 0 {
            return Err(EngineError::config("retrieval.default_max_items must be at least 1"));
        }
        if rt.candidate_pool == 0 {
            return Err(EngineError::config("retrieval.candidate_pool must be at least 1"));
        }
        if !(rt.recency_half_life_days.is_finite() && rt.recency_half_life_days > 0.0) {
            return Err(EngineError::config(format!(
                "retrieval.recency_half_life_days must be positive, got {}",
                rt.recency_half_life_days
            )));
        }
        unit("retrieval.recency_floor", rt.recency_floor as f32)?;
        let type_weights = parse_type_weights(self)?;

        let e = &self.effectiveness;
        unit("effectiveness.initial_score", e.initial_score)?;
        unit("effectiveness.decay_floor", e.decay_floor)?;
        if !(e.ema_alpha.is_finite() && e.ema_alpha > 0.0 && e.ema_alpha <= 1.0) {
            return Err(EngineError::config(format!("effectiveness.ema_alpha must be in (0, 1], got {}", e.ema_alpha)));
        }
        if !(e.decay_rate.is_finite() && e.decay_rate >= 0.0 && e.decay_rate < 1.0) {
            return Err(EngineError::config(format!("effectiveness.decay_rate must be in [0, 1), got {}", e.decay_rate)));
        }
        if e.decay_interval_secs == 0 {
            return Err(EngineError::config("effectiveness.decay_interval_secs must be at least 1"));
        }

        if self.store.timeout_ms == 0 {
            return Err(EngineError::config("store.timeout_ms must be at least 1"));
        }

        Ok(ValidatedConfig { raw: self.clone(), strategy, type_weights })
    }
}

fn unit(key: &str, value: f32) -> EngineResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::config(format!("{} must be in [0, 1], got {}", key, value)))
    }
}

/// Types omitted from the table weigh 0. At least one weight must be positive.
fn parse_type_weights(config: &MemoryConfig) -> EngineResult<TypeWeights> {
    let mut weights = TypeWeights { episodic: 0.0, semantic_fact: 0.0, skill: 0.0, relationship: 0.0 };
    for (name, weight) in &config.retrieval.type_weights {
        let memory_type = name
            .parse::<MemoryType>()
            .map_err(|e| EngineError::config(format!("retrieval.type_weights: {}", e)))?;
        if !weight.is_finite() || *weight < 0.0 {
            return Err(EngineError::config(format!(
                "retrieval.type_weights.{}: weight must be a finite non-negative number, got {}",
                name, weight
            )));
        }
        weights.set(memory_type, *weight);
    }
    if MemoryType::ALL.iter().all(|t| weights.get(*t) == 0.0) {
        return Err(EngineError::config("retrieval.type_weights: at least one weight must be positive"));
    }
    Ok(weights.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_config_err(cfg: &MemoryConfig, needle: &str) {
        match cfg.validate() {
            Err(EngineError::Config(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected Config error mentioning {needle}, got {other:?}"),
        }
    }

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = MemoryConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, MemoryConfig::default());
        let v = cfg.validate().unwrap();
        assert_eq!(v.strategy, StrategyKind::Keyword);
        assert!((v.type_weights.semantic_fact - 1.0).abs() < 1e-6);
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let cfg = MemoryConfig::from_toml_str(
            r#"
            strategy = "adaptive"

            [routing]
            min_confidence = 0.7

            [retrieval.type_weights]
            relationship = 2.0
            episodic = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.routing.min_confidence, 0.7);
        assert_eq!(cfg.routing.ambiguous_high, crate::atoms::constants::DEFAULT_AMBIGUOUS_HIGH);
        let v = cfg.validate().unwrap();
        assert_eq!(v.strategy, StrategyKind::Adaptive);
        assert_eq!(v.type_weights.relationship, 1.0);
        assert_eq!(v.type_weights.episodic, 0.5);
        assert_eq!(v.type_weights.skill, 0.0);
    }

    #[test]
    fn unknown_strategy_is_fatal() {
        let cfg = MemoryConfig { strategy: "semantic".into(), ..Default::default() };
        expect_config_err(&cfg, "strategy");
    }

    #[test]
    fn malformed_weight_table_is_fatal() {
        let mut cfg = MemoryConfig::default();
        cfg.retrieval.type_weights.insert("procedural".into(), 0.5);
        expect_config_err(&cfg, "type_weights");

        let mut cfg = MemoryConfig::default();
        cfg.retrieval.type_weights.insert("skill".into(), -1.0);
        expect_config_err(&cfg, "skill");

        let mut cfg = MemoryConfig::default();
        cfg.retrieval.type_weights.clear();
        expect_config_err(&cfg, "positive");
    }

    #[test]
    fn threshold_ranges_are_checked() {
        let mut cfg = MemoryConfig::default();
        cfg.routing.min_confidence = 1.5;
        expect_config_err(&cfg, "min_confidence");

        let mut cfg = MemoryConfig::default();
        cfg.routing.ambiguous_low = 0.8;
        expect_config_err(&cfg, "exceeds");

        let mut cfg = MemoryConfig::default();
        cfg.effectiveness.ema_alpha = 0.0;
        expect_config_err(&cfg, "ema_alpha");

        let mut cfg = MemoryConfig::default();
        cfg.effectiveness.decay_rate = 1.0;
        expect_config_err(&cfg, "decay_rate");

        let mut cfg = MemoryConfig::default();
        cfg.dedup.cache_size = 0;
        expect_config_err(&cfg, "cache_size");

        let mut cfg = MemoryConfig::default();
        cfg.effectiveness.decay_interval_secs = 0;
        expect_config_err(&cfg, "decay_interval_secs");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = MemoryConfig::from_toml_str("strategy = [").unwrap_err();
        assert!(matches!(err, EngineError::TomlParse(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("engram-missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(MemoryConfig::load(&path), Err(EngineError::Io(_))));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("engram-cfg-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "strategy = \"enhanced\"\n[dedup]\ncache_size = 16\n").unwrap();
        let cfg = MemoryConfig::load(&path).unwrap();
        assert_eq!(cfg.strategy, "enhanced");
        assert_eq!(cfg.dedup.cache_size, 16);
        let _ = std::fs::remove_file(path);
    }
}
