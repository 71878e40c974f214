// ── Engram: Implicit Relation Extraction ───────────────────────────────────
//
// Rule-based detection of relationships the user never states outright:
//   "Thanks, that's really helpful!"       → satisfied_with(user, interaction)
//   "Can you tell me about Rust?" + "thx"  → interested_in(user, rust)
//
// The pattern table is data: each `PatternRule` names its text source,
// trigger regexes, optional exclusion and guard, and an output template.
// New patterns are a new table row, not new control flow.
//
// Pure and synchronous. Every triple carries the same configured confidence,
// lower than explicit extraction, and flows through the router unchanged.

use crate::atoms::engram_types::{ImplicitConfig, RelationshipTriple};
use crate::atoms::error::{EngineError, EngineResult};
use log::debug;
use regex::Regex;

/// Topic capture used by every topic pattern.
const TOPIC: &str = r"(?P<topic>[a-z0-9][a-z0-9 +#\-]*[a-z0-9+#])";

/// Topic patterns run per clause so "what is X and what is Y" yields both.
const CLAUSE_SPLIT: &str = r"(?i)\s+(?:and|or|but|also)\s+|[,;]";

/// Words that end a captured topic.
const TOPIC_STOPS: &[&str] = &[" please", " work", " for me", " in detail", " to me", " so ", " because"];

/// Leading words that make a capture a non-topic ("what is your name").
const NON_TOPIC_HEADS: &[&str] = &[
    "my", "your", "me", "you", "it", "this", "that", "there", "up", "going", "wrong", "the matter",
];

const ARTICLES: &[&str] = &["the ", "a ", "an "];

// ═══════════════════════════════════════════════════════════════════════════
// Pattern table
// ═══════════════════════════════════════════════════════════════════════════

/// Which text a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    Utterance,
    PriorTurn,
}

/// What a matching rule emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// Constant relation, e.g. `satisfied_with(user, interaction)`.
    Fixed { predicate: String, object: String },
    /// Relation to the captured `topic` group.
    Topic { predicate: String },
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub name: String,
    pub source: PatternSource,
    pub triggers: Vec<Regex>,
    /// Suppresses the rule when it matches the source text.
    pub exclude: Option<Regex>,
    /// Must match the current utterance for the rule to fire.
    pub guard: Option<Regex>,
    /// Source text must contain a question mark.
    pub requires_question: bool,
    pub template: Template,
}

struct RuleSpec {
    name: &'static str,
    source: PatternSource,
    triggers: &'static [&'static str],
    exclude: Option<&'static str>,
    /// Any of these must match the utterance; empty means unguarded.
    guards: &'static [&'static str],
    requires_question: bool,
    predicate: &'static str,
    /// `None` means the object is the captured topic.
    object: Option<&'static str>,
}

const GRATITUDE: &str = r"\b(thanks|thank you|thx|appreciate it|appreciated|helpful|great answer|perfect)\b";
const COMPLAINT: &str =
    r"\b(not (very |really |that )?helpful|unhelpful|no thanks|that'?s wrong|that is wrong|doesn'?t help|didn'?t help|does not help|useless)\b";
const AFFIRMATION: &str = r"\b(yes|yeah|correct|right|exactly|got it|makes sense)\b";

const TOPIC_TRIGGERS: &[&str] = &[
    r"\babout\s+TOPIC",
    r"\bwhat\s+(?:is|are)\s+TOPIC",
    r"\bexplain\s+TOPIC",
    r"\bhow\s+does\s+TOPIC\s+work\b",
];

const DEFAULT_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "gratitude",
        source: PatternSource::Utterance,
        triggers: &[GRATITUDE],
        exclude: Some(COMPLAINT),
        guards: &[],
        requires_question: false,
        predicate: "satisfied_with",
        object: Some("interaction"),
    },
    RuleSpec {
        name: "dissatisfaction",
        source: PatternSource::Utterance,
        triggers: &[COMPLAINT],
        exclude: None,
        guards: &[],
        requires_question: false,
        predicate: "dissatisfied_with",
        object: Some("interaction"),
    },
    RuleSpec {
        name: "topic_question",
        source: PatternSource::Utterance,
        triggers: TOPIC_TRIGGERS,
        exclude: None,
        guards: &[],
        requires_question: true,
        predicate: "interested_in",
        object: None,
    },
    RuleSpec {
        name: "acknowledged_topic",
        source: PatternSource::PriorTurn,
        triggers: TOPIC_TRIGGERS,
        exclude: None,
        guards: &[GRATITUDE, AFFIRMATION],
        requires_question: false,
        predicate: "interested_in",
        object: None,
    },
];

fn compile(pattern: &str, rule: &str) -> EngineResult<Regex> {
    let expanded = pattern.replace("TOPIC", TOPIC);
    Regex::new(&format!("(?i){}", expanded))
        .map_err(|e| EngineError::config(format!("implicit rule '{}': {}", rule, e)))
}

/// Compile the built-in pattern table.
pub fn default_rules() -> EngineResult<Vec<PatternRule>> {
    DEFAULT_RULES
        .iter()
        .map(|spec| {
            let triggers = spec
                .triggers
                .iter()
                .map(|p| compile(p, spec.name))
                .collect::<EngineResult<Vec<_>>>()?;
            Ok(PatternRule {
                name: spec.name.to_string(),
                source: spec.source,
                triggers,
                exclude: spec.exclude.map(|p| compile(p, spec.name)).transpose()?,
                guard: if spec.guards.is_empty() {
                    None
                } else {
                    Some(compile(&format!("(?:{})", spec.guards.join("|")), spec.name)?)
                },
                requires_question: spec.requires_question,
                template: match spec.object {
                    Some(object) => Template::Fixed {
                        predicate: spec.predicate.to_string(),
                        object: object.to_string(),
                    },
                    None => Template::Topic { predicate: spec.predicate.to_string() },
                },
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════════════════════

pub struct ImplicitRelationExtractor {
    rules: Vec<PatternRule>,
    clause_split: Regex,
    confidence: f32,
    enabled: bool,
}

impl ImplicitRelationExtractor {
    pub fn new(config: &ImplicitConfig) -> EngineResult<Self> {
        Self::with_rules(default_rules()?, config)
    }

    pub fn with_rules(rules: Vec<PatternRule>, config: &ImplicitConfig) -> EngineResult<Self> {
        let clause_split = Regex::new(CLAUSE_SPLIT)
            .map_err(|e| EngineError::config(format!("clause splitter: {}", e)))?;
        Ok(Self { rules, clause_split, confidence: config.confidence, enabled: config.enabled })
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Triples implied by this turn, in pattern-match order, each emitted once.
    pub fn extract(&self, utterance: &str, prior_turn: Option<&str>) -> Vec<RelationshipTriple> {
        let mut out: Vec<RelationshipTriple> = Vec::new();
        if !self.enabled {
            return out;
        }

        for rule in &self.rules {
            let text = match rule.source {
                PatternSource::Utterance => utterance,
                PatternSource::PriorTurn => match prior_turn {
                    Some(p) => p,
                    None => continue,
                },
            };
            if rule.requires_question && !text.contains('?') {
                continue;
            }
            if rule.exclude.as_ref().is_some_and(|re| re.is_match(text)) {
                continue;
            }
            if rule.guard.as_ref().is_some_and(|re| !re.is_match(utterance)) {
                continue;
            }

            for trigger in &rule.triggers {
                match &rule.template {
                    Template::Fixed { predicate, object } => {
                        if trigger.is_match(text) {
                            push_unique(&mut out, self.triple(predicate, object, &rule.name));
                        }
                    }
                    Template::Topic { predicate } => {
                        for clause in self.clause_split.split(text) {
                            for caps in trigger.captures_iter(clause) {
                                let topic = caps.name("topic").and_then(|m| clean_topic(m.as_str()));
                                if let Some(topic) = topic {
                                    push_unique(&mut out, self.triple(predicate, &topic, &rule.name));
                                }
                            }
                        }
                    }
                }
            }
        }

        if !out.is_empty() {
            debug!("[engram::implicit] {} implicit relation(s) from turn", out.len());
        }
        out
    }

    fn triple(&self, predicate: &str, object: &str, rule: &str) -> RelationshipTriple {
        RelationshipTriple::implicit("user", predicate, object, self.confidence, rule)
    }
}

fn push_unique(out: &mut Vec<RelationshipTriple>, triple: RelationshipTriple) {
    let dup = out.iter().any(|t| {
        t.subject == triple.subject && t.predicate == triple.predicate && t.object == triple.object
    });
    if !dup {
        out.push(triple);
    }
}

/// Lowercase, cut at the first stop phrase, drop a leading article.
/// `None` when nothing topical remains.
fn clean_topic(raw: &str) -> Option<String> {
    let mut topic = format!("{} ", raw.to_lowercase());
    for stop in TOPIC_STOPS {
        if let Some(idx) = topic.find(stop) {
            topic.truncate(idx);
        }
    }
    let mut topic = topic.trim().to_string();
    for article in ARTICLES {
        if let Some(rest) = topic.strip_prefix(article) {
            topic = rest.trim().to_string();
            break;
        }
    }
    let head_blocked = NON_TOPIC_HEADS
        .iter()
        .any(|h| topic == *h || topic.starts_with(&format!("{} ", h)));
    if topic.len() < 2 || head_blocked {
        return None;
    }
    Some(topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::Provenance;

    fn extractor() -> ImplicitRelationExtractor {
        ImplicitRelationExtractor::new(&ImplicitConfig::default()).unwrap()
    }

    fn pairs(triples: &[RelationshipTriple]) -> Vec<(String, String)> {
        triples.iter().map(|t| (t.predicate.clone(), t.object.clone())).collect()
    }

    #[test]
    fn test_gratitude_after_topic_question() {
        let out = extractor().extract(
            "Thanks, that's really helpful!",
            Some("Can you tell me about machine learning?"),
        );
        assert_eq!(
            pairs(&out),
            vec![
                ("satisfied_with".to_string(), "interaction".to_string()),
                ("interested_in".to_string(), "machine learning".to_string()),
            ]
        );
        assert!(out.iter().all(|t| (t.confidence - 0.6).abs() < 1e-6));
        assert!(out.iter().all(|t| t.subject == "user"));
        assert!(matches!(&out[0].provenance, Provenance::Implicit { pattern } if pattern == "gratitude"));
    }

    #[test]
    fn test_negated_gratitude_is_dissatisfaction() {
        let out = extractor().extract("That was not helpful at all", None);
        assert_eq!(pairs(&out), vec![("dissatisfied_with".to_string(), "interaction".to_string())]);
    }

    #[test]
    fn test_thanks_with_complaint_is_only_dissatisfaction() {
        let out = extractor().extract("Thanks, but that's wrong", None);
        assert_eq!(pairs(&out), vec![("dissatisfied_with".to_string(), "interaction".to_string())]);
    }

    #[test]
    fn test_topic_question_requires_question_mark() {
        let e = extractor();
        assert!(e.extract("I read about compilers yesterday", None).is_empty());
        let out = e.extract("How does garbage collection work?", None);
        assert_eq!(pairs(&out), vec![("interested_in".to_string(), "garbage collection".to_string())]);
    }

    #[test]
    fn test_multiple_topics_one_utterance() {
        let out = extractor().extract("What is Rust and what is the borrow checker?", None);
        let objects: Vec<&str> = out.iter().map(|t| t.object.as_str()).collect();
        assert_eq!(objects, vec!["rust", "borrow checker"]);
    }

    #[test]
    fn test_prior_turn_needs_acknowledgement() {
        let e = extractor();
        assert!(e.extract("ok", Some("Tell me about kubernetes?")).is_empty());
        let out = e.extract("yes exactly", Some("Tell me about kubernetes?"));
        assert_eq!(pairs(&out), vec![("interested_in".to_string(), "kubernetes".to_string())]);
    }

    #[test]
    fn test_pronoun_topics_are_ignored() {
        assert!(extractor().extract("What is your name?", None).is_empty());
    }

    #[test]
    fn test_duplicates_within_call_emitted_once() {
        let out = extractor().extract("Thanks! Thank you so much, very helpful.", None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_disabled_extractor_is_silent() {
        let cfg = ImplicitConfig { enabled: false, ..Default::default() };
        let e = ImplicitRelationExtractor::new(&cfg).unwrap();
        assert!(e.extract("Thanks!", None).is_empty());
    }

    #[test]
    fn test_custom_rule_is_data() {
        let rule = PatternRule {
            name: "ownership".into(),
            source: PatternSource::Utterance,
            triggers: vec![Regex::new(r"(?i)\bmy dog\b").unwrap()],
            exclude: None,
            guard: None,
            requires_question: false,
            template: Template::Fixed { predicate: "owns".into(), object: "dog".into() },
        };
        let e = ImplicitRelationExtractor::with_rules(vec![rule], &ImplicitConfig::default()).unwrap();
        let out = e.extract("My dog loves walks", None);
        assert_eq!(pairs(&out), vec![("owns".to_string(), "dog".to_string())]);
    }
}
