// ── Engram: Query Profile Classification ───────────────────────────────────
//
// Classify what *kind* of question is being asked so the adaptive strategy
// can weight memory types accordingly. Example:
//   "What's my favorite color?"  → Personal       → relationships + episodic
//   "What is a monad?"           → Factual        → semantic facts + skills
//   "Hi, thanks again!"          → Conversational → episodic
//
// This module:
//   - Classifies queries into `QueryProfile` via keyword/pattern heuristics
//   - Returns `QueryClassification` with per-profile confidence scores
//   - Exposes `profile_weights` for the adaptive strategy

use crate::atoms::engram_types::{QueryClassification, TypeWeights};

// ═══════════════════════════════════════════════════════════════════════════
// Query Profile Classification
// ═══════════════════════════════════════════════════════════════════════════

/// Classify a query into a profile distribution.
/// Keyword heuristics only: no model, fast, deterministic.
pub fn classify_query(query: &str) -> QueryClassification {
    let q = query.to_lowercase();
    let words: Vec<&str> = q
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    let mut personal = 0.0_f32;
    let mut factual = 0.0_f32;
    let mut conversational = 0.0_f32;
    let mut general = 0.0_f32;

    // ── Personal signals ─────────────────────────────────────────────────
    // "my", "me", "i like", "my favorite", "do you remember"
    if has_word(&words, &["my", "me", "mine", "i'm"]) {
        personal += 0.5;
    }
    if contains_any(&q, &["i am ", "i like", "my favorite", "my favourite", "about me", "do you remember"]) {
        personal += 0.4;
    }

    // ── Factual signals ──────────────────────────────────────────────────
    // "what is", "how to", "explain", "define"
    if starts_with_any(&q, &["what is ", "what's ", "what are ", "define ", "who is "]) {
        factual += 0.6;
    }
    if contains_any(&q, &["how to ", "explain", "definition", "how does", "how many", "result of"]) {
        factual += 0.4;
    }

    // ── Conversational signals ───────────────────────────────────────────
    // greetings, thanks, farewells
    if has_word(&words, &["hello", "hi", "hey", "thanks", "thx", "bye", "goodbye"]) {
        conversational += 0.6;
    }
    if contains_any(&q, &["how are you", "thank you", "good morning", "good night", "see you"]) {
        conversational += 0.4;
    }

    // Nothing matched: plain general profile.
    let total = personal + factual + conversational;
    if total < 0.1 {
        general = 1.0;
    }

    // Normalize to sum = 1.0
    let total = personal + factual + conversational + general;
    if total > 0.0 {
        personal /= total;
        factual /= total;
        conversational /= total;
        general /= total;
    }

    QueryClassification { personal, factual, conversational, general }
}

/// Convenience: classify and return the blended (un-normalized) type weights.
pub fn profile_weights(query: &str) -> TypeWeights {
    classify_query(query).blended_weights()
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn starts_with_any(s: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| s.starts_with(p))
}

fn contains_any(s: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| s.contains(t))
}

fn has_word(words: &[&str], targets: &[&str]) -> bool {
    words.iter().any(|w| targets.contains(w))
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::QueryProfile;

    #[test]
    fn test_personal() {
        let c = classify_query("What's my favorite color?");
        assert_eq!(c.dominant(), QueryProfile::Personal, "got {c:?}");
    }

    #[test]
    fn test_factual() {
        let c = classify_query("What is the capital of France?");
        assert!(c.factual > 0.5, "Expected factual dominant, got {c:?}");
        assert_eq!(c.dominant(), QueryProfile::Factual);
    }

    #[test]
    fn test_conversational() {
        let c = classify_query("Hi there, how are you?");
        assert_eq!(c.dominant(), QueryProfile::Conversational, "got {c:?}");
    }

    #[test]
    fn test_substrings_are_not_words() {
        // "me" inside "time" and "hi" inside "machine" must not count.
        let c = classify_query("machine time");
        assert_eq!(c.dominant(), QueryProfile::General, "got {c:?}");
    }

    #[test]
    fn test_fallback_general() {
        let c = classify_query("asdfghjkl");
        let total = c.personal + c.factual + c.conversational + c.general;
        assert!((total - 1.0).abs() < 0.01, "Should normalize to 1.0");
        assert!((c.general - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_personal_weights_favor_relationships() {
        let w = profile_weights("tell me about my friends").normalized();
        assert!(w.relationship >= w.skill, "got {w:?}");
        assert!((w.relationship - 1.0).abs() < 1e-6 || (w.episodic - 1.0).abs() < 1e-6);
    }
}
