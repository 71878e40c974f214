// ── Engram: Context Lines ──────────────────────────────────────────────────
//
// Renders a retrieval result as prompt lines for the context-building step:
//   Knowledge: user likes blue
//   Fact (tool_result): result of 2+2 is 4
//   Memory: we discussed the trip to lisbon
//   Learning: run cargo fmt before committing
//
// Order follows the result's ranking. A partial result gets a trailing note
// so the prompt never presents degraded recall as complete.

use crate::atoms::engram_types::{MemoryItem, MemoryType, RetrievalResult};

const PARTIAL_NOTE: &str = "(memory recall incomplete: some stores were unavailable)";

/// One prompt line per retrieved memory, in rank order.
pub fn context_lines(result: &RetrievalResult) -> Vec<String> {
    let mut lines: Vec<String> = result.memories().iter().map(|m| render(&m.item)).collect();
    if result.partial && !lines.is_empty() {
        lines.push(PARTIAL_NOTE.to_string());
    }
    lines
}

fn render(item: &MemoryItem) -> String {
    match item.memory_type {
        MemoryType::Relationship => {
            let text = item.triple.as_ref().map(|t| t.text()).unwrap_or_else(|| item.content.clone());
            format!("Knowledge: {}", text)
        }
        MemoryType::SemanticFact => match item.category {
            Some(category) => format!("Fact ({}): {}", category, item.content),
            None => format!("Fact: {}", item.content),
        },
        MemoryType::Episodic => format!("Memory: {}", item.content),
        MemoryType::Skill => format!("Learning: {}", item.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::engram_types::{
        FactCategory, RelationshipTriple, ResultSource, ScoreBreakdown, ScoredMemory, StrategyKind,
    };

    fn scored(item: MemoryItem) -> ScoredMemory {
        ScoredMemory {
            item,
            score: ScoreBreakdown {
                base_relevance: 1.0,
                recency: 1.0,
                effectiveness: 0.5,
                type_weight: 1.0,
                composite: 0.5,
                source: ResultSource::FactStore,
            },
        }
    }

    #[test]
    fn test_lines_per_type() {
        let triple = RelationshipTriple::new("user", "likes", "blue", 0.9);
        let mut rel = MemoryItem::new(MemoryType::Relationship, &triple.text(), 0.9, "t");
        rel.triple = Some(triple);
        let mut fact = MemoryItem::new(MemoryType::SemanticFact, "result of 2+2 is 4", 0.9, "t");
        fact.category = Some(FactCategory::ToolResult);
        let ep = MemoryItem::new(MemoryType::Episodic, "we planned a trip", 0.9, "t");
        let skill = MemoryItem::new(MemoryType::Skill, "run cargo fmt first", 0.9, "t");

        let result = RetrievalResult::new(
            vec![scored(rel), scored(fact), scored(ep), scored(skill)],
            StrategyKind::Keyword,
            false,
            false,
        );
        assert_eq!(
            context_lines(&result),
            vec![
                "Knowledge: user likes blue",
                "Fact (tool_result): result of 2+2 is 4",
                "Memory: we planned a trip",
                "Learning: run cargo fmt first",
            ]
        );
    }

    #[test]
    fn test_partial_result_is_marked() {
        let ep = MemoryItem::new(MemoryType::Episodic, "x", 0.9, "t");
        let result = RetrievalResult::new(vec![scored(ep)], StrategyKind::Keyword, false, true);
        let lines = context_lines(&result);
        assert_eq!(lines.last().map(String::as_str), Some(PARTIAL_NOTE));

        let empty = RetrievalResult::new(vec![], StrategyKind::Keyword, false, true);
        assert!(context_lines(&empty).is_empty());
    }
}
