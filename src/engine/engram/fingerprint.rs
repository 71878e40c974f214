// ── Engram: Content Fingerprints ───────────────────────────────────────────
//
// Deterministic identity for dedup. A fingerprint is the SHA-256 of the
// memory type discriminator plus the normalized content, so the same text
// stored as two different types never collides.
//
// Triples fingerprint over their canonical (subject, predicate, object)
// form rather than over surface text, so "User likes Blue." and a triple
// (user, likes, blue) from another extractor land on the same row.

use crate::atoms::engram_types::{MemoryType, RelationshipTriple};
use sha2::{Digest, Sha256};

const TYPE_SEPARATOR: char = '\u{1e}';
const PART_SEPARATOR: char = '\u{1f}';

/// Case-fold, collapse whitespace, trim, and strip trailing sentence punctuation.
pub fn normalize_text(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['.', '!', '?', ',', ';', ':'])
        .trim_end()
        .to_string()
}

/// Normalized predicate: lowercase, inner spaces as underscores.
pub fn normalize_predicate(predicate: &str) -> String {
    normalize_text(predicate).replace(' ', "_")
}

/// Copy of `triple` with every part normalized.
pub fn normalize_triple(triple: &RelationshipTriple) -> RelationshipTriple {
    RelationshipTriple {
        subject: normalize_text(&triple.subject),
        predicate: normalize_predicate(&triple.predicate),
        object: normalize_text(&triple.object),
        confidence: triple.confidence,
        provenance: triple.provenance.clone(),
    }
}

/// Canonical `subject␟predicate␟object` form.
pub fn canonical_triple(triple: &RelationshipTriple) -> String {
    let t = normalize_triple(triple);
    format!("{}{sep}{}{sep}{}", t.subject, t.predicate, t.object, sep = PART_SEPARATOR)
}

/// Hex SHA-256 over `<type>␞<normalized>`.
pub fn fingerprint(memory_type: MemoryType, normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(memory_type.as_str().as_bytes());
    hasher.update(TYPE_SEPARATOR.to_string().as_bytes());
    hasher.update(normalized.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn fingerprint_content(memory_type: MemoryType, content: &str) -> String {
    fingerprint(memory_type, &normalize_text(content))
}

pub fn fingerprint_triple(triple: &RelationshipTriple) -> String {
    fingerprint(MemoryType::Relationship, &canonical_triple(triple))
}
