//! Textual signals shared across stages: constraint keywords and
//! identifier-like tokens. Heuristic (constraint extraction), utility
//! scoring and the compression faithfulness gate all read the same
//! vocabulary, so it lives next to the IR.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Case-sensitive keywords that mark a line as a hard constraint.
pub const CONSTRAINT_KEYWORDS: [&str; 7] =
    ["MUST NOT", "MUST", "ALWAYS", "NEVER", "FORMAT", "JSON", "DEADLINE"];

/// Whether a line carries at least one constraint keyword.
pub fn is_constraint_line(line: &str) -> bool {
    CONSTRAINT_KEYWORDS.iter().any(|kw| line.contains(kw))
}

/// Number of constraint keyword occurrences in the text.
///
/// `MUST NOT` is counted once, not once per contained keyword: counting the
/// `MUST` prefix of every `MUST NOT` already accounts for it.
pub fn constraint_hits(text: &str) -> usize {
    CONSTRAINT_KEYWORDS
        .iter()
        .filter(|kw| **kw != "MUST NOT")
        .map(|kw| text.matches(kw).count())
        .sum()
}

/// Identifier-like tokens: UUIDs, long hex ids, numeric ids, and code fence
/// markers. These are the tokens a compressed block is never allowed to lose
/// wholesale.
pub fn identifier_tokens(text: &str) -> BTreeSet<String> {
    static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?x)
            [0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12} # uuid
            | \b0x[0-9a-fA-F]+\b       # hex literal
            | \b[0-9a-fA-F]{8,}\b      # bare hex id
            | \b\d{3,}\b               # numeric id or status code
            | ```                      # code fence marker
            ",
        )
        .expect("static pattern")
    });

    IDENTIFIER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Named-entity-like tokens: capitalized words plus identifiers. Used for
/// the entity-preservation factor of the utility score.
pub fn entity_tokens(text: &str) -> BTreeSet<String> {
    static CAPITALIZED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b[A-Z][a-zA-Z0-9_]{2,}\b").expect("static pattern"));

    let mut entities: BTreeSet<String> = CAPITALIZED
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    entities.extend(identifier_tokens(text));
    entities
}

/// Jaccard similarity of two token sets, 0.0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_lines_are_case_sensitive() {
        assert!(is_constraint_line("You MUST reply in JSON."));
        assert!(is_constraint_line("NEVER include PII."));
        assert!(!is_constraint_line("you must reply in json."));
    }

    #[test]
    fn counts_must_not_once() {
        assert_eq!(constraint_hits("You MUST NOT lie."), 1);
        assert_eq!(constraint_hits("MUST do A. NEVER do B. Reply as JSON."), 3);
    }

    #[test]
    fn finds_identifiers() {
        let ids = identifier_tokens(
            "request 550e8400-e29b-41d4-a716-446655440000 returned 404, see ```log```",
        );
        assert!(ids.contains("550e8400-e29b-41d4-a716-446655440000"));
        assert!(ids.contains("404"));
        assert!(ids.contains("```"));
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a: BTreeSet<String> = ["404".to_string()].into();
        let b: BTreeSet<String> = ["500".to_string()].into();
        assert_eq!(jaccard(&a, &b), 0.0);
        assert_eq!(jaccard(&a, &a), 1.0);
    }
}
