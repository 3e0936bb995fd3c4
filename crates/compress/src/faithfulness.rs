use std::collections::BTreeSet;

use blocks::signals;

/// Words too common to carry information; excluded from the overlap score.
const STOPWORDS: [&str; 32] = [
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "if",
    "in", "is", "it", "its", "not", "of", "on", "or", "that", "the", "their", "then", "there",
    "this", "to", "was", "were", "with",
];

fn content_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn f1(original: &BTreeSet<String>, candidate: &BTreeSet<String>) -> f32 {
    if original.is_empty() || candidate.is_empty() {
        return if original.is_empty() && candidate.is_empty() {
            1.0
        } else {
            0.0
        };
    }

    let common = original.intersection(candidate).count() as f32;

    if common == 0.0 {
        return 0.0;
    }

    let precision = common / candidate.len() as f32;
    let recall = common / original.len() as f32;

    2.0 * precision * recall / (precision + recall)
}

/// Faithfulness of a compressed candidate to its original, in `[0, 1]`.
///
/// Content-word F1 blended with identifier Jaccard when the original
/// carries identifiers. The identifier half means a candidate that loses
/// every identifier caps at 0.5, below any sane acceptance threshold.
pub fn score(original: &str, candidate: &str) -> f32 {
    let word_f1 = f1(&content_words(original), &content_words(candidate));

    let original_ids = signals::identifier_tokens(original);

    if original_ids.is_empty() {
        return word_f1;
    }

    let candidate_ids = signals::identifier_tokens(candidate);
    let id_overlap = signals::jaccard(&original_ids, &candidate_ids);

    0.5 * word_f1 + 0.5 * id_overlap
}
