use std::collections::BTreeSet;

use async_trait::async_trait;
use blocks::signals;

use crate::{CompressError, Compressor, CompressorOutput};

const DAMPING: f32 = 0.85;
const ITERATIONS: usize = 20;
const CONSTRAINT_BOOST: f32 = 0.3;
const IDENTIFIER_BOOST: f32 = 0.3;

/// Extractive summarizer used when no learned compressor is available.
///
/// Sentences are ranked with a damped power iteration over a word-overlap
/// similarity graph, boosted when they carry constraint keywords or
/// identifier-like tokens, and kept in original order until the target
/// ratio is met. Fenced code spans are treated as single sentences so the
/// fence markers survive intact.
#[derive(Default)]
pub struct ExtractiveCompressor;

impl ExtractiveCompressor {
    /// Create the summarizer.
    pub fn new() -> Self {
        Self
    }

    fn run(&self, text: &str, ratio: f32) -> CompressorOutput {
        let sentences = split_sentences(text);

        if sentences.len() <= 1 {
            return CompressorOutput {
                token_count: approx_tokens(text),
                text: text.to_string(),
            };
        }

        let ranks = graph_rank(&sentences);

        let mut order: Vec<usize> = (0..sentences.len()).collect();
        order.sort_by(|a, b| {
            ranks[*b]
                .partial_cmp(&ranks[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(b))
        });

        let target = ((approx_tokens(text) as f32) * ratio).ceil() as usize;

        let mut kept = BTreeSet::new();
        let mut used = 0;

        for index in order {
            let cost = approx_tokens(&sentences[index]);

            if kept.is_empty() || used + cost <= target {
                kept.insert(index);
                used += cost;
            }

            if used >= target {
                break;
            }
        }

        // BTreeSet iteration restores original sentence order.
        let text: String = kept
            .iter()
            .map(|index| sentences[*index].trim())
            .collect::<Vec<_>>()
            .join(" ");

        CompressorOutput {
            token_count: approx_tokens(&text),
            text,
        }
    }
}

#[async_trait]
impl Compressor for ExtractiveCompressor {
    async fn compress(
        &self,
        text: &str,
        ratio: f32,
        _force_preserve: &[&str],
    ) -> Result<CompressorOutput, CompressError> {
        Ok(self.run(text, ratio))
    }
}

fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Split into sentences at sentence enders and newlines, keeping the
/// delimiters. Fenced code spans come back as one sentence each.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for (index, span) in text.split("```").enumerate() {
        let fenced = index % 2 == 1;

        if fenced {
            sentences.push(format!("```{span}```"));
            continue;
        }

        let mut current = String::new();

        for ch in span.chars() {
            current.push(ch);

            if matches!(ch, '.' | '!' | '?' | '\n') {
                if !current.trim().is_empty() {
                    sentences.push(current.clone());
                }
                current.clear();
            }
        }

        if !current.trim().is_empty() {
            sentences.push(current);
        }
    }

    sentences
}

fn words(sentence: &str) -> BTreeSet<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Damped power iteration over the sentence similarity graph, with boosts
/// for constraint keywords and identifiers applied after convergence.
fn graph_rank(sentences: &[String]) -> Vec<f32> {
    let n = sentences.len();
    let word_sets: Vec<BTreeSet<String>> = sentences.iter().map(|s| words(s)).collect();

    let mut similarity = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let common = word_sets[i].intersection(&word_sets[j]).count();

            if common == 0 {
                continue;
            }

            let denominator =
                (1.0 + word_sets[i].len() as f32).ln() + (1.0 + word_sets[j].len() as f32).ln();
            let sim = common as f32 / denominator.max(f32::EPSILON);
            similarity[i][j] = sim;
            similarity[j][i] = sim;
        }
    }

    let degree: Vec<f32> = similarity.iter().map(|row| row.iter().sum()).collect();

    let mut ranks = vec![1.0f32 / n as f32; n];

    for _ in 0..ITERATIONS {
        let mut next = vec![(1.0 - DAMPING) / n as f32; n];

        for (i, next_rank) in next.iter_mut().enumerate() {
            for j in 0..n {
                if similarity[j][i] > 0.0 && degree[j] > 0.0 {
                    *next_rank += DAMPING * similarity[j][i] / degree[j] * ranks[j];
                }
            }
        }

        ranks = next;
    }

    for (rank, sentence) in ranks.iter_mut().zip(sentences) {
        let mut boost = 1.0;

        if signals::constraint_hits(sentence) > 0 {
            boost += CONSTRAINT_BOOST;
        }

        if !signals::identifier_tokens(sentence).is_empty() {
            boost += IDENTIFIER_BOOST;
        }

        *rank *= boost;
    }

    ranks
}
