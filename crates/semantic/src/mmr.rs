use std::collections::HashMap;

use blocks::BlockId;

use crate::similarity::cosine;

/// A candidate entering MMR re-ranking.
#[derive(Debug, Clone, Copy)]
pub struct MmrCandidate {
    /// Block id, the final tie-break.
    pub id: BlockId,
    /// Utility score from the scoring step.
    pub utility: f32,
    /// Block priority, the first tie-break.
    pub priority: f32,
    /// Block timestamp, the second tie-break.
    pub timestamp: u64,
}

/// Result of MMR re-ranking: the selection order plus the candidates whose
/// redundancy penalty exceeded their weighted utility.
#[derive(Debug, Default)]
pub struct MmrRanking {
    /// Candidates in selection order.
    pub ordered: Vec<BlockId>,
    /// Candidates rejected as redundant.
    pub redundant: Vec<BlockId>,
}

/// Maximal Marginal Relevance re-ranking.
///
/// Iteratively picks the candidate maximizing
/// `lambda * utility - (1 - lambda) * max_similarity_to_selected`, using the
/// stored embeddings for the similarity term. Candidates without an
/// embedding contribute zero similarity. A candidate whose best objective
/// drops below zero is redundant: its similarity to the already selected
/// set outweighs what it would add.
///
/// Ties break deterministically: higher priority, then higher timestamp,
/// then lower id.
pub fn rank(
    candidates: &[MmrCandidate],
    embeddings: &HashMap<BlockId, Vec<f32>>,
    lambda: f32,
) -> MmrRanking {
    let mut pool: Vec<MmrCandidate> = candidates.to_vec();
    // Seed the scan order by utility so equal objectives resolve the same
    // way on every run.
    pool.sort_by(|a, b| {
        b.utility
            .partial_cmp(&a.utility)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| compare_ties(a, b))
    });

    let mut ranking = MmrRanking::default();
    let mut selected_vectors: Vec<&[f32]> = Vec::new();

    while !pool.is_empty() {
        let mut best_index = 0;
        let mut best_objective = f32::NEG_INFINITY;

        for (index, candidate) in pool.iter().enumerate() {
            let redundancy = embeddings
                .get(&candidate.id)
                .map(|vector| {
                    selected_vectors
                        .iter()
                        .map(|s| cosine(vector, s))
                        .fold(0.0f32, f32::max)
                })
                .unwrap_or(0.0);

            let objective = lambda * candidate.utility - (1.0 - lambda) * redundancy;

            let better = objective > best_objective
                || (objective == best_objective
                    && compare_ties(candidate, &pool[best_index]).is_lt());

            if better {
                best_objective = objective;
                best_index = index;
            }
        }

        let chosen = pool.swap_remove(best_index);

        if best_objective < 0.0 {
            ranking.redundant.push(chosen.id);
            continue;
        }

        if let Some(vector) = embeddings.get(&chosen.id) {
            selected_vectors.push(vector.as_slice());
        }
        ranking.ordered.push(chosen.id);
    }

    ranking
}

fn compare_ties(a: &MmrCandidate, b: &MmrCandidate) -> std::cmp::Ordering {
    b.priority
        .partial_cmp(&a.priority)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}
