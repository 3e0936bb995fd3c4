use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::time::Duration;

use blocks::{Block, BlockId, BlockKind, DropReason, DroppedBlock};
use config::SemanticConfig;
use tokio::time::timeout;

use crate::knapsack::{self, KnapsackItem};
use crate::mmr::{self, MmrCandidate};
use crate::score::{ScoreContext, utility};
use crate::{Embedder, SemanticError, VectorStore};

/// How many of the most recent user blocks form the retrieval query.
const QUERY_USER_BLOCKS: usize = 3;

/// Candidates scoring below this floor are dropped without entering MMR.
const LOW_UTILITY_FLOOR: f32 = 0.05;

/// Priority assigned to blocks pulled in from the vector store.
const AUGMENTED_PRIORITY: f32 = 0.4;

/// Inputs of one selection run.
pub struct SelectionParams<'a> {
    /// Token budget for the whole output.
    pub budget: usize,
    /// Safety margin subtracted before packing.
    pub safety_margin: usize,
    /// Tenant whose vector-store records may be pulled in.
    pub tenant: &'a str,
    /// Semantic stage settings.
    pub config: &'a SemanticConfig,
    /// Bound on one embedding call.
    pub embed_timeout: Duration,
    /// First id available for blocks created from store records.
    pub next_block_id: u64,
}

/// Outcome of semantic selection.
#[derive(Debug, Default)]
pub struct Selection {
    /// Ids of conversation candidates that were accepted.
    pub accepted: BTreeSet<BlockId>,
    /// Accepted blocks created from vector-store records. They carry
    /// timestamp 0 so recency never favors them over the live conversation.
    pub augmented: Vec<Block>,
    /// Rejected candidates with reasons.
    pub dropped: Vec<DroppedBlock>,
    /// True when the vector store was unavailable and augmentation was
    /// skipped.
    pub store_degraded: bool,
}

/// Run semantic selection over the current block list.
///
/// Steps: build the query from the most recent user blocks, embed query and
/// candidates in one batch, optionally augment candidates with per-kind
/// vector-store neighbours, score, MMR-rank, and pack under per-kind budgets.
/// `must_keep` blocks are never candidates; their tokens are debited from
/// the available budget up front.
pub async fn select(
    current: &[Block],
    params: SelectionParams<'_>,
    embedder: &dyn Embedder,
    store: Option<&dyn VectorStore>,
) -> Result<Selection, SemanticError> {
    let config = params.config;

    let query_text = query_text(current);

    let candidates: Vec<&Block> = current.iter().filter(|b| !b.must_keep).collect();

    let mut texts = Vec::with_capacity(candidates.len() + 1);
    texts.push(query_text.clone());
    texts.extend(candidates.iter().map(|b| b.content.clone()));

    let mut vectors = timeout(params.embed_timeout, embedder.embed(&texts))
        .await
        .map_err(|_| SemanticError::Timeout {
            operation: "embed",
            millis: params.embed_timeout.as_millis(),
        })??;

    if vectors.len() != texts.len() {
        return Err(SemanticError::EmbeddingShape {
            expected: texts.len(),
            got: vectors.len(),
        });
    }

    let query_vector = vectors.remove(0);

    let mut embeddings: HashMap<BlockId, Vec<f32>> = candidates
        .iter()
        .map(|b| b.id)
        .zip(vectors)
        .collect();

    let mut selection = Selection::default();

    // Candidate augmentation from the vector store, one search per
    // configured kind. Store trouble degrades augmentation, not the stage.
    let mut augmented: Vec<Block> = Vec::new();

    if let Some(store) = store {
        match fetch_neighbours(store, &params, &query_vector, current).await {
            Ok(pulled) => {
                let mut next_id = params.next_block_id;
                for record in pulled {
                    let mut block = Block::new(
                        BlockId::new(next_id),
                        record.kind,
                        record.content.clone(),
                        record.token_count,
                        record.source(),
                    );
                    block.priority = AUGMENTED_PRIORITY;
                    block.timestamp = 0;
                    next_id += 1;

                    embeddings.insert(block.id, record.embedding);
                    augmented.push(block);
                }
            }
            Err(err) => {
                log::warn!("vector-store augmentation skipped: {err}");
                selection.store_degraded = true;
            }
        }
    }

    let newest_timestamp = current.iter().map(|b| b.timestamp).max().unwrap_or(0);

    let score_ctx = ScoreContext::new(
        &query_text,
        &query_vector,
        newest_timestamp,
        config.recency_tau,
        &config.source_trust,
    );

    let all_candidates: Vec<&Block> = candidates
        .iter()
        .copied()
        .chain(augmented.iter())
        .collect();

    let mut scored: Vec<MmrCandidate> = Vec::with_capacity(all_candidates.len());

    for block in &all_candidates {
        let score = utility(block, embeddings.get(&block.id).map(Vec::as_slice), &score_ctx);

        if score < LOW_UTILITY_FLOOR {
            selection
                .dropped
                .push(DroppedBlock::of(block, DropReason::LowUtility));
            continue;
        }

        scored.push(MmrCandidate {
            id: block.id,
            utility: score,
            priority: block.priority,
            timestamp: block.timestamp,
        });
    }

    let ranking = mmr::rank(&scored, &embeddings, config.mmr_lambda);

    let by_id: HashMap<BlockId, &Block> =
        all_candidates.iter().map(|b| (b.id, *b)).collect();

    for id in &ranking.redundant {
        if let Some(block) = by_id.get(id) {
            selection
                .dropped
                .push(DroppedBlock::of(block, DropReason::MmrRedundant));
        }
    }

    let must_keep_tokens: usize = current
        .iter()
        .filter(|b| b.must_keep)
        .map(|b| b.token_count)
        .sum();

    let available = params
        .budget
        .saturating_sub(params.safety_margin)
        .saturating_sub(must_keep_tokens);

    let items: Vec<KnapsackItem> = ranking
        .ordered
        .iter()
        .filter_map(|id| by_id.get(id))
        .map(|block| KnapsackItem {
            id: block.id,
            kind: block.kind,
            tokens: block.token_count,
        })
        .collect();

    let packed = knapsack::pack(&items, available, &fractions_by_kind(config));

    for (id, reason) in packed.rejected {
        if let Some(block) = by_id.get(&id) {
            selection.dropped.push(DroppedBlock::of(block, reason));
        }
    }

    let accepted: BTreeSet<BlockId> = packed.accepted.into_iter().collect();

    selection.augmented = augmented
        .into_iter()
        .filter(|b| accepted.contains(&b.id))
        .collect();
    selection.accepted = accepted
        .into_iter()
        .filter(|id| candidates.iter().any(|b| b.id == *id))
        .collect();

    Ok(selection)
}

/// Concatenate the content of the last up-to-three user blocks, most recent
/// first, separated by single newlines.
fn query_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .rev()
        .filter(|b| b.kind == BlockKind::User)
        .take(QUERY_USER_BLOCKS)
        .map(|b| b.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-kind neighbour pull, deduplicated against the live conversation and
/// against itself by fingerprint.
async fn fetch_neighbours(
    store: &dyn VectorStore,
    params: &SelectionParams<'_>,
    query_vector: &[f32],
    current: &[Block],
) -> Result<Vec<crate::VectorRecord>, SemanticError> {
    let mut seen: BTreeSet<String> = current
        .iter()
        .map(|b| b.fingerprint.as_str().to_string())
        .collect();

    let mut pulled = Vec::new();

    for (kind_name, top_k) in &params.config.vector_topk {
        let Some(kind) = parse_kind(kind_name) else {
            log::warn!("vector_topk names unknown kind {kind_name}, ignoring");
            continue;
        };

        let records = timeout(
            params.config.search_timeout,
            store.ann_search(params.tenant, query_vector, *top_k, Some(kind)),
        )
        .await
        .map_err(|_| SemanticError::Timeout {
            operation: "ann_search",
            millis: params.config.search_timeout.as_millis(),
        })??;

        for record in records {
            if seen.insert(record.fingerprint.clone()) {
                pulled.push(record);
            }
        }
    }

    Ok(pulled)
}

fn parse_kind(name: &str) -> Option<BlockKind> {
    if name == "chat" {
        return Some(BlockKind::User);
    }
    BlockKind::from_str(name).ok()
}

/// Resolve configured fraction names to kinds, folding the `chat` alias
/// into `user`.
fn fractions_by_kind(config: &SemanticConfig) -> std::collections::BTreeMap<BlockKind, f32> {
    let mut fractions = std::collections::BTreeMap::new();

    for (name, fraction) in &config.type_fractions {
        let Some(kind) = parse_kind(name) else {
            log::warn!("type_fractions names unknown kind {name}, ignoring");
            continue;
        };
        *fractions.entry(kind).or_insert(0.0) += *fraction;
    }

    fractions
}
