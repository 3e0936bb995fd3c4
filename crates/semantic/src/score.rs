use std::collections::BTreeMap;
use std::collections::BTreeSet;

use blocks::{Block, signals};

use crate::similarity::cosine;

/// Factor weights of the utility score. They sum to 1.0 so the score stays
/// in `[0, 1]`.
const WEIGHT_SIMILARITY: f32 = 0.40;
const WEIGHT_RECENCY: f32 = 0.20;
const WEIGHT_CONSTRAINTS: f32 = 0.15;
const WEIGHT_IDENTIFIERS: f32 = 0.10;
const WEIGHT_SOURCE_TRUST: f32 = 0.10;
const WEIGHT_ENTITIES: f32 = 0.05;

const DEFAULT_SOURCE_TRUST: f32 = 0.5;

/// Shared inputs of the utility score, built once per selection.
pub struct ScoreContext<'a> {
    /// Unit-norm embedding of the query.
    pub query_vector: &'a [f32],
    /// Entity-like tokens of the query text.
    pub query_entities: BTreeSet<String>,
    /// Timestamp of the newest block in the run.
    pub newest_timestamp: u64,
    /// Recency decay constant in block positions.
    pub recency_tau: f32,
    /// Trust per provenance tag; unlisted sources score the default.
    pub source_trust: &'a BTreeMap<String, f32>,
}

impl<'a> ScoreContext<'a> {
    /// Build a context from the query text and its embedding.
    pub fn new(
        query_text: &str,
        query_vector: &'a [f32],
        newest_timestamp: u64,
        recency_tau: f32,
        source_trust: &'a BTreeMap<String, f32>,
    ) -> Self {
        Self {
            query_vector,
            query_entities: signals::entity_tokens(query_text),
            newest_timestamp,
            recency_tau,
            source_trust,
        }
    }

    fn trust(&self, source: &str) -> f32 {
        self.source_trust
            .get(source)
            .copied()
            .unwrap_or(DEFAULT_SOURCE_TRUST)
            .clamp(0.0, 1.0)
    }
}

/// Multi-factor utility of one candidate block.
///
/// Weighted sum of similarity to the query, recency, constraint keyword
/// density, identifier density, source trust and entity overlap with the
/// query, each factor clamped to `[0, 1]`.
pub fn utility(block: &Block, embedding: Option<&[f32]>, ctx: &ScoreContext<'_>) -> f32 {
    let similarity = embedding
        .map(|v| cosine(ctx.query_vector, v).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    let delta = ctx.newest_timestamp.saturating_sub(block.timestamp) as f32;
    let recency = (-delta / ctx.recency_tau).exp();

    let constraints = (signals::constraint_hits(&block.content) as f32 / 3.0).min(1.0);

    let identifiers = (signals::identifier_tokens(&block.content).len() as f32 / 5.0).min(1.0);

    let trust = ctx.trust(&block.source);

    let entities = signals::jaccard(&signals::entity_tokens(&block.content), &ctx.query_entities);

    WEIGHT_SIMILARITY * similarity
        + WEIGHT_RECENCY * recency
        + WEIGHT_CONSTRAINTS * constraints
        + WEIGHT_IDENTIFIERS * identifiers
        + WEIGHT_SOURCE_TRUST * trust
        + WEIGHT_ENTITIES * entities
}
