use std::collections::BTreeMap;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Semantic selection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SemanticConfig {
    /// Whether the semantic selection stage runs when a request is over
    /// budget after the heuristics.
    pub enabled: bool,
    /// How many vector-store neighbours to pull per block kind when
    /// augmenting the candidate set. Keys are block kind names.
    pub vector_topk: BTreeMap<String, usize>,
    /// Relevance/diversity trade-off for MMR re-ranking, in `[0, 1]`.
    /// 1.0 selects purely by utility, 0.0 purely by diversity.
    pub mmr_lambda: f32,
    /// Recency decay constant, measured in block positions.
    pub recency_tau: f32,
    /// Per-kind share of the available budget. Values must sum to 1.0.
    /// The key `chat` is accepted as an alias for `user`.
    pub type_fractions: BTreeMap<String, f32>,
    /// Trust score per provenance tag, in `[0, 1]`. Unlisted sources
    /// score 0.5.
    pub source_trust: BTreeMap<String, f32>,
    /// Bound on a single vector-store search.
    #[serde(deserialize_with = "deserialize_duration")]
    pub search_timeout: Duration,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vector_topk: BTreeMap::from([("doc".to_string(), 8), ("assistant".to_string(), 4)]),
            mmr_lambda: 0.7,
            recency_tau: 8.0,
            type_fractions: BTreeMap::from([
                ("doc".to_string(), 0.4),
                ("assistant".to_string(), 0.3),
                ("tool".to_string(), 0.2),
                ("user".to_string(), 0.1),
            ]),
            source_trust: BTreeMap::new(),
            search_timeout: Duration::from_secs(2),
        }
    }
}
