use std::time::Duration;

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Embedding service settings.
///
/// When `base_url` is unset no remote embedder is constructed and the
/// semantic stage only runs if the embedding application injected its own
/// implementation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Embedding model identifier sent to the service.
    pub model: String,
    /// Dimensionality of the vectors the service returns. Fixed per
    /// deployment; the vector store schema depends on it.
    pub dimensions: usize,
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    pub base_url: Option<Url>,
    /// API key for the embeddings endpoint.
    pub api_key: Option<SecretString>,
    /// Bound on a single embedding call. The first call may additionally pay
    /// a model load; it is bounded by the same value.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}
