use thiserror::Error;

/// Failures of the semantic collaborators.
///
/// None of these fail a pipeline run: the orchestrator logs them, skips the
/// stage (or the augmentation) and notes the degradation in stats.
#[derive(Debug, Error)]
pub enum SemanticError {
    /// The embedding service could not produce vectors.
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The embedding service answered with the wrong shape.
    #[error("embedding service returned {got} vectors for {expected} inputs")]
    EmbeddingShape {
        /// Number of input texts.
        expected: usize,
        /// Number of vectors returned.
        got: usize,
    },

    /// The vector store could not serve a search.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// An external call exceeded its configured bound.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// The call that timed out.
        operation: &'static str,
        /// The configured bound.
        millis: u128,
    },
}
