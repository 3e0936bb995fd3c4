use thiserror::Error;

/// The only failures a caller can observe.
///
/// Collaborator trouble (cache, embedding, vector store, compressor) never
/// surfaces here; those degrade the run and are noted in stats.
#[derive(Debug, Error)]
pub enum Error {
    /// The request was malformed; the pipeline did not run.
    #[error("invalid request ({code}): {reason}")]
    InputInvalid {
        /// Stable machine-readable code.
        code: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// A post-condition still failed after the last fallback state. The
    /// caller must not forward anything to the provider.
    #[error("validation failed after exhausting fallbacks ({failed}), trace {trace_id}")]
    ValidationFailed {
        /// The post-conditions that failed, comma separated.
        failed: String,
        /// Correlation id for logs.
        trace_id: String,
    },
}

impl Error {
    pub(crate) fn input(code: &'static str, reason: impl Into<String>) -> Self {
        Self::InputInvalid {
            code,
            reason: reason.into(),
        }
    }
}
