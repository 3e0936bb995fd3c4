use thiserror::Error;

/// Failures of a compressor backend. The gate logs them and falls back to
/// the extractive summarizer; they never fail a run.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The compressor service could not be reached or answered badly.
    #[error("compressor unavailable: {0}")]
    Unavailable(String),

    /// The compressor exceeded its configured bound.
    #[error("compressor timed out after {millis}ms")]
    Timeout {
        /// The configured bound.
        millis: u128,
    },
}
