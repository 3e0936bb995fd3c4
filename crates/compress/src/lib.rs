//! Token-level block compression behind a faithfulness gate.
//!
//! The learned compressor is an external collaborator injected through the
//! [`Compressor`] trait; when it is absent, fails or times out, the bundled
//! [`ExtractiveCompressor`] takes over. Either way, a candidate replaces a
//! block only if the faithfulness gate accepts it: the score must clear the
//! configured threshold and the candidate must actually be smaller.

mod error;
mod extractive;
mod faithfulness;
mod gate;

use async_trait::async_trait;

pub use error::CompressError;
pub use extractive::ExtractiveCompressor;
pub use faithfulness::score as faithfulness_score;
pub use gate::{FORCE_PRESERVE, GateConfig, GateOutcome, compress_blocks};

/// Output of one compression call.
#[derive(Debug, Clone)]
pub struct CompressorOutput {
    /// The compressed text.
    pub text: String,
    /// Token count as estimated by the compressor. The gate recounts with
    /// the target model's tokenizer before accepting.
    pub token_count: usize,
}

/// Contract of a token-level compressor.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress `text` towards `ratio` of its original token count,
    /// preserving every token listed in `force_preserve`.
    async fn compress(
        &self,
        text: &str,
        ratio: f32,
        force_preserve: &[&str],
    ) -> Result<CompressorOutput, CompressError>;
}
