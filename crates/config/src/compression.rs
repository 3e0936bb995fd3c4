use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Compression stage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Whether the compression stage runs when a request is still over
    /// budget after semantic selection.
    pub enabled: bool,
    /// Target compressed-to-original token ratio per block.
    pub ratio: f32,
    /// Minimum faithfulness score for a compressed candidate to be accepted.
    pub faithfulness_threshold: f32,
    /// Bound on a single learned-compressor call.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio: 0.5,
            faithfulness_threshold: 0.85,
            timeout: Duration::from_secs(5),
        }
    }
}
