use serde::{Deserialize, Serialize};

/// Wall-clock milliseconds spent per stage. Stages that did not run report
/// zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Request validation and canonicalization.
    pub canonicalize: f64,
    /// The deterministic heuristic transforms.
    pub heuristics: f64,
    /// Cache lookup (and store, on a miss).
    pub cache: f64,
    /// Semantic selection including embedding and store calls.
    pub semantic: f64,
    /// Compression including compressor calls.
    pub compression: f64,
    /// Validation and any fallback repair.
    pub validate: f64,
}

/// Optimization statistics returned with every successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeStats {
    /// Token total after canonicalization, before any optimization.
    pub tokens_before: usize,
    /// Token total of the returned blocks.
    pub tokens_after: usize,
    /// `tokens_before - tokens_after`.
    pub tokens_saved: usize,
    /// `1 - tokens_after / tokens_before`, zero for empty input.
    pub compression_ratio: f32,
    /// Which stages materially modified the output.
    pub route: String,
    /// True when a cached output was returned.
    pub cache_hit: bool,
    /// True when validation left the initial state at least once.
    pub fallback_used: bool,
    /// End-to-end wall-clock time.
    pub latency_ms: f64,
    /// Per-stage wall-clock time.
    pub stage_timings_ms: StageTimings,
    /// Weakest faithfulness among accepted compressions, absent when
    /// nothing was compressed.
    pub faithfulness_score: Option<f32>,
    /// True when token counting fell back to the approximation.
    pub tokenizer_fallback: bool,
    /// Collaborators that were skipped after errors or timeouts.
    pub degraded: Vec<String>,
    /// Fallback transitions taken, e.g. `F0:V4 -> F1`.
    pub fallback_path: Vec<String>,
}

/// Route label from the stages that materially changed the block list.
pub(crate) fn route_label(
    cache_hit: bool,
    semantic: bool,
    compression: bool,
    fallback: bool,
) -> String {
    if cache_hit {
        return "heuristic+cache-hit".to_string();
    }

    let mut route = String::from("heuristic");

    if semantic {
        route.push_str("+semantic");
    }

    if compression {
        route.push_str("+compression");
    }

    if fallback {
        route.push_str("+fallback");
    }

    route
}

/// `1 - after / before`, guarding the empty-input division.
pub(crate) fn compression_ratio(tokens_before: usize, tokens_after: usize) -> f32 {
    if tokens_before == 0 {
        return 0.0;
    }

    1.0 - tokens_after as f32 / tokens_before as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_labels() {
        assert_eq!(route_label(false, false, false, false), "heuristic");
        assert_eq!(route_label(true, true, true, false), "heuristic+cache-hit");
        assert_eq!(route_label(false, true, false, false), "heuristic+semantic");
        assert_eq!(
            route_label(false, true, true, true),
            "heuristic+semantic+compression+fallback"
        );
    }

    #[test]
    fn ratio_handles_empty_input() {
        assert_eq!(compression_ratio(0, 0), 0.0);
        assert!((compression_ratio(100, 25) - 0.75).abs() < 1e-6);
    }
}
