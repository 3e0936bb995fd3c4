//! Trimtab configuration structures to map the trimtab.toml configuration.

#![deny(missing_docs)]

mod cache;
mod compression;
mod embedding;
mod heuristics;
mod limits;
mod loader;
mod semantic;
mod tokenizer;

use std::path::Path;

pub use cache::CacheConfig;
pub use compression::CompressionConfig;
pub use embedding::EmbeddingConfig;
pub use heuristics::{DedupeNormalize, HeuristicsConfig, JunkPattern};
pub use limits::LimitsConfig;
pub use semantic::SemanticConfig;
use serde::Deserialize;
pub use tokenizer::TokenizerConfig;

/// Main configuration structure for one optimization deployment.
///
/// The pipeline treats a `Config` as immutable for the duration of a run;
/// fallback states that need to widen options clone it first.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Token budget and safety margin.
    pub limits: LimitsConfig,
    /// Deterministic heuristic transform settings.
    pub heuristics: HeuristicsConfig,
    /// Exact output cache settings.
    pub cache: CacheConfig,
    /// Semantic selection settings.
    pub semantic: SemanticConfig,
    /// Embedding service settings.
    pub embedding: EmbeddingConfig,
    /// Learned/extractive compression settings.
    pub compression: CompressionConfig,
    /// Token counting settings.
    pub tokenizer: TokenizerConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates cross-field consistency of the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }

    /// Canonical description of every option that affects pipeline output,
    /// used as cache key material. Options that only affect performance
    /// (timeouts, cache sizing) are deliberately absent.
    pub fn output_fingerprint(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let limits = &self.limits;
        let h = &self.heuristics;
        let s = &self.semantic;
        let c = &self.compression;

        let _ = write!(
            out,
            "budget={};margin={};turns={};junk={:?};dedupe={}/{};tools={:?};json={}/{};log={}/{};",
            limits.target_budget_tokens,
            limits.safety_margin_tokens,
            h.keep_last_n_turns,
            h.junk_patterns.iter().map(JunkPattern::pattern).collect::<Vec<_>>(),
            h.dedupe_normalize.lowercase,
            h.dedupe_normalize.collapse_whitespace,
            h.tool_allowlist,
            h.json_truncate_items,
            h.json_truncate_chars,
            h.log_error_window_lines,
            h.log_tail_lines,
        );

        let _ = write!(
            out,
            "semantic={};topk={:?};lambda={};tau={};fractions={:?};trust={:?};",
            s.enabled, s.vector_topk, s.mmr_lambda, s.recency_tau, s.type_fractions, s.source_trust,
        );

        let _ = write!(
            out,
            "compression={};ratio={};faithfulness={};embedding={}/{}",
            c.enabled, c.ratio, c.faithfulness_threshold, self.embedding.model, self.embedding.dimensions,
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            limits: LimitsConfig {
                target_budget_tokens: 4096,
                safety_margin_tokens: 64,
            },
            heuristics: HeuristicsConfig {
                keep_last_n_turns: 2,
                junk_patterns: [],
                dedupe_normalize: DedupeNormalize {
                    lowercase: true,
                    collapse_whitespace: true,
                },
                tool_allowlist: [],
                json_truncate_items: 20,
                json_truncate_chars: 2000,
                log_error_window_lines: 2,
                log_tail_lines: 10,
            },
            cache: CacheConfig {
                enabled: true,
                ttl: 300s,
                max_entries: 1024,
            },
            semantic: SemanticConfig {
                enabled: true,
                vector_topk: {
                    "assistant": 4,
                    "doc": 8,
                },
                mmr_lambda: 0.7,
                recency_tau: 8.0,
                type_fractions: {
                    "assistant": 0.3,
                    "doc": 0.4,
                    "tool": 0.2,
                    "user": 0.1,
                },
                source_trust: {},
                search_timeout: 2s,
            },
            embedding: EmbeddingConfig {
                model: "text-embedding-3-small",
                dimensions: 1536,
                base_url: None,
                api_key: None,
                timeout: 10s,
            },
            compression: CompressionConfig {
                enabled: true,
                ratio: 0.5,
                faithfulness_threshold: 0.85,
                timeout: 5s,
            },
            tokenizer: TokenizerConfig {
                model_map: {},
            },
        }
        "#);
    }

    #[test]
    fn output_fingerprint_ignores_timing_options() {
        let a: Config = toml::from_str("").unwrap();
        let b: Config = toml::from_str("[cache]\nttl = \"60s\"\n[embedding]\ntimeout = \"1s\"").unwrap();
        assert_eq!(a.output_fingerprint(), b.output_fingerprint());

        let c: Config = toml::from_str("[limits]\ntarget_budget_tokens = 512").unwrap();
        assert_ne!(a.output_fingerprint(), c.output_fingerprint());
    }
}
