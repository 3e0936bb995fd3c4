use std::borrow::Cow;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Settings for the deterministic heuristic transforms.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicsConfig {
    /// Number of most recent conversation turns that are always kept.
    pub keep_last_n_turns: usize,
    /// Patterns identifying filler assistant output; matching blocks outside
    /// the kept turns are dropped.
    pub junk_patterns: Vec<JunkPattern>,
    /// Normalization applied before grouping blocks for deduplication.
    pub dedupe_normalize: DedupeNormalize,
    /// Tool names to keep. Empty, or a list containing `*`, keeps all.
    pub tool_allowlist: Vec<String>,
    /// Maximum records kept when compacting a uniform JSON array.
    pub json_truncate_items: usize,
    /// JSON arrays shorter than this many characters are left alone.
    pub json_truncate_chars: usize,
    /// Lines kept around each error line when trimming log output.
    pub log_error_window_lines: usize,
    /// Lines kept from the end of trimmed log output.
    pub log_tail_lines: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            keep_last_n_turns: 2,
            junk_patterns: Vec::new(),
            dedupe_normalize: DedupeNormalize::default(),
            tool_allowlist: Vec::new(),
            json_truncate_items: 20,
            json_truncate_chars: 2000,
            log_error_window_lines: 2,
            log_tail_lines: 10,
        }
    }
}

impl HeuristicsConfig {
    /// Whether the allowlist restricts tool schemas at all.
    pub fn restricts_tools(&self) -> bool {
        !self.tool_allowlist.is_empty() && !self.tool_allowlist.iter().any(|name| name == "*")
    }
}

/// Normalization flags used when grouping blocks for deduplication.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupeNormalize {
    /// Lowercase content before comparing.
    pub lowercase: bool,
    /// Collapse whitespace runs before comparing.
    pub collapse_whitespace: bool,
}

impl Default for DedupeNormalize {
    fn default() -> Self {
        Self {
            lowercase: true,
            collapse_whitespace: true,
        }
    }
}

impl DedupeNormalize {
    /// Whether the full normalization rule is in effect.
    pub fn is_normalizing(&self) -> bool {
        self.lowercase && self.collapse_whitespace
    }
}

/// A validated junk pattern, matched against a block's whole content.
#[derive(Clone)]
pub struct JunkPattern {
    regex: Regex,
}

impl JunkPattern {
    fn new(pattern: &str) -> Result<Self, String> {
        let trimmed = pattern.trim();

        if trimmed.is_empty() {
            return Err("junk pattern cannot be empty".to_string());
        }

        let regex = Regex::new(trimmed).map_err(|err| format!("invalid junk pattern: {err}"))?;

        Ok(Self { regex })
    }

    /// Return the original pattern string.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Check whether the supplied content matches the pattern.
    pub fn is_match(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }
}

impl fmt::Debug for JunkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JunkPattern").field(&self.pattern()).finish()
    }
}

impl<'de> Deserialize<'de> for JunkPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = Cow::<'de, str>::deserialize(deserializer)?;
        JunkPattern::new(pattern.as_ref()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junk_patterns_validate_on_deserialize() {
        let config: HeuristicsConfig =
            toml::from_str(r#"junk_patterns = ["^(Sure|Of course)\\."]"#).unwrap();
        assert!(config.junk_patterns[0].is_match("Sure. Happy to help."));
        assert!(!config.junk_patterns[0].is_match("The answer is 42."));

        let err = toml::from_str::<HeuristicsConfig>(r#"junk_patterns = ["("]"#).unwrap_err();
        assert!(err.to_string().contains("invalid junk pattern"));
    }

    #[test]
    fn allowlist_wildcard_disables_restriction() {
        let none: HeuristicsConfig = toml::from_str("").unwrap();
        assert!(!none.restricts_tools());

        let starred: HeuristicsConfig = toml::from_str(r#"tool_allowlist = ["*"]"#).unwrap();
        assert!(!starred.restricts_tools());

        let named: HeuristicsConfig = toml::from_str(r#"tool_allowlist = ["search"]"#).unwrap();
        assert!(named.restricts_tools());
    }
}
