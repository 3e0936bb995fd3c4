use std::collections::BTreeMap;

use serde::Deserialize;

/// Token counting settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Model-name prefix to tiktoken encoding name, consulted before the
    /// built-in model table. Useful for self-hosted or renamed models.
    pub model_map: BTreeMap<String, String>,
}
