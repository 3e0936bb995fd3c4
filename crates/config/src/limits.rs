use serde::Deserialize;

/// Token budget settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Upper bound on output tokens. A per-request override takes precedence.
    pub target_budget_tokens: usize,
    /// Subtracted from the budget before packing, as headroom against
    /// tokenizer drift between this service and the provider.
    pub safety_margin_tokens: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            target_budget_tokens: 4096,
            safety_margin_tokens: 64,
        }
    }
}
