use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Exact output cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether finalized outputs are cached at all.
    pub enabled: bool,
    /// How long a cached output stays valid.
    #[serde(deserialize_with = "deserialize_duration")]
    pub ttl: Duration,
    /// Maximum number of cached outputs held in memory.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            max_entries: 1024,
        }
    }
}
