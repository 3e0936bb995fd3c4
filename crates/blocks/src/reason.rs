use serde::{Deserialize, Serialize};

use crate::{BlockId, BlockKind};

/// Why a block was removed from the pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DropReason {
    /// Normalized content was empty or matched a junk pattern.
    Junk,
    /// Another block with the same fingerprint survived.
    Duplicate,
    /// Tool schema not present in the configured allowlist.
    ToolNotAllowed,
    /// Did not fit the remaining token budget.
    OverBudget,
    /// Utility score below the selection floor.
    LowUtility,
    /// Too similar to an already selected block.
    MmrRedundant,
    /// The per-kind budget for this block's kind is zero.
    KindCap,
    /// Shed by the minimal-safe fallback.
    FallbackMinimal,
}

/// Record of a removed block, reported to the caller in the run result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedBlock {
    /// Id the block had in this run.
    pub id: BlockId,
    /// Kind of the removed block.
    pub kind: BlockKind,
    /// Token count at the moment of removal.
    pub tokens: usize,
    /// Why it was removed.
    pub reason: DropReason,
}

impl DroppedBlock {
    /// Convenience constructor from a block being dropped.
    pub fn of(block: &crate::Block, reason: DropReason) -> Self {
        Self {
            id: block.id,
            kind: block.kind,
            tokens: block.token_count,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_render_kebab_case() {
        assert_eq!(DropReason::OverBudget.to_string(), "over-budget");
        assert_eq!(DropReason::MmrRedundant.to_string(), "mmr-redundant");
        assert_eq!(DropReason::ToolNotAllowed.to_string(), "tool-not-allowed");
    }
}
