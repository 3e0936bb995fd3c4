use std::collections::HashMap;

use blocks::{Block, DropReason, DroppedBlock, Fingerprint};
use config::HeuristicsConfig;

use super::HeuristicsReport;

/// Drop older copies of repeated content. Non-`must_keep` blocks are
/// grouped by fingerprint and only the most recent of each group survives;
/// the relative order of survivors is unchanged.
pub(crate) fn apply(
    blocks: &mut Vec<Block>,
    config: &HeuristicsConfig,
    report: &mut HeuristicsReport,
) {
    let group_key = |block: &Block| -> String {
        if config.dedupe_normalize.is_normalizing() {
            block.fingerprint.as_str().to_string()
        } else {
            // Byte-exact grouping when normalization is configured off.
            Fingerprint::exact(&block.content).as_str().to_string()
        }
    };

    let mut newest: HashMap<String, u64> = HashMap::new();

    for block in blocks.iter().filter(|b| !b.must_keep) {
        let entry = newest.entry(group_key(block)).or_insert(block.timestamp);
        *entry = (*entry).max(block.timestamp);
    }

    blocks.retain(|block| {
        if block.must_keep {
            return true;
        }

        let keep = newest
            .get(&group_key(block))
            .is_none_or(|winner| *winner == block.timestamp);

        if !keep {
            log::debug!("deduplication dropped {} ({})", block.id, block.source);
            report.dropped.push(DroppedBlock::of(block, DropReason::Duplicate));
            report.changed = true;
        }

        keep
    });
}

#[cfg(test)]
mod tests {
    use blocks::BlockKind;

    use super::*;
    use crate::heuristics::testing::block;

    #[test]
    fn keeps_the_most_recent_duplicate() {
        let mut blocks = vec![
            block(0, BlockKind::User, "Hello"),
            block(1, BlockKind::Assistant, "answer"),
            block(2, BlockKind::User, "hello"),
        ];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &HeuristicsConfig::default(), &mut report);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].timestamp, 2, "newest copy wins");
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].reason, DropReason::Duplicate);
    }

    #[test]
    fn must_keep_copies_are_never_dropped() {
        let mut first = block(0, BlockKind::User, "Hello");
        first.must_keep = true;
        let mut blocks = vec![first, block(1, BlockKind::User, "hello")];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &HeuristicsConfig::default(), &mut report);

        // The must-keep copy is outside the grouping entirely, so the later
        // copy also stays as the sole member of its group.
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn exact_mode_distinguishes_case() {
        let mut blocks = vec![
            block(0, BlockKind::User, "Hello"),
            block(1, BlockKind::User, "hello"),
        ];

        let config: HeuristicsConfig =
            toml::from_str("dedupe_normalize = { lowercase = false }").unwrap();

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config, &mut report);

        assert_eq!(blocks.len(), 2);
        assert!(report.dropped.is_empty());
    }
}
