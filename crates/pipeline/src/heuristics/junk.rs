use blocks::{Block, BlockKind, DropReason, DroppedBlock, normalize};
use config::HeuristicsConfig;

use super::HeuristicsReport;
use super::turns::last_turns_cutoff;

/// Drop assistant blocks older than the kept turns whose normalized content
/// is empty or matches a junk pattern. Recent turns are left alone even
/// when they match: the model may still be referring back to them.
pub(crate) fn apply(
    blocks: &mut Vec<Block>,
    config: &HeuristicsConfig,
    report: &mut HeuristicsReport,
) {
    let cutoff = last_turns_cutoff(blocks, config.keep_last_n_turns);

    blocks.retain(|block| {
        if block.must_keep || block.kind != BlockKind::Assistant || block.timestamp >= cutoff {
            return true;
        }

        let is_junk = normalize(&block.content).is_empty()
            || config.junk_patterns.iter().any(|p| p.is_match(&block.content));

        if is_junk {
            log::debug!("junk removal dropped {} ({})", block.id, block.source);
            report.dropped.push(DroppedBlock::of(block, DropReason::Junk));
            report.changed = true;
            return false;
        }

        true
    });
}

#[cfg(test)]
mod tests {
    use config::HeuristicsConfig;

    use super::*;
    use crate::heuristics::testing::block;

    fn config(patterns: &[&str], keep_last_n_turns: usize) -> HeuristicsConfig {
        let patterns = patterns
            .iter()
            .map(|p| format!("{p:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!("keep_last_n_turns = {keep_last_n_turns}\njunk_patterns = [{patterns}]");
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn drops_matching_assistant_blocks_outside_kept_turns() {
        let mut blocks = vec![
            block(0, BlockKind::User, "question one"),
            block(1, BlockKind::Assistant, "Sure, I can help."),
            block(2, BlockKind::User, "question two"),
            block(3, BlockKind::Assistant, "A real answer."),
        ];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(&["^Sure[,.!]"], 1), &mut report);

        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.content != "Sure, I can help."));
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].reason, DropReason::Junk);
    }

    #[test]
    fn recent_turns_are_protected() {
        let mut blocks = vec![
            block(0, BlockKind::User, "question"),
            block(1, BlockKind::Assistant, "Sure, I can help."),
        ];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(&["^Sure[,.!]"], 1), &mut report);

        assert_eq!(blocks.len(), 2, "the only turn is the kept turn");
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn empty_assistant_blocks_are_junk() {
        let mut blocks = vec![
            block(0, BlockKind::User, "question one"),
            block(1, BlockKind::Assistant, "   \n  "),
            block(2, BlockKind::User, "question two"),
        ];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(&[], 1), &mut report);

        assert_eq!(blocks.len(), 2);
        assert_eq!(report.dropped.len(), 1);
    }

    #[test]
    fn non_assistant_blocks_are_untouched() {
        let mut blocks = vec![
            block(0, BlockKind::Doc, "Sure, I can help."),
            block(1, BlockKind::User, "question"),
        ];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(&["^Sure[,.!]"], 1), &mut report);

        assert_eq!(blocks.len(), 2);
    }
}
