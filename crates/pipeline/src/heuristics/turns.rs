use blocks::Block;

/// Timestamp cutoff of the last `n` conversation turns: blocks at or above
/// it belong to the kept window. A turn starts at a user block and runs
/// until the next one. With fewer than `n` turns everything conversational
/// is inside the window; with `n` of zero nothing is.
pub(crate) fn last_turns_cutoff(blocks: &[Block], n: usize) -> u64 {
    if n == 0 {
        return u64::MAX;
    }

    let user_timestamps: Vec<u64> = blocks
        .iter()
        .filter(|b| b.kind == blocks::BlockKind::User)
        .map(|b| b.timestamp)
        .collect();

    if user_timestamps.len() <= n {
        return 0;
    }

    user_timestamps[user_timestamps.len() - n]
}

/// Mark every conversational block in the last `n` turns as `must_keep`.
/// Returns true when any block was newly marked.
pub(crate) fn mark_last_turns(blocks: &mut [Block], n: usize) -> bool {
    let cutoff = last_turns_cutoff(blocks, n);
    let mut changed = false;

    for block in blocks.iter_mut() {
        if block.kind.is_conversational() && block.timestamp >= cutoff && !block.must_keep {
            block.must_keep = true;
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use blocks::BlockKind;

    use super::*;
    use crate::heuristics::testing::block;

    fn conversation() -> Vec<Block> {
        vec![
            block(0, BlockKind::System, "system"),
            block(1, BlockKind::User, "first question"),
            block(2, BlockKind::Assistant, "first answer"),
            block(3, BlockKind::User, "second question"),
            block(4, BlockKind::Assistant, "second answer"),
            block(5, BlockKind::User, "third question"),
        ]
    }

    #[test]
    fn cutoff_is_the_nth_last_user_block() {
        let blocks = conversation();
        assert_eq!(last_turns_cutoff(&blocks, 1), 5);
        assert_eq!(last_turns_cutoff(&blocks, 2), 3);
        assert_eq!(last_turns_cutoff(&blocks, 3), 0);
        assert_eq!(last_turns_cutoff(&blocks, 10), 0);
        assert_eq!(last_turns_cutoff(&blocks, 0), u64::MAX);
    }

    #[test]
    fn marks_only_the_kept_window() {
        let mut blocks = conversation();
        assert!(mark_last_turns(&mut blocks, 2));

        let kept: Vec<bool> = blocks.iter().map(|b| b.must_keep).collect();
        // The system block is not conversational; turns two and three are
        // inside the window.
        assert_eq!(kept, [false, false, false, true, true, true]);
    }

    #[test]
    fn marking_is_idempotent() {
        let mut blocks = conversation();
        assert!(mark_last_turns(&mut blocks, 2));
        assert!(!mark_last_turns(&mut blocks, 2));
    }
}
