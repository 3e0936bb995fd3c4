use std::collections::BTreeMap;

use blocks::{BlockId, BlockKind, DropReason};

/// One item offered to the knapsack, in MMR order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KnapsackItem {
    pub id: BlockId,
    pub kind: BlockKind,
    pub tokens: usize,
}

/// Packing result: accepted ids in offer order, rejected ids with reasons.
#[derive(Debug, Default)]
pub(crate) struct KnapsackOutcome {
    pub accepted: Vec<BlockId>,
    pub rejected: Vec<(BlockId, DropReason)>,
}

/// Greedy per-kind budget packing.
///
/// The available budget is split into per-kind sub-budgets by the
/// configured fractions; rounding remainder and the share of kinds without
/// a fraction pool into a shared overflow. Items are taken in the given
/// (MMR) order; an item fits if its kind's remaining sub-budget plus the
/// overflow covers it, debiting the sub-budget first.
pub(crate) fn pack(
    items: &[KnapsackItem],
    available: usize,
    fractions: &BTreeMap<BlockKind, f32>,
) -> KnapsackOutcome {
    let mut sub_budgets: BTreeMap<BlockKind, usize> = fractions
        .iter()
        .map(|(kind, fraction)| (*kind, (available as f32 * fraction) as usize))
        .collect();

    let allocated: usize = sub_budgets.values().sum();
    let mut overflow = available.saturating_sub(allocated);

    let mut outcome = KnapsackOutcome::default();

    for item in items {
        let sub = sub_budgets.get_mut(&item.kind);
        let sub_remaining = sub.as_deref().copied().unwrap_or(0);

        if item.tokens <= sub_remaining + overflow {
            let from_sub = item.tokens.min(sub_remaining);
            if let Some(sub) = sub {
                *sub -= from_sub;
            }
            overflow -= item.tokens - from_sub;
            outcome.accepted.push(item.id);
        } else {
            let reason = if fractions.get(&item.kind).copied().unwrap_or(0.0) == 0.0 {
                DropReason::KindCap
            } else {
                DropReason::OverBudget
            };
            outcome.rejected.push((item.id, reason));
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, kind: BlockKind, tokens: usize) -> KnapsackItem {
        KnapsackItem {
            id: BlockId::new(id),
            kind,
            tokens,
        }
    }

    fn seqs(ids: &[BlockId]) -> Vec<u64> {
        ids.iter().map(|id| id.seq()).collect()
    }

    #[test]
    fn packs_within_a_single_kind_budget() {
        let fractions = BTreeMap::from([(BlockKind::Doc, 1.0)]);
        let items = vec![
            item(1, BlockKind::Doc, 20),
            item(2, BlockKind::Doc, 20),
            item(3, BlockKind::Doc, 20),
        ];

        let outcome = pack(&items, 45, &fractions);
        assert_eq!(seqs(&outcome.accepted), [1, 2]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0], (BlockId::new(3), DropReason::OverBudget));
    }

    #[test]
    fn overflow_absorbs_rounding_and_unlisted_kinds() {
        // doc gets 50% of 100, the other 50 tokens pool into overflow since
        // no other kind has a fraction.
        let fractions = BTreeMap::from([(BlockKind::Doc, 0.5)]);
        let items = vec![item(1, BlockKind::Doc, 70), item(2, BlockKind::Tool, 30)];

        let outcome = pack(&items, 100, &fractions);
        // doc: 50 from its sub-budget, 20 from overflow; tool: the last 30
        // of overflow, since its own sub-budget is zero.
        assert_eq!(seqs(&outcome.accepted), [1, 2]);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn kinds_without_fraction_report_kind_cap() {
        let fractions = BTreeMap::from([(BlockKind::Doc, 1.0)]);
        let items = vec![item(1, BlockKind::Doc, 90), item(2, BlockKind::Tool, 30)];

        let outcome = pack(&items, 100, &fractions);
        assert_eq!(seqs(&outcome.accepted), [1]);
        assert_eq!(outcome.rejected[0], (BlockId::new(2), DropReason::KindCap));
    }

    #[test]
    fn later_small_items_still_fit() {
        let fractions = BTreeMap::from([(BlockKind::Doc, 1.0)]);
        let items = vec![
            item(1, BlockKind::Doc, 80),
            item(2, BlockKind::Doc, 50),
            item(3, BlockKind::Doc, 15),
        ];

        let outcome = pack(&items, 100, &fractions);
        assert_eq!(seqs(&outcome.accepted), [1, 3]);
        assert_eq!(outcome.rejected[0], (BlockId::new(2), DropReason::OverBudget));
    }
}
