use blocks::{Block, BlockKind, total_tokens};

/// The post-conditions checked after all transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PostCondition {
    /// V1: a system block must survive when the input had one.
    #[strum(serialize = "V1")]
    SystemPresent,
    /// V2: a user block must survive.
    #[strum(serialize = "V2")]
    UserPresent,
    /// V3: every extracted constraint block must survive verbatim.
    #[strum(serialize = "V3")]
    ConstraintsIntact,
    /// V4: the output must fit the budget.
    #[strum(serialize = "V4")]
    WithinBudget,
    /// V5: every originally `must_keep` block must survive verbatim.
    #[strum(serialize = "V5")]
    MustKeepIntact,
}

impl PostCondition {
    /// Whether a failure of this condition means content went missing,
    /// which the fallback repairs by restoring blocks (F2) rather than by
    /// undoing compression (F1).
    pub(crate) fn is_content_loss(self) -> bool {
        !matches!(self, Self::WithinBudget)
    }
}

/// What validation measures the output against, captured before the
/// budget-driven stages run.
#[derive(Debug, Clone)]
pub(crate) struct ValidationSpec {
    /// Whether the canonicalized input had a system block.
    pub had_system: bool,
    /// Contents of every constraint block created by extraction.
    pub constraint_contents: Vec<String>,
    /// Contents of the blocks the canonicalizer marked `must_keep`.
    pub must_keep_contents: Vec<String>,
    /// The effective token budget.
    pub budget: usize,
}

impl ValidationSpec {
    /// Capture the spec from the post-heuristics snapshot. `must_keep`
    /// contents come from the canonicalizer's assignment, passed in
    /// separately because heuristics widen the `must_keep` set afterwards.
    pub fn capture(snapshot: &[Block], canonical_must_keep: Vec<String>, budget: usize) -> Self {
        Self {
            had_system: snapshot.iter().any(|b| b.kind == BlockKind::System),
            constraint_contents: snapshot
                .iter()
                .filter(|b| b.kind == BlockKind::Constraint)
                .map(|b| b.content.clone())
                .collect(),
            must_keep_contents: canonical_must_keep,
            budget,
        }
    }
}

/// Check every post-condition, returning the ones that failed.
pub(crate) fn check(blocks: &[Block], spec: &ValidationSpec) -> Vec<PostCondition> {
    let mut failed = Vec::new();

    if spec.had_system && !blocks.iter().any(|b| b.kind == BlockKind::System) {
        failed.push(PostCondition::SystemPresent);
    }

    if !blocks.iter().any(|b| b.kind == BlockKind::User) {
        failed.push(PostCondition::UserPresent);
    }

    let constraints_intact = spec.constraint_contents.iter().all(|content| {
        blocks
            .iter()
            .any(|b| b.kind == BlockKind::Constraint && b.content == *content)
    });

    if !constraints_intact {
        failed.push(PostCondition::ConstraintsIntact);
    }

    if total_tokens(blocks) > spec.budget {
        failed.push(PostCondition::WithinBudget);
    }

    let must_keep_intact = spec
        .must_keep_contents
        .iter()
        .all(|content| blocks.iter().any(|b| b.content == *content));

    if !must_keep_intact {
        failed.push(PostCondition::MustKeepIntact);
    }

    failed
}

/// Render a failed set for logs and the error value.
pub(crate) fn describe(failed: &[PostCondition]) -> String {
    failed
        .iter()
        .map(PostCondition::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use blocks::BlockId;

    use super::*;

    fn block(seq: u64, kind: BlockKind, content: &str, tokens: usize) -> Block {
        let mut b = Block::new(BlockId::new(seq), kind, content, tokens, kind.to_string());
        b.timestamp = seq;
        b
    }

    fn spec(budget: usize) -> ValidationSpec {
        ValidationSpec {
            had_system: true,
            constraint_contents: vec!["MUST be valid".to_string()],
            must_keep_contents: vec!["system prompt".to_string(), "the question".to_string()],
            budget,
        }
    }

    fn healthy() -> Vec<Block> {
        vec![
            block(0, BlockKind::System, "system prompt", 5),
            block(1, BlockKind::Constraint, "MUST be valid", 3),
            block(2, BlockKind::User, "the question", 4),
        ]
    }

    #[test]
    fn healthy_output_passes() {
        assert!(check(&healthy(), &spec(100)).is_empty());
    }

    #[test]
    fn over_budget_fails_v4_only() {
        let failed = check(&healthy(), &spec(10));
        assert_eq!(failed, [PostCondition::WithinBudget]);
        assert!(!failed[0].is_content_loss());
    }

    #[test]
    fn missing_system_block_fails_v1() {
        let blocks: Vec<Block> = healthy()
            .into_iter()
            .filter(|b| b.kind != BlockKind::System)
            .collect();

        let failed = check(&blocks, &spec(100));
        assert!(failed.contains(&PostCondition::SystemPresent));
        assert!(failed.contains(&PostCondition::MustKeepIntact));
    }

    #[test]
    fn mutated_constraint_fails_v3() {
        let mut blocks = healthy();
        blocks[1].replace_content("must be valid, roughly".to_string(), 4);

        let failed = check(&blocks, &spec(100));
        assert_eq!(failed, [PostCondition::ConstraintsIntact]);
    }

    #[test]
    fn missing_user_fails_v2_and_v5() {
        let blocks: Vec<Block> = healthy()
            .into_iter()
            .filter(|b| b.kind != BlockKind::User)
            .collect();

        let failed = check(&blocks, &spec(100));
        assert!(failed.contains(&PostCondition::UserPresent));
        assert!(failed.contains(&PostCondition::MustKeepIntact));
        assert_eq!(describe(&failed), "V2,V5");
    }
}
