use blocks::{Block, BlockId, BlockKind, signals};
use tokenizer::TokenCounter;

/// Extract hard-constraint sentences into a dedicated `constraint` block.
///
/// System, developer and user blocks are scanned in timestamp order; every
/// sentence carrying a constraint keyword is collected, in original order,
/// into one new `must_keep` block placed immediately after the last system
/// block. Returns true when a block was created.
pub(crate) fn extract(blocks: &mut Vec<Block>, counter: &TokenCounter, model: &str) -> bool {
    let mut collected: Vec<String> = Vec::new();

    for block in blocks.iter() {
        if !matches!(
            block.kind,
            BlockKind::System | BlockKind::Developer | BlockKind::User
        ) {
            continue;
        }

        for line in block.content.lines() {
            if !signals::is_constraint_line(line) {
                continue;
            }

            for sentence in split_sentences(line) {
                if signals::is_constraint_line(&sentence) {
                    collected.push(sentence);
                }
            }
        }
    }

    if collected.is_empty() {
        return false;
    }

    let content = collected.join("\n");
    let next_id = blocks.iter().map(|b| b.id.seq()).max().unwrap_or(0) + 1;

    let mut constraint = Block::new(
        BlockId::new(next_id),
        BlockKind::Constraint,
        content.clone(),
        counter.count(&content, model),
        "constraint",
    );
    constraint.must_keep = true;
    constraint.priority = 1.0;

    // Place the block right after the last system block, or at the front
    // when there is none, shifting later timestamps to keep them strictly
    // monotonic.
    let position = blocks
        .iter()
        .rposition(|b| b.kind == BlockKind::System)
        .map(|index| index + 1)
        .unwrap_or(0);

    constraint.timestamp = if position == 0 {
        0
    } else {
        blocks[position - 1].timestamp + 1
    };

    for block in blocks.iter_mut().skip(position) {
        block.timestamp += 1;
    }

    blocks.insert(position, constraint);
    log::debug!("constraint extraction created a block with {} lines", collected.len());

    true
}

/// Split a line into sentences at sentence enders, keeping the enders.
/// A line without enders comes back whole.
fn split_sentences(line: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        current.push(ch);

        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::testing::block;

    fn counter() -> TokenCounter {
        TokenCounter::new([])
    }

    #[test]
    fn collects_constraint_sentences_after_the_system_block() {
        let mut blocks = vec![
            block(
                0,
                BlockKind::System,
                "You MUST reply in JSON. NEVER include PII. ALWAYS validate input.",
            ),
            block(1, BlockKind::User, "Process data"),
        ];

        assert!(extract(&mut blocks, &counter(), "test-model"));

        assert_eq!(blocks.len(), 3);
        let constraint = &blocks[1];
        assert_eq!(constraint.kind, BlockKind::Constraint);
        assert!(constraint.must_keep);
        assert_eq!(
            constraint.content,
            "You MUST reply in JSON.\nNEVER include PII.\nALWAYS validate input."
        );

        let timestamps: Vec<u64> = blocks.iter().map(|b| b.timestamp).collect();
        assert_eq!(timestamps, [0, 1, 2], "timestamps stay strictly monotonic");
    }

    #[test]
    fn mixed_lines_contribute_only_constraint_sentences() {
        let mut blocks = vec![
            block(0, BlockKind::System, "Be nice. You MUST cite sources."),
            block(1, BlockKind::User, "The DEADLINE is Friday"),
        ];

        assert!(extract(&mut blocks, &counter(), "test-model"));
        assert_eq!(
            blocks[1].content,
            "You MUST cite sources.\nThe DEADLINE is Friday"
        );
    }

    #[test]
    fn no_keywords_means_no_block() {
        let mut blocks = vec![
            block(0, BlockKind::System, "Be nice."),
            block(1, BlockKind::User, "hello"),
        ];

        assert!(!extract(&mut blocks, &counter(), "test-model"));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn assistant_and_doc_blocks_are_not_scanned() {
        let mut blocks = vec![
            block(0, BlockKind::Assistant, "You MUST click subscribe."),
            block(1, BlockKind::Doc, "ALWAYS restart the router."),
            block(2, BlockKind::User, "hello"),
        ];

        assert!(!extract(&mut blocks, &counter(), "test-model"));
    }

    #[test]
    fn without_system_block_the_constraint_leads() {
        let mut blocks = vec![block(0, BlockKind::User, "You MUST hurry.")];

        assert!(extract(&mut blocks, &counter(), "test-model"));
        assert_eq!(blocks[0].kind, BlockKind::Constraint);
        assert_eq!(blocks[0].timestamp, 0);
        assert_eq!(blocks[1].timestamp, 1);
    }
}
