//! The deterministic heuristic transforms, applied in a fixed order before
//! anything model-backed runs: junk removal, deduplication, tool-schema
//! minimization, JSON compaction, log trimming, keep-last-turns marking and
//! constraint extraction.

mod constraints;
mod dedupe;
mod json;
mod junk;
mod logs;
mod tools;
mod turns;

use blocks::{Block, DroppedBlock};
use config::HeuristicsConfig;
use tokenizer::TokenCounter;

pub(crate) use turns::mark_last_turns;

/// What the heuristics did to the block list.
#[derive(Debug, Default)]
pub(crate) struct HeuristicsReport {
    /// Blocks removed, with reasons.
    pub dropped: Vec<DroppedBlock>,
    /// True when any block was removed or rewritten.
    pub changed: bool,
}

/// Run all transforms in order. Blocks stay sorted by timestamp throughout.
pub(crate) fn run(
    blocks: &mut Vec<Block>,
    config: &HeuristicsConfig,
    counter: &TokenCounter,
    model: &str,
) -> HeuristicsReport {
    let mut report = HeuristicsReport::default();

    junk::apply(blocks, config, &mut report);
    dedupe::apply(blocks, config, &mut report);
    tools::apply(blocks, config, counter, model, &mut report);
    json::apply(blocks, config, counter, model, &mut report);
    logs::apply(blocks, config, counter, model, &mut report);

    if turns::mark_last_turns(blocks, config.keep_last_n_turns) {
        report.changed = true;
    }

    if constraints::extract(blocks, counter, model) {
        report.changed = true;
    }

    report
}
