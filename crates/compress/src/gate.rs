use std::time::Duration;

use blocks::{Block, BlockId, total_tokens};
use tokenizer::TokenCounter;
use tokio::time::timeout;

use crate::{Compressor, ExtractiveCompressor, faithfulness};

/// Delimiter tokens every compressor must preserve.
pub const FORCE_PRESERVE: [&str; 5] = ["\n", ".", "!", "?", "```"];

/// Settings of one compression pass.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Target compressed-to-original token ratio.
    pub ratio: f32,
    /// Minimum faithfulness for acceptance.
    pub faithfulness_threshold: f32,
    /// Bound on one learned-compressor call.
    pub timeout: Duration,
}

/// Result of one compression pass.
#[derive(Debug, Default)]
pub struct GateOutcome {
    /// Ids of blocks that were compressed.
    pub compressed: Vec<BlockId>,
    /// Weakest accepted faithfulness score, absent when nothing was
    /// accepted.
    pub min_faithfulness: Option<f32>,
    /// True when the learned compressor failed and the extractive fallback
    /// took over.
    pub learned_degraded: bool,
}

/// Compress non-`must_keep` blocks until the list fits the budget.
///
/// Blocks are visited in descending token order so the largest wins come
/// first, and the pass stops as soon as the total fits. Every candidate
/// passes the faithfulness gate before it replaces a block; a rejected
/// candidate leaves the block unchanged, which is an expected outcome, not
/// an error.
pub async fn compress_blocks(
    blocks: &mut [Block],
    budget: usize,
    learned: Option<&dyn Compressor>,
    config: &GateConfig,
    counter: &TokenCounter,
    model: &str,
) -> GateOutcome {
    let mut outcome = GateOutcome::default();
    let extractive = ExtractiveCompressor::new();

    let mut order: Vec<usize> = (0..blocks.len())
        .filter(|i| !blocks[*i].must_keep && !blocks[*i].compressed)
        .collect();
    order.sort_by(|a, b| {
        blocks[*b]
            .token_count
            .cmp(&blocks[*a].token_count)
            .then_with(|| blocks[*a].id.cmp(&blocks[*b].id))
    });

    for index in order {
        if total_tokens(blocks) <= budget {
            break;
        }

        let block = &blocks[index];

        let candidate = match learned {
            Some(compressor) if !outcome.learned_degraded => {
                match timeout(
                    config.timeout,
                    compressor.compress(&block.content, config.ratio, &FORCE_PRESERVE),
                )
                .await
                {
                    Ok(Ok(candidate)) => Some(candidate),
                    Ok(Err(err)) => {
                        log::warn!("learned compressor failed, using extractive fallback: {err}");
                        outcome.learned_degraded = true;
                        None
                    }
                    Err(_) => {
                        log::warn!(
                            "learned compressor timed out after {}ms, using extractive fallback",
                            config.timeout.as_millis()
                        );
                        outcome.learned_degraded = true;
                        None
                    }
                }
            }
            _ => None,
        };

        let candidate = match candidate {
            Some(candidate) => candidate,
            None => match extractive
                .compress(&block.content, config.ratio, &FORCE_PRESERVE)
                .await
            {
                Ok(candidate) => candidate,
                Err(err) => {
                    log::warn!("extractive compression failed for {}: {err}", block.id);
                    continue;
                }
            },
        };

        let compressed_tokens = counter.count(&candidate.text, model);
        let score = faithfulness::score(&block.content, &candidate.text);

        if score < config.faithfulness_threshold {
            log::debug!(
                "compression of {} rejected: faithfulness {score:.3} below threshold",
                block.id
            );
            continue;
        }

        if compressed_tokens >= block.token_count {
            log::debug!("compression of {} rejected: candidate is not smaller", block.id);
            continue;
        }

        let block = &mut blocks[index];
        block.apply_compression(candidate.text, compressed_tokens);

        outcome.compressed.push(block.id);
        outcome.min_faithfulness = Some(match outcome.min_faithfulness {
            Some(current) => current.min(score),
            None => score,
        });
    }

    outcome
}
