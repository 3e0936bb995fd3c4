use blocks::Block;
use config::HeuristicsConfig;
use tokenizer::TokenCounter;

use super::HeuristicsReport;

/// Markers identifying the lines worth keeping in log output.
const ERROR_MARKERS: [&str; 3] = ["ERROR", "Exception", "Traceback"];

/// Trim blocks tagged as log output down to their interesting lines: every
/// line carrying an error marker with a window of neighbours, plus the
/// tail. Elided gaps are replaced with an explicit marker so the model
/// knows content is missing.
pub(crate) fn apply(
    blocks: &mut [Block],
    config: &HeuristicsConfig,
    counter: &TokenCounter,
    model: &str,
    report: &mut HeuristicsReport,
) {
    for block in blocks.iter_mut() {
        if block.must_keep || !is_log_block(block) {
            continue;
        }

        if let Some(trimmed) = trim(
            &block.content,
            config.log_error_window_lines,
            config.log_tail_lines,
        ) {
            log::debug!("log trimming rewrote {} ({})", block.id, block.source);
            let tokens = counter.count(&trimmed, model);
            block.replace_content(trimmed, tokens);
            report.changed = true;
        }
    }
}

fn is_log_block(block: &Block) -> bool {
    block.source == "log" || block.source.starts_with("log:")
}

/// Returns the trimmed content, or `None` when every line is kept anyway.
fn trim(content: &str, window: usize, tail: usize) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut keep = vec![false; lines.len()];

    for (index, line) in lines.iter().enumerate() {
        if ERROR_MARKERS.iter().any(|marker| line.contains(marker)) {
            let start = index.saturating_sub(window);
            let end = (index + window).min(lines.len() - 1);
            for flag in keep.iter_mut().take(end + 1).skip(start) {
                *flag = true;
            }
        }
    }

    for flag in keep.iter_mut().rev().take(tail) {
        *flag = true;
    }

    if keep.iter().all(|flag| *flag) {
        return None;
    }

    let mut out: Vec<String> = Vec::new();
    let mut elided = 0usize;

    for (index, line) in lines.iter().enumerate() {
        if keep[index] {
            if elided > 0 {
                out.push(format!("... ({elided} lines elided)"));
                elided = 0;
            }
            out.push((*line).to_string());
        } else {
            elided += 1;
        }
    }

    if elided > 0 {
        out.push(format!("... ({elided} lines elided)"));
    }

    Some(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use blocks::BlockKind;

    use super::*;
    use crate::heuristics::testing::block;

    fn log_block(content: &str) -> Block {
        let mut b = block(0, BlockKind::Doc, content);
        b.source = "log:build".to_string();
        b
    }

    fn counter() -> TokenCounter {
        TokenCounter::new([])
    }

    fn config(window: usize, tail: usize) -> HeuristicsConfig {
        toml::from_str(&format!(
            "log_error_window_lines = {window}\nlog_tail_lines = {tail}"
        ))
        .unwrap()
    }

    fn numbered_lines(n: usize, error_at: usize) -> String {
        (0..n)
            .map(|i| {
                if i == error_at {
                    format!("line {i}: ERROR something broke")
                } else {
                    format!("line {i}: all fine")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn keeps_error_window_and_tail() {
        let content = numbered_lines(30, 10);
        let mut blocks = vec![log_block(&content)];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(1, 3), &counter(), "test-model", &mut report);

        let result = &blocks[0].content;
        assert!(result.contains("line 9:"));
        assert!(result.contains("ERROR"));
        assert!(result.contains("line 11:"));
        assert!(result.contains("line 29:"));
        assert!(!result.contains("line 20:"));
        assert!(result.contains("lines elided"));
        assert!(report.changed);
    }

    #[test]
    fn short_logs_are_untouched() {
        let content = "one line\nERROR bad\nlast line";
        let mut blocks = vec![log_block(content)];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(2, 10), &counter(), "test-model", &mut report);

        assert_eq!(blocks[0].content, content);
        assert!(!report.changed);
    }

    #[test]
    fn only_log_tagged_blocks_are_trimmed() {
        let content = numbered_lines(30, 10);
        let mut blocks = vec![block(0, BlockKind::Doc, &content)];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(1, 3), &counter(), "test-model", &mut report);

        assert_eq!(blocks[0].content, content);
    }

    #[test]
    fn line_order_is_preserved() {
        let content = numbered_lines(20, 3);
        let mut blocks = vec![log_block(&content)];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(0, 2), &counter(), "test-model", &mut report);

        let positions: Vec<usize> = ["line 3:", "line 18:", "line 19:"]
            .iter()
            .map(|needle| blocks[0].content.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
