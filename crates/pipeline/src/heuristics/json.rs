use blocks::Block;
use config::HeuristicsConfig;
use serde_json::Value;
use tokenizer::TokenCounter;

use super::HeuristicsReport;

/// Rewrite large uniform JSON arrays into a pipe-delimited table: one
/// header line with the keys, one line per record. Arrays longer than the
/// configured item cap keep their head and gain an explicit elision marker.
///
/// Only fires for blocks whose whole content parses as an array of objects
/// sharing one key set; anything else is ambiguous and left alone.
pub(crate) fn apply(
    blocks: &mut [Block],
    config: &HeuristicsConfig,
    counter: &TokenCounter,
    model: &str,
    report: &mut HeuristicsReport,
) {
    for block in blocks.iter_mut() {
        if block.must_keep || block.content.len() <= config.json_truncate_chars {
            continue;
        }

        let Some(compacted) = compact(&block.content, config.json_truncate_items) else {
            continue;
        };

        if compacted.len() < block.content.len() {
            log::debug!("json compaction rewrote {} ({})", block.id, block.source);
            let tokens = counter.count(&compacted, model);
            block.replace_content(compacted, tokens);
            report.changed = true;
        }
    }
}

fn compact(content: &str, max_items: usize) -> Option<String> {
    let value: Value = serde_json::from_str(content.trim()).ok()?;
    let Value::Array(records) = value else {
        return None;
    };

    let first = records.first()?.as_object()?;
    let keys: Vec<&String> = first.keys().collect();

    // Uniformity: every record is an object over the same key set.
    for record in &records {
        let object = record.as_object()?;
        if object.len() != keys.len() || !keys.iter().all(|key| object.contains_key(*key)) {
            return None;
        }
    }

    let mut lines = Vec::with_capacity(records.len().min(max_items) + 2);
    lines.push(keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join("|"));

    for record in records.iter().take(max_items) {
        let object = record.as_object()?;
        let row = keys
            .iter()
            .map(|key| render(&object[key.as_str()]))
            .collect::<Vec<_>>()
            .join("|");
        lines.push(row);
    }

    if records.len() > max_items {
        lines.push(format!("... ({} more records)", records.len() - max_items));
    }

    Some(lines.join("\n"))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use blocks::BlockKind;
    use serde_json::json;

    use super::*;
    use crate::heuristics::testing::block;

    fn counter() -> TokenCounter {
        TokenCounter::new([])
    }

    fn config(chars: usize, items: usize) -> HeuristicsConfig {
        toml::from_str(&format!(
            "json_truncate_chars = {chars}\njson_truncate_items = {items}"
        ))
        .unwrap()
    }

    fn records(n: usize) -> String {
        let items: Vec<Value> = (0..n)
            .map(|i| json!({"id": i, "name": format!("item-{i}"), "status": "ok"}))
            .collect();
        Value::Array(items).to_string()
    }

    #[test]
    fn rewrites_uniform_arrays_to_tables() {
        let mut blocks = vec![block(0, BlockKind::Doc, &records(5))];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(10, 20), &counter(), "test-model", &mut report);

        let content = &blocks[0].content;
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("id|name|status"));
        assert_eq!(lines.next(), Some("0|item-0|ok"));
        assert_eq!(content.lines().count(), 6);
        assert!(report.changed);
    }

    #[test]
    fn long_arrays_get_an_elision_marker() {
        let mut blocks = vec![block(0, BlockKind::Doc, &records(8))];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(10, 3), &counter(), "test-model", &mut report);

        let content = &blocks[0].content;
        assert!(content.ends_with("... (5 more records)"), "got: {content}");
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn short_content_is_skipped() {
        let content = records(2);
        let mut blocks = vec![block(0, BlockKind::Doc, &content)];

        let mut report = HeuristicsReport::default();
        apply(
            &mut blocks,
            &config(100_000, 20),
            &counter(),
            "test-model",
            &mut report,
        );

        assert_eq!(blocks[0].content, content);
        assert!(!report.changed);
    }

    #[test]
    fn non_uniform_arrays_are_left_alone() {
        let content = json!([{"a": 1}, {"b": 2}]).to_string();
        let mut blocks = vec![block(0, BlockKind::Doc, &content)];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(1, 20), &counter(), "test-model", &mut report);

        assert_eq!(blocks[0].content, content);
    }

    #[test]
    fn prose_is_left_alone() {
        let content = "This is just text, much longer than the threshold for sure.";
        let mut blocks = vec![block(0, BlockKind::Doc, content)];

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config(10, 20), &counter(), "test-model", &mut report);

        assert_eq!(blocks[0].content, content);
    }
}
