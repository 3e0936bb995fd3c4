use blocks::{Block, BlockKind, DropReason, DroppedBlock};
use config::HeuristicsConfig;
use serde_json::{Map, Value};
use tokenizer::TokenCounter;

use super::HeuristicsReport;

/// Minimize tool schemas and enforce the allowlist.
///
/// A tool block keeps only `name`, `parameters` and `required`;
/// descriptions and examples go, including inside nested parameter
/// schemas. Blocks whose content is not a JSON object are left unchanged.
pub(crate) fn apply(
    blocks: &mut Vec<Block>,
    config: &HeuristicsConfig,
    counter: &TokenCounter,
    model: &str,
    report: &mut HeuristicsReport,
) {
    let restricts = config.restricts_tools();

    blocks.retain(|block| {
        if block.kind != BlockKind::Tool || block.must_keep || !restricts {
            return true;
        }

        let name = tool_name(&block.content);
        let allowed = name
            .as_deref()
            .is_some_and(|name| config.tool_allowlist.iter().any(|allow| allow == name));

        if !allowed {
            log::debug!("tool allowlist dropped {} ({:?})", block.id, name);
            report
                .dropped
                .push(DroppedBlock::of(block, DropReason::ToolNotAllowed));
            report.changed = true;
        }

        allowed
    });

    for block in blocks.iter_mut() {
        if block.kind != BlockKind::Tool || block.must_keep {
            continue;
        }

        let Ok(Value::Object(schema)) = serde_json::from_str::<Value>(&block.content) else {
            continue;
        };

        let minimal = minimize(schema);
        let Ok(content) = serde_json::to_string(&minimal) else {
            continue;
        };

        if content != block.content {
            let tokens = counter.count(&content, model);
            block.replace_content(content, tokens);
            report.changed = true;
        }
    }
}

fn tool_name(content: &str) -> Option<String> {
    let value: Value = serde_json::from_str(content).ok()?;
    value.get("name")?.as_str().map(str::to_string)
}

fn minimize(schema: Map<String, Value>) -> Value {
    let mut minimal = Map::new();

    for field in ["name", "parameters", "required"] {
        if let Some(value) = schema.get(field) {
            let value = if field == "parameters" {
                strip_noise(value.clone())
            } else {
                value.clone()
            };
            minimal.insert(field.to_string(), value);
        }
    }

    Value::Object(minimal)
}

/// Remove `description` and `examples` keys at every nesting level.
fn strip_noise(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "description" && key != "examples")
                .map(|(key, value)| (key, strip_noise(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_noise).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::heuristics::testing::block;

    fn tool_block(seq: u64, schema: Value) -> Block {
        let mut b = block(seq, BlockKind::Tool, &schema.to_string());
        b.source = "tool-schema".to_string();
        b
    }

    fn counter() -> TokenCounter {
        TokenCounter::new([])
    }

    #[test]
    fn strips_descriptions_at_every_level() {
        let mut blocks = vec![tool_block(
            0,
            json!({
                "name": "search",
                "description": "find documents",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "what to find", "examples": ["cats"]}
                    }
                },
                "required": ["query"]
            }),
        )];

        let mut report = HeuristicsReport::default();
        apply(
            &mut blocks,
            &HeuristicsConfig::default(),
            &counter(),
            "test-model",
            &mut report,
        );

        let content = &blocks[0].content;
        assert!(!content.contains("description"));
        assert!(!content.contains("examples"));
        assert!(content.contains("\"name\""));
        assert!(content.contains("\"required\""));
        assert!(report.changed);
    }

    #[test]
    fn allowlist_drops_unlisted_tools() {
        let mut blocks = vec![
            tool_block(0, json!({"name": "search", "parameters": {}})),
            tool_block(1, json!({"name": "delete_all", "parameters": {}})),
        ];

        let config: HeuristicsConfig = toml::from_str(r#"tool_allowlist = ["search"]"#).unwrap();

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config, &counter(), "test-model", &mut report);

        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].content.contains("search"));
        assert_eq!(report.dropped[0].reason, DropReason::ToolNotAllowed);
    }

    #[test]
    fn wildcard_allowlist_keeps_everything() {
        let mut blocks = vec![tool_block(0, json!({"name": "anything", "parameters": {}}))];

        let config: HeuristicsConfig = toml::from_str(r#"tool_allowlist = ["*"]"#).unwrap();

        let mut report = HeuristicsReport::default();
        apply(&mut blocks, &config, &counter(), "test-model", &mut report);

        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn non_json_tool_content_is_left_alone() {
        let mut blocks = vec![block(0, BlockKind::Tool, "not json at all")];

        let mut report = HeuristicsReport::default();
        apply(
            &mut blocks,
            &HeuristicsConfig::default(),
            &counter(),
            "test-model",
            &mut report,
        );

        assert_eq!(blocks[0].content, "not json at all");
    }
}
