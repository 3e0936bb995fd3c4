use blocks::{Block, BlockId, BlockKind, normalize};
use tokenizer::TokenCounter;

use crate::request::{OptimizeRequest, Role};
use crate::Error;

/// Default priorities per kind. Priorities only break ties during
/// selection; `must_keep` is what actually protects a block.
fn default_priority(kind: BlockKind) -> f32 {
    match kind {
        BlockKind::System | BlockKind::Constraint => 1.0,
        BlockKind::Developer => 0.9,
        BlockKind::User => 0.7,
        BlockKind::Tool => 0.6,
        BlockKind::Assistant => 0.5,
        BlockKind::Doc => 0.4,
    }
}

/// Validate the request and convert it into the block IR.
///
/// Blocks get strictly monotonic timestamps in input order: messages first,
/// then one block per tool schema, then one per retrieved document. Default
/// `must_keep` goes to every system and developer block plus the most
/// recent user block.
pub(crate) fn canonicalize(
    request: &OptimizeRequest,
    counter: &TokenCounter,
) -> Result<Vec<Block>, Error> {
    validate_input(request)?;

    let model = &request.target_model;
    let mut next = 0u64;
    let mut blocks = Vec::with_capacity(
        request.messages.len() + request.tools.len() + request.docs.len(),
    );

    let last_user_index = request
        .messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or_default();

    for (index, message) in request.messages.iter().enumerate() {
        let kind = message.role.kind();
        let mut block = Block::new(
            BlockId::new(next),
            kind,
            message.content.clone(),
            counter.count(&message.content, model),
            message.role.to_string(),
        );
        block.timestamp = next;
        block.priority = default_priority(kind);

        let is_last_user = message.role == Role::User && index == last_user_index;
        block.must_keep = matches!(kind, BlockKind::System | BlockKind::Developer) || is_last_user;

        if is_last_user {
            block.priority = 1.0;
        }

        blocks.push(block);
        next += 1;
    }

    for schema in &request.tools {
        let content = serde_json::to_string(schema).unwrap_or_else(|_| schema.name.clone());
        let mut block = Block::new(
            BlockId::new(next),
            BlockKind::Tool,
            content.clone(),
            counter.count(&content, model),
            "tool-schema",
        );
        block.timestamp = next;
        block.priority = default_priority(BlockKind::Tool);
        blocks.push(block);
        next += 1;
    }

    for doc in &request.docs {
        let source = doc_source(doc);
        let mut block = Block::new(
            BlockId::new(next),
            BlockKind::Doc,
            doc.content.clone(),
            counter.count(&doc.content, model),
            source,
        );
        block.timestamp = next;
        block.priority = doc
            .metadata
            .get("priority")
            .and_then(serde_json::Value::as_f64)
            .map(|p| (p as f32).clamp(0.0, 1.0))
            .unwrap_or_else(|| default_priority(BlockKind::Doc));
        blocks.push(block);
        next += 1;
    }

    Ok(blocks)
}

fn doc_source(doc: &crate::request::RetrievedDoc) -> String {
    if doc
        .metadata
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|kind| kind == "log")
    {
        return format!("log:{}", doc.id);
    }

    doc.metadata
        .get("source")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("retrieved:{}", doc.id))
}

fn validate_input(request: &OptimizeRequest) -> Result<(), Error> {
    if request.messages.is_empty() {
        return Err(Error::input("no-messages", "the request carries no messages"));
    }

    let Some(last_user) = request.messages.iter().rev().find(|m| m.role == Role::User) else {
        return Err(Error::input("no-user-message", "the request carries no user message"));
    };

    if normalize(&last_user.content).is_empty() {
        return Err(Error::input(
            "empty-user-content",
            "the most recent user message is empty",
        ));
    }

    Ok(())
}
