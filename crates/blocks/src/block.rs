use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BlockKind, Fingerprint};

/// Identifier of a block, unique and stable within one pipeline run.
///
/// Ids are assigned as a monotonic sequence by the canonicalizer so that
/// repeated runs over the same input produce identical ids, and so that the
/// selector's final tie-break is a total order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockId(u64);

impl BlockId {
    /// Construct an id from its sequence number.
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The underlying sequence number.
    pub fn seq(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// The unit of data flowing through the optimization pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Run-local identifier.
    pub id: BlockId,
    /// Role of the block.
    pub kind: BlockKind,
    /// Textual payload.
    pub content: String,
    /// Token count of `content` under the target model's tokenizer.
    pub token_count: usize,
    /// When true, `content` must appear byte-for-byte in the final output.
    pub must_keep: bool,
    /// Selection tie-breaker in `[0, 1]`.
    pub priority: f32,
    /// Logical position; higher means more recent.
    pub timestamp: u64,
    /// True once the compressor replaced the content.
    pub compressed: bool,
    /// Pre-compression text, retained so fallback can restore it.
    pub original_content: Option<String>,
    /// Pre-compression token count, restored together with the content.
    pub original_token_count: Option<usize>,
    /// Digest of the normalized content.
    pub fingerprint: Fingerprint,
    /// Provenance tag, e.g. `system`, `retrieved:<docid>`, `tool-schema`.
    pub source: String,
}

impl Block {
    /// Create a block with the given payload. `must_keep`, `priority` and
    /// `timestamp` start at their defaults and are set by the canonicalizer.
    pub fn new(
        id: BlockId,
        kind: BlockKind,
        content: impl Into<String>,
        token_count: usize,
        source: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let fingerprint = Fingerprint::of(&content);

        Self {
            id,
            kind,
            content,
            token_count,
            must_keep: false,
            priority: 0.5,
            timestamp: 0,
            compressed: false,
            original_content: None,
            original_token_count: None,
            fingerprint,
            source: source.into(),
        }
    }

    /// Replace the content, keeping `token_count` and `fingerprint` coherent.
    pub fn replace_content(&mut self, content: String, token_count: usize) {
        self.content = content;
        self.token_count = token_count;
        self.fingerprint = Fingerprint::of(&self.content);
    }

    /// Swap in compressor output, retaining the original for fallback.
    ///
    /// Callers must have verified `token_count < self.token_count`; a
    /// compression that does not shrink the block is rejected upstream.
    pub fn apply_compression(&mut self, content: String, token_count: usize) {
        debug_assert!(token_count < self.token_count);

        self.original_content = Some(std::mem::replace(&mut self.content, content));
        self.original_token_count = Some(std::mem::replace(&mut self.token_count, token_count));
        self.fingerprint = Fingerprint::of(&self.content);
        self.compressed = true;
    }

    /// Restore the pre-compression content. No-op for uncompressed blocks.
    pub fn undo_compression(&mut self) {
        if !self.compressed {
            return;
        }

        if let (Some(content), Some(tokens)) =
            (self.original_content.take(), self.original_token_count.take())
        {
            self.content = content;
            self.token_count = tokens;
            self.fingerprint = Fingerprint::of(&self.content);
        }

        self.compressed = false;
    }
}

/// Sum of token counts over a block list.
pub fn total_tokens(blocks: &[Block]) -> usize {
    blocks.iter().map(|b| b.token_count).sum()
}
