use serde::{Deserialize, Serialize};

/// The role a block plays in the conversation.
///
/// Kinds drive the default `must_keep` assignment, the per-type budget split
/// in the selector, and the minimal-safe fallback set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockKind {
    /// System instruction.
    System,
    /// Developer instruction.
    Developer,
    /// End-user message.
    User,
    /// Model output from an earlier turn.
    Assistant,
    /// Tool schema or tool output.
    Tool,
    /// Retrieved document.
    Doc,
    /// Extracted hard constraints, synthesized by the pipeline itself.
    Constraint,
}

impl BlockKind {
    /// Kinds that participate in conversation turns.
    pub fn is_conversational(self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn round_trips_through_strings() {
        for kind in [
            BlockKind::System,
            BlockKind::Developer,
            BlockKind::User,
            BlockKind::Assistant,
            BlockKind::Tool,
            BlockKind::Doc,
            BlockKind::Constraint,
        ] {
            let s = kind.to_string();
            assert_eq!(BlockKind::from_str(&s).unwrap(), kind);
        }
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BlockKind::Doc).unwrap(), "\"doc\"");
    }
}
