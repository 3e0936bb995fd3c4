use blocks::BlockKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of an incoming chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// Developer instruction.
    Developer,
    /// End-user message.
    User,
    /// Model output from an earlier turn.
    Assistant,
    /// Tool output from an earlier turn.
    Tool,
}

impl Role {
    pub(crate) fn kind(self) -> BlockKind {
        match self {
            Self::System => BlockKind::System,
            Self::Developer => BlockKind::Developer,
            Self::User => BlockKind::User,
            Self::Assistant => BlockKind::Assistant,
            Self::Tool => BlockKind::Tool,
        }
    }
}

/// One incoming conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A tool schema attached to the request. Canonicalized into one `tool`
/// block per schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Human-readable description. Dropped by schema minimization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the tool parameters.
    #[serde(default)]
    pub parameters: Value,
    /// Names of required parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// A retrieved document attached to the request.
///
/// Recognized metadata keys: `source` (provenance tag), `kind = "log"`
/// (marks log output for the log-trimming heuristic), `priority`
/// (overrides the kind default, clamped to `[0, 1]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDoc {
    /// Caller-assigned document id.
    pub id: String,
    /// Document text.
    pub content: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Value,
}

/// One optimization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// Conversation messages, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Tool schemas available to the model.
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    /// Retrieved documents to offer the model.
    #[serde(default)]
    pub docs: Vec<RetrievedDoc>,
    /// Model the optimized prompt will be forwarded to.
    pub target_model: String,
    /// Tenant owning this request's vector-store records.
    pub tenant_id: String,
    /// Per-request budget, overriding the configured one.
    #[serde(default)]
    pub budget_override: Option<usize>,
}
