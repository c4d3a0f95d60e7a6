use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the append-only conversation record passed to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    User { text: String },
    Assistant { text: String },
    ToolResult { call_id: String, content: String },
    ToolRequest { call_id: String, name: String, args: Value },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into() }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult { call_id: call_id.into(), content: content.into() }
    }

    pub fn tool_request(call_id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self::ToolRequest { call_id: call_id.into(), name: name.into(), args }
    }

    /// User and assistant text; tool traffic is not dialogue.
    pub fn is_dialogue_turn(&self) -> bool {
        matches!(self, Self::User { .. } | Self::Assistant { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { text } | Self::Assistant { text } => Some(text),
            Self::ToolResult { content, .. } => Some(content),
            Self::ToolRequest { .. } => None,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::ToolResult { call_id, .. } | Self::ToolRequest { call_id, .. } => Some(call_id),
            Self::User { .. } | Self::Assistant { .. } => None,
        }
    }
}
