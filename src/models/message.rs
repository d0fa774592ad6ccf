use serde::Serialize;
use serde_json::Value;

use super::event::Usage;

/// Arguments of a finished tool call.
///
/// Input that does not parse as JSON is kept verbatim so a truncated or
/// malformed argument never fails the whole message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolInput {
    Json(Value),
    Raw(String),
}

impl ToolInput {
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => ToolInput::Json(value),
            Err(e) => {
                tracing::warn!(error = %e, size = raw.len(), "Tool input is not valid JSON, keeping raw string");
                ToolInput::Raw(raw)
            }
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ToolInput::Json(value) => Some(value),
            ToolInput::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, ToolInput::Raw(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: ToolInput,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::ToolUse { .. } => None,
        }
    }
}

/// The finished message reconstructed from one stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub content: Vec<ContentBlock>,
    pub thinking: Option<String>,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

impl AssembledMessage {
    pub fn new(role: impl Into<String>, model: Option<String>) -> Self {
        Self {
            role: role.into(),
            model,
            content: Vec::new(),
            thinking: None,
            usage: None,
            stop_reason: None,
        }
    }

    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    pub fn has_tool_use(&self) -> bool {
        self.tool_uses().next().is_some()
    }
}
