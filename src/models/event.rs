use serde::{Deserialize, Serialize};

/// Closed set of event kinds produced by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageStart,
    ContentBlockStart,
    ContentBlockDelta,
    ContentBlockStop,
    ThinkingStart,
    ThinkingDelta,
    ThinkingStop,
    ToolUseStart,
    ToolUseDelta,
    ToolUseStop,
    MessageStop,
    Error,
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageStart => "message_start",
            EventKind::ContentBlockStart => "content_block_start",
            EventKind::ContentBlockDelta => "content_block_delta",
            EventKind::ContentBlockStop => "content_block_stop",
            EventKind::ThinkingStart => "thinking_start",
            EventKind::ThinkingDelta => "thinking_delta",
            EventKind::ThinkingStop => "thinking_stop",
            EventKind::ToolUseStart => "tool_use_start",
            EventKind::ToolUseDelta => "tool_use_delta",
            EventKind::ToolUseStop => "tool_use_stop",
            EventKind::MessageStop => "message_stop",
            EventKind::Error => "error",
            EventKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counters reported by the upstream model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// One decoded event of an agent response stream.
///
/// Each variant carries only the fields relevant to its kind. Deltas carry
/// exactly the new increment, never text that was already emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        role: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    ContentBlockStart,
    ContentBlockDelta {
        text: String,
    },
    ContentBlockStop,
    ThinkingStart,
    ThinkingDelta {
        text: String,
    },
    ThinkingStop,
    ToolUseStart {
        id: String,
        name: String,
    },
    ToolUseDelta {
        input: String,
    },
    ToolUseStop,
    MessageStop {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    /// Injected by the transport when the connection fails; never on the wire
    Error {
        error: String,
        error_type: String,
    },
    /// Well-formed but informational record (metadata, traces, summaries)
    Unknown {
        data: serde_json::Value,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::MessageStart { .. } => EventKind::MessageStart,
            StreamEvent::ContentBlockStart => EventKind::ContentBlockStart,
            StreamEvent::ContentBlockDelta { .. } => EventKind::ContentBlockDelta,
            StreamEvent::ContentBlockStop => EventKind::ContentBlockStop,
            StreamEvent::ThinkingStart => EventKind::ThinkingStart,
            StreamEvent::ThinkingDelta { .. } => EventKind::ThinkingDelta,
            StreamEvent::ThinkingStop => EventKind::ThinkingStop,
            StreamEvent::ToolUseStart { .. } => EventKind::ToolUseStart,
            StreamEvent::ToolUseDelta { .. } => EventKind::ToolUseDelta,
            StreamEvent::ToolUseStop => EventKind::ToolUseStop,
            StreamEvent::MessageStop { .. } => EventKind::MessageStop,
            StreamEvent::Error { .. } => EventKind::Error,
            StreamEvent::Unknown { .. } => EventKind::Unknown,
        }
    }

    pub fn text_delta(text: impl Into<String>) -> Self {
        StreamEvent::ContentBlockDelta { text: text.into() }
    }

    pub fn thinking_delta(text: impl Into<String>) -> Self {
        StreamEvent::ThinkingDelta { text: text.into() }
    }

    pub fn transport_error(error: impl Into<String>, error_type: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: error.into(),
            error_type: error_type.into(),
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::ContentBlockStart | EventKind::ContentBlockDelta | EventKind::ContentBlockStop
        )
    }

    pub fn is_thinking(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::ThinkingStart | EventKind::ThinkingDelta | EventKind::ThinkingStop
        )
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::ToolUseStart | EventKind::ToolUseDelta | EventKind::ToolUseStop
        )
    }

    /// Text increment carried by a content or thinking delta
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentBlockDelta { text } | StreamEvent::ThinkingDelta { text } => {
                Some(text)
            }
            _ => None,
        }
    }
}
