use std::collections::HashMap;

use crate::models::{AssembledMessage, ContentBlock, StreamEvent, ToolInput, Usage};
use crate::streaming::classifier::usage_from;

/// Buffer for accumulating one tool call's streamed argument JSON
#[derive(Debug, Clone)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    /// Concatenated input fragments, parsed only when the call finishes
    pub raw_input: String,
}

impl ToolCallAccumulator {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            raw_input: String::new(),
        }
    }

    pub fn append(&mut self, chunk: &str) {
        self.raw_input.push_str(chunk);
    }

    pub fn finalize(self) -> ContentBlock {
        tracing::debug!(
            tool_id = %self.id,
            tool_name = %self.name,
            size = self.raw_input.len(),
            "Finalized tool input buffer"
        );
        ContentBlock::ToolUse {
            id: self.id,
            name: self.name,
            input: ToolInput::parse(self.raw_input),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Text,
    ToolUse,
}

/// Folds the ordered event sequence of one stream into a finished message.
///
/// Blocks are attached to the message only when their stop event arrives, so
/// content appears in stop order and partially accumulated text is never
/// visible as final output.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    message: Option<AssembledMessage>,
    current_block: Option<BlockType>,
    current_text: String,
    thinking: String,
    tools: HashMap<String, ToolCallAccumulator>,
    current_tool_id: Option<String>,
    metadata_usage: Option<Usage>,
    last_completed: Option<ContentBlock>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a whole event sequence, returning the first completed message
    pub fn assemble<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> Option<AssembledMessage> {
        let mut assembler = Self::new();
        events
            .into_iter()
            .find_map(|event| assembler.process_event(event))
    }

    /// Message under construction, if a stream is open
    pub fn in_progress(&self) -> Option<&AssembledMessage> {
        self.message.as_ref()
    }

    /// Block finished by the last processed event, if that event finished one
    pub fn last_completed_block(&self) -> Option<&ContentBlock> {
        self.last_completed.as_ref()
    }

    /// Number of tool calls started but not yet finished
    pub fn open_tool_calls(&self) -> usize {
        self.tools.len()
    }

    /// Apply one event. Returns the finished message on `MessageStop`.
    pub fn process_event(&mut self, event: &StreamEvent) -> Option<AssembledMessage> {
        self.last_completed = None;

        if let StreamEvent::MessageStart { role, model } = event {
            self.reset();
            self.message = Some(AssembledMessage::new(role.clone(), model.clone()));
            return None;
        }

        if self.message.is_none() {
            tracing::trace!(kind = %event.kind(), "Ignoring event outside of a message");
            return None;
        }

        match event {
            StreamEvent::MessageStart { .. } => {}
            StreamEvent::ThinkingStart => self.thinking.clear(),
            StreamEvent::ThinkingDelta { text } => self.thinking.push_str(text),
            StreamEvent::ThinkingStop => {
                if !self.thinking.is_empty()
                    && let Some(message) = self.message.as_mut()
                {
                    message.thinking = Some(std::mem::take(&mut self.thinking));
                }
            }
            StreamEvent::ContentBlockStart => {
                self.current_block = Some(BlockType::Text);
                self.current_text.clear();
            }
            StreamEvent::ContentBlockDelta { text } => {
                if self.current_block.is_none() {
                    // Transports may skip the start record for text blocks
                    self.current_block = Some(BlockType::Text);
                    self.current_text.clear();
                }
                if self.current_block == Some(BlockType::Text) {
                    self.current_text.push_str(text);
                }
            }
            StreamEvent::ContentBlockStop => match self.current_block.take() {
                Some(BlockType::Text) => {
                    let text = std::mem::take(&mut self.current_text);
                    self.push_block(ContentBlock::Text { text });
                }
                Some(BlockType::ToolUse) => self.finish_tool(),
                None => {}
            },
            StreamEvent::ToolUseStart { id, name } => {
                self.current_block = Some(BlockType::ToolUse);
                self.tools.insert(
                    id.clone(),
                    ToolCallAccumulator::new(id.clone(), name.clone()),
                );
                self.current_tool_id = Some(id.clone());
            }
            StreamEvent::ToolUseDelta { input } => {
                if let Some(tool) = self
                    .current_tool_id
                    .as_ref()
                    .and_then(|id| self.tools.get_mut(id))
                {
                    tool.append(input);
                }
            }
            StreamEvent::ToolUseStop => {
                self.current_block = None;
                self.finish_tool();
            }
            StreamEvent::MessageStop { usage, stop_reason } => {
                let mut message = self.message.take()?;
                message.usage = usage.clone().or_else(|| self.metadata_usage.take());
                message.stop_reason = stop_reason.clone();
                self.reset();
                return Some(message);
            }
            StreamEvent::Unknown { data } => {
                if let Some(usage) = usage_from(data) {
                    self.metadata_usage = Some(usage);
                }
            }
            StreamEvent::Error { .. } => {}
        }

        None
    }

    fn finish_tool(&mut self) {
        let Some(id) = self.current_tool_id.take() else {
            return;
        };
        if let Some(tool) = self.tools.remove(&id) {
            self.push_block(tool.finalize());
        }
    }

    fn push_block(&mut self, block: ContentBlock) {
        if let Some(message) = self.message.as_mut() {
            message.content.push(block.clone());
        }
        self.last_completed = Some(block);
    }

    fn reset(&mut self) {
        self.message = None;
        self.current_block = None;
        self.current_text.clear();
        self.thinking.clear();
        self.tools.clear();
        self.current_tool_id = None;
        self.metadata_usage = None;
    }
}
