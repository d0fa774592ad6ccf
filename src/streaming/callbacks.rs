use futures::{Stream, StreamExt};

use crate::error::StreamError;
use crate::models::{AssembledMessage, ContentBlock, StreamEvent};
use crate::streaming::decoder::{EventIter, EventStream};

type TextHandler<'a> = Box<dyn FnMut(&str) + 'a>;
type ToolHandler<'a> = Box<dyn FnMut(&ContentBlock) + 'a>;
type ErrorHandler<'a> = Box<dyn FnMut(&str, &str) + 'a>;

/// Push-style consumption of a decoded stream.
///
/// At most one handler runs per event. Tool handlers receive the finished
/// `ToolUse` block with its parsed input; error handlers receive the error
/// message and its type code.
#[derive(Default)]
pub struct StreamCallbacks<'a> {
    on_text: Option<TextHandler<'a>>,
    on_thinking: Option<TextHandler<'a>>,
    on_tool_use: Option<ToolHandler<'a>>,
    on_error: Option<ErrorHandler<'a>>,
}

impl<'a> StreamCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_text(mut self, handler: impl FnMut(&str) + 'a) -> Self {
        self.on_text = Some(Box::new(handler));
        self
    }

    pub fn on_thinking(mut self, handler: impl FnMut(&str) + 'a) -> Self {
        self.on_thinking = Some(Box::new(handler));
        self
    }

    pub fn on_tool_use(mut self, handler: impl FnMut(&ContentBlock) + 'a) -> Self {
        self.on_tool_use = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(&str, &str) + 'a) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Drive a blocking event iterator to completion
    pub fn run<I, B, E>(mut self, mut events: EventIter<I>) -> Option<AssembledMessage>
    where
        I: Iterator<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<StreamError>,
    {
        while let Some(event) = events.next() {
            self.dispatch(&event, events.decoder().last_completed_block());
        }
        events.into_message()
    }

    /// Drive an async event stream to completion
    pub async fn run_async<S, B, E>(mut self, mut events: EventStream<S>) -> Option<AssembledMessage>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<StreamError>,
    {
        while let Some(event) = events.next().await {
            self.dispatch(&event, events.decoder().last_completed_block());
        }
        events.into_message()
    }

    fn dispatch(&mut self, event: &StreamEvent, finished: Option<&ContentBlock>) {
        match event {
            StreamEvent::ContentBlockDelta { text } if !text.is_empty() => {
                if let Some(handler) = self.on_text.as_mut() {
                    handler(text);
                }
            }
            StreamEvent::ThinkingDelta { text } if !text.is_empty() => {
                if let Some(handler) = self.on_thinking.as_mut() {
                    handler(text);
                }
            }
            StreamEvent::ToolUseStop => {
                if let (Some(handler), Some(block @ ContentBlock::ToolUse { .. })) =
                    (self.on_tool_use.as_mut(), finished)
                {
                    handler(block);
                }
            }
            StreamEvent::Error { error, error_type } => {
                if let Some(handler) = self.on_error.as_mut() {
                    handler(error, error_type);
                }
            }
            _ => {}
        }
    }
}
