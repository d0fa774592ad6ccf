use std::io::{self, Write};

use crate::models::{StreamEvent, ToolInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Thinking,
    Content,
    Tool,
}

/// Writes decoded events to a terminal as they arrive
pub struct EventRenderer<W: Write> {
    out: W,
    verbose: bool,
    show_thinking: bool,
    section: Option<Section>,
    tool_input: String,
}

impl<W: Write> EventRenderer<W> {
    pub fn new(out: W, verbose: bool, show_thinking: bool) -> Self {
        Self {
            out,
            verbose,
            show_thinking,
            section: None,
            tool_input: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, event: &StreamEvent) -> io::Result<()> {
        if self.verbose {
            let json = serde_json::to_string(event).unwrap_or_default();
            return writeln!(self.out, "[{}] {}", event.kind(), json);
        }

        match event {
            StreamEvent::MessageStart { role, model } => {
                writeln!(self.out, "\n{}", "=".repeat(60))?;
                writeln!(
                    self.out,
                    "Model: {} | Role: {}",
                    model.as_deref().unwrap_or("unknown"),
                    role
                )?;
                writeln!(self.out, "{}", "=".repeat(60))?;
            }
            StreamEvent::ThinkingStart if self.show_thinking => {
                self.section = Some(Section::Thinking);
                writeln!(self.out, "\nThinking...")?;
            }
            StreamEvent::ThinkingDelta { text } if self.show_thinking => {
                write!(self.out, "{}", text)?;
            }
            StreamEvent::ThinkingStop if self.show_thinking => {
                writeln!(self.out, "\n{}", "-".repeat(50))?;
                self.section = None;
            }
            StreamEvent::ContentBlockStart => self.enter_content()?,
            StreamEvent::ContentBlockDelta { text } => {
                self.enter_content()?;
                write!(self.out, "{}", text)?;
            }
            StreamEvent::ContentBlockStop => {
                writeln!(self.out)?;
                self.section = None;
            }
            StreamEvent::ToolUseStart { id, name } => {
                self.section = Some(Section::Tool);
                self.tool_input.clear();
                writeln!(self.out, "\nUsing tool: {}", name)?;
                writeln!(self.out, "   Tool ID: {}", id)?;
            }
            StreamEvent::ToolUseDelta { input } => self.tool_input.push_str(input),
            StreamEvent::ToolUseStop => {
                let raw = std::mem::take(&mut self.tool_input);
                match ToolInput::parse(raw) {
                    ToolInput::Json(value) => writeln!(
                        self.out,
                        "   Input: {}",
                        serde_json::to_string_pretty(&value).unwrap_or_default()
                    )?,
                    ToolInput::Raw(raw) => writeln!(self.out, "   Input: {}", raw)?,
                }
                writeln!(self.out, "   Tool completed")?;
                self.section = None;
            }
            StreamEvent::MessageStop { usage, stop_reason } => {
                writeln!(self.out, "\n{}", "=".repeat(60))?;
                if let Some(usage) = usage {
                    writeln!(self.out, "Usage:")?;
                    writeln!(self.out, "   Input tokens: {}", count(usage.input_tokens))?;
                    writeln!(self.out, "   Output tokens: {}", count(usage.output_tokens))?;
                    writeln!(self.out, "   Total tokens: {}", count(usage.total_tokens))?;
                }
                if let Some(reason) = stop_reason {
                    writeln!(self.out, "Stop reason: {}", reason)?;
                }
                writeln!(self.out, "{}", "=".repeat(60))?;
            }
            StreamEvent::Error { error, error_type } => {
                writeln!(self.out, "\nERROR ({}): {}", error_type, error)?;
            }
            _ => {}
        }

        self.out.flush()
    }

    fn enter_content(&mut self) -> io::Result<()> {
        if self.section != Some(Section::Content) {
            self.section = Some(Section::Content);
            writeln!(self.out, "\nResponse:\n")?;
        }
        Ok(())
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Usage;

    fn render_all(events: &[StreamEvent], verbose: bool, show_thinking: bool) -> String {
        let mut renderer = EventRenderer::new(Vec::new(), verbose, show_thinking);
        for event in events {
            renderer.render(event).unwrap();
        }
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_renders_response_and_usage() {
        let output = render_all(
            &[
                StreamEvent::text_delta("Hel"),
                StreamEvent::text_delta("lo"),
                StreamEvent::ContentBlockStop,
                StreamEvent::MessageStop {
                    usage: Some(Usage {
                        total_tokens: Some(5),
                        ..Default::default()
                    }),
                    stop_reason: Some("end_turn".to_string()),
                },
            ],
            false,
            true,
        );
        assert_eq!(output.matches("Response:").count(), 1);
        assert!(output.contains("Hello"));
        assert!(output.contains("Total tokens: 5"));
        assert!(output.contains("Input tokens: N/A"));
        assert!(output.contains("Stop reason: end_turn"));
    }

    #[test]
    fn test_hides_thinking() {
        let events = [
            StreamEvent::ThinkingStart,
            StreamEvent::thinking_delta("secret"),
            StreamEvent::ThinkingStop,
        ];
        assert!(!render_all(&events, false, false).contains("secret"));
        assert!(render_all(&events, false, true).contains("secret"));
    }

    #[test]
    fn test_tool_input_pretty_or_raw() {
        let output = render_all(
            &[
                StreamEvent::ToolUseStart {
                    id: "t1".to_string(),
                    name: "search".to_string(),
                },
                StreamEvent::ToolUseDelta {
                    input: "{\"q\":1".to_string(),
                },
                StreamEvent::ToolUseStop,
            ],
            false,
            true,
        );
        assert!(output.contains("Using tool: search"));
        assert!(output.contains("Input: {\"q\":1"));
    }

    #[test]
    fn test_verbose_prints_kind() {
        let output = render_all(&[StreamEvent::ToolUseStop], true, true);
        assert_eq!(output, "[tool_use_stop] {\"type\":\"tool_use_stop\"}\n");
    }
}
