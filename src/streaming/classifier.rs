use serde_json::Value;

use crate::models::{StreamEvent, Usage};

/// Keys of top-level records that announce the agent's event loop starting
const INIT_KEYS: [&str; 3] = ["init_event_loop", "start", "start_event_loop"];

/// Kind of content block the classifier last saw opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OpenBlock {
    #[default]
    Text,
    Reasoning,
    ToolUse,
}

/// Maps one complete line of the wire format to a typed event.
///
/// The wire format has no explicit type tag: records are distinguished by
/// which key they carry. Anything that is not a JSON object is dropped, since
/// the transport interleaves debug output with protocol records.
///
/// The only state kept across lines is the kind of the open content block,
/// which decides what a `contentBlockStop` closes. It lives on the instance,
/// so every stream gets its own.
#[derive(Debug, Default)]
pub struct EventClassifier {
    open_block: OpenBlock,
}

impl EventClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reasoning block is currently open
    pub fn in_reasoning_block(&self) -> bool {
        self.open_block == OpenBlock::Reasoning
    }

    pub fn classify(&mut self, line: &str) -> Option<StreamEvent> {
        let line = strip_sse_prefix(line.trim());
        if line.is_empty() {
            return None;
        }

        let mut record = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => record,
            Ok(_) => {
                tracing::trace!("Skipping non-object JSON line");
                return None;
            }
            Err(_) => {
                tracing::trace!(line, "Skipping malformed line");
                return None;
            }
        };

        if let Some(event) = record.remove("event") {
            return Some(self.classify_event(event));
        }

        if let Some(message) = record.remove("message") {
            // Final summary of the turn; the stop was already announced by the event stream
            return Some(StreamEvent::Unknown { data: message });
        }

        if record.contains_key("result")
            || INIT_KEYS.iter().any(|k| record.contains_key(*k))
            || record.contains_key("data")
        {
            return Some(StreamEvent::Unknown {
                data: Value::Object(record),
            });
        }

        tracing::trace!("Ignoring unrecognised record");
        None
    }

    fn classify_event(&mut self, event: Value) -> StreamEvent {
        let mut event = match event {
            Value::Object(event) => event,
            other => return StreamEvent::Unknown { data: other },
        };

        if let Some(start) = event.remove("messageStart") {
            return StreamEvent::MessageStart {
                role: str_field(&start, "role").unwrap_or_else(|| "assistant".to_string()),
                model: str_field(&start, "model"),
            };
        }

        if let Some(block) = event.remove("contentBlockDelta") {
            let delta = block.get("delta").unwrap_or(&Value::Null);
            if let Some(reasoning) = delta.get("reasoningContent") {
                return StreamEvent::ThinkingDelta {
                    text: str_field(reasoning, "text").unwrap_or_default(),
                };
            }
            if let Some(tool_use) = delta.get("toolUse") {
                return StreamEvent::ToolUseDelta {
                    input: str_field(tool_use, "input").unwrap_or_default(),
                };
            }
            return StreamEvent::ContentBlockDelta {
                text: str_field(delta, "text").unwrap_or_default(),
            };
        }

        if let Some(block) = event.remove("contentBlockStart") {
            let start = block.get("start").unwrap_or(&Value::Null);
            if let Some(tool_use) = start.get("toolUse") {
                self.open_block = OpenBlock::ToolUse;
                return StreamEvent::ToolUseStart {
                    id: str_field(tool_use, "toolUseId").unwrap_or_default(),
                    name: str_field(tool_use, "name").unwrap_or_default(),
                };
            }
            if start.get("reasoningContent").is_some() {
                self.open_block = OpenBlock::Reasoning;
                return StreamEvent::ThinkingStart;
            }
            self.open_block = OpenBlock::Text;
            return StreamEvent::ContentBlockStart;
        }

        if event.remove("contentBlockStop").is_some() {
            return match std::mem::take(&mut self.open_block) {
                OpenBlock::Reasoning => StreamEvent::ThinkingStop,
                OpenBlock::ToolUse => StreamEvent::ToolUseStop,
                OpenBlock::Text => StreamEvent::ContentBlockStop,
            };
        }

        if let Some(stop) = event.remove("messageStop") {
            self.open_block = OpenBlock::Text;
            return StreamEvent::MessageStop {
                usage: usage_from(&stop),
                stop_reason: str_field(&stop, "stop_reason")
                    .or_else(|| str_field(&stop, "stopReason")),
            };
        }

        if let Some(metadata) = event.remove("metadata") {
            return StreamEvent::Unknown { data: metadata };
        }

        StreamEvent::Unknown {
            data: Value::Object(event),
        }
    }
}

fn strip_sse_prefix(line: &str) -> &str {
    match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Pull a `usage` object out of an informational record, if it has one
pub(crate) fn usage_from(data: &Value) -> Option<Usage> {
    data.get("usage")
        .filter(|u| u.is_object())
        .and_then(|u| serde_json::from_value(u.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(line: &str) -> Option<StreamEvent> {
        EventClassifier::new().classify(line)
    }

    #[test]
    fn test_malformed_lines_dropped() {
        assert_eq!(classify("not json"), None);
        assert_eq!(classify("{\"event\":"), None);
        assert_eq!(classify("\"just a string\""), None);
        assert_eq!(classify("[1,2,3]"), None);
        assert_eq!(classify("42"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("data: [DONE]"), None);
    }

    #[test]
    fn test_message_start_defaults_role() {
        assert_eq!(
            classify(r#"{"event":{"messageStart":{}}}"#),
            Some(StreamEvent::MessageStart {
                role: "assistant".to_string(),
                model: None
            })
        );
        assert_eq!(
            classify(r#"data: {"event":{"messageStart":{"role":"assistant","model":"nova"}}}"#),
            Some(StreamEvent::MessageStart {
                role: "assistant".to_string(),
                model: Some("nova".to_string())
            })
        );
    }

    #[test]
    fn test_delta_variants() {
        assert_eq!(
            classify(r#"{"event":{"contentBlockDelta":{"delta":{"text":"Hi"}}}}"#),
            Some(StreamEvent::text_delta("Hi"))
        );
        assert_eq!(
            classify(
                r#"{"event":{"contentBlockDelta":{"delta":{"reasoningContent":{"text":"hmm"}}}}}"#
            ),
            Some(StreamEvent::thinking_delta("hmm"))
        );
        assert_eq!(
            classify(r#"{"event":{"contentBlockDelta":{"delta":{"toolUse":{"input":"{\"q\":"}}}}}"#),
            Some(StreamEvent::ToolUseDelta {
                input: "{\"q\":".to_string()
            })
        );
        assert_eq!(
            classify(r#"{"event":{"contentBlockDelta":{}}}"#),
            Some(StreamEvent::text_delta(""))
        );
    }

    #[test]
    fn test_block_stop_follows_open_block() {
        let mut classifier = EventClassifier::new();

        classifier.classify(r#"{"event":{"contentBlockStart":{"start":{"reasoningContent":{}}}}}"#);
        assert!(classifier.in_reasoning_block());
        assert_eq!(
            classifier.classify(r#"{"event":{"contentBlockStop":{}}}"#),
            Some(StreamEvent::ThinkingStop)
        );
        assert!(!classifier.in_reasoning_block());

        assert_eq!(
            classifier.classify(
                r#"{"event":{"contentBlockStart":{"start":{"toolUse":{"toolUseId":"t1","name":"search"}}}}}"#
            ),
            Some(StreamEvent::ToolUseStart {
                id: "t1".to_string(),
                name: "search".to_string()
            })
        );
        assert_eq!(
            classifier.classify(r#"{"event":{"contentBlockStop":{}}}"#),
            Some(StreamEvent::ToolUseStop)
        );

        assert_eq!(
            classifier.classify(r#"{"event":{"contentBlockStart":{}}}"#),
            Some(StreamEvent::ContentBlockStart)
        );
        assert_eq!(
            classifier.classify(r#"{"event":{"contentBlockStop":{}}}"#),
            Some(StreamEvent::ContentBlockStop)
        );
    }

    #[test]
    fn test_reasoning_flag_is_per_instance() {
        let mut first = EventClassifier::new();
        let mut second = EventClassifier::new();
        first.classify(r#"{"event":{"contentBlockStart":{"start":{"reasoningContent":{}}}}}"#);

        assert_eq!(
            second.classify(r#"{"event":{"contentBlockStop":{}}}"#),
            Some(StreamEvent::ContentBlockStop)
        );
        assert_eq!(
            first.classify(r#"{"event":{"contentBlockStop":{}}}"#),
            Some(StreamEvent::ThinkingStop)
        );
    }

    #[test]
    fn test_message_stop_reads_both_spellings() {
        assert_eq!(
            classify(
                r#"{"event":{"messageStop":{"usage":{"totalTokens":5},"stop_reason":"end_turn"}}}"#
            ),
            Some(StreamEvent::MessageStop {
                usage: Some(Usage {
                    total_tokens: Some(5),
                    ..Default::default()
                }),
                stop_reason: Some("end_turn".to_string())
            })
        );
        assert_eq!(
            classify(r#"{"event":{"messageStop":{"stopReason":"tool_use"}}}"#),
            Some(StreamEvent::MessageStop {
                usage: None,
                stop_reason: Some("tool_use".to_string())
            })
        );
    }

    #[test]
    fn test_informational_records_are_unknown() {
        let metadata = classify(r#"{"event":{"metadata":{"usage":{"totalTokens":9}}}}"#);
        assert_eq!(
            metadata,
            Some(StreamEvent::Unknown {
                data: json!({"usage": {"totalTokens": 9}})
            })
        );

        for line in [
            r#"{"message":{"role":"assistant","content":[]}}"#,
            r#"{"result":"done"}"#,
            r#"{"init_event_loop":true}"#,
            r#"{"start":true}"#,
            r#"{"start_event_loop":true}"#,
            r#"{"data":"partial text","delta":{}}"#,
            r#"{"event":{"somethingNew":{}}}"#,
        ] {
            let event = classify(line);
            assert!(
                matches!(event, Some(StreamEvent::Unknown { .. })),
                "{line} -> {event:?}"
            );
        }
    }

    #[test]
    fn test_summary_message_is_not_a_stop() {
        let event = classify(r#"{"message":{"stop_reason":"end_turn"}}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Unknown {
                data: json!({"stop_reason": "end_turn"})
            }
        );
    }

    #[test]
    fn test_unrelated_objects_ignored() {
        assert_eq!(classify(r#"{"ping": true}"#), None);
    }

    #[test]
    fn test_usage_from_metadata() {
        let data = json!({"usage": {"inputTokens": 1, "outputTokens": 2}});
        let usage = usage_from(&data).unwrap();
        assert_eq!(usage.input_tokens, Some(1));
        assert_eq!(usage.output_tokens, Some(2));
        assert_eq!(usage_from(&json!({"other": 1})), None);
    }
}
