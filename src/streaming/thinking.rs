use serde::Deserialize;

use crate::models::StreamEvent;

pub const THINKING_BEGIN: &str = "<thinking>";
pub const THINKING_END: &str = "</thinking>";

/// How thinking content reaches the decoder, chosen once per stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMode {
    /// The transport emits reasoning blocks as their own events
    #[default]
    Structured,
    /// Thinking is inlined as `<thinking>...</thinking>` inside text deltas
    InlineTags,
}

impl ThinkingMode {
    pub fn detector(self) -> Box<dyn ThinkingDetector> {
        match self {
            ThinkingMode::Structured => Box::new(Passthrough),
            ThinkingMode::InlineTags => Box::new(ThinkingTagScanner::new()),
        }
    }
}

impl std::str::FromStr for ThinkingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" => Ok(ThinkingMode::Structured),
            "inline_tags" | "inline-tags" | "tags" => Ok(ThinkingMode::InlineTags),
            other => Err(format!("unknown thinking mode: {}", other)),
        }
    }
}

/// Re-annotates classified events with thinking boundaries
pub trait ThinkingDetector: Send {
    /// Consume one event and push its replacement(s) onto `out`
    fn process(&mut self, event: StreamEvent, out: &mut Vec<StreamEvent>);

    /// End of stream: release anything still held back
    fn finish(&mut self, out: &mut Vec<StreamEvent>);
}

/// Used when the transport already supplies structured thinking events
#[derive(Debug, Default)]
pub struct Passthrough;

impl ThinkingDetector for Passthrough {
    fn process(&mut self, event: StreamEvent, out: &mut Vec<StreamEvent>) {
        out.push(event);
    }

    fn finish(&mut self, _out: &mut Vec<StreamEvent>) {}
}

/// Splits inline thinking markers out of plain text deltas.
///
/// Text that could be the start of a marker split across deltas is withheld
/// until the next delta decides it, so no partial marker ever reaches the
/// output. The withheld suffix is always shorter than the longer marker.
#[derive(Debug)]
pub struct ThinkingTagScanner {
    begin: String,
    end: String,
    in_marked_region: bool,
    pending: String,
}

impl ThinkingTagScanner {
    pub fn new() -> Self {
        Self::with_markers(THINKING_BEGIN, THINKING_END)
    }

    pub fn with_markers(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
            in_marked_region: false,
            pending: String::new(),
        }
    }

    pub fn in_marked_region(&self) -> bool {
        self.in_marked_region
    }

    /// Text currently withheld as a possible partial marker
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn reset(&mut self) {
        self.in_marked_region = false;
        self.pending.clear();
    }

    fn scan(&mut self, out: &mut Vec<StreamEvent>) {
        loop {
            let marker = if self.in_marked_region {
                &self.end
            } else {
                &self.begin
            };

            if let Some(pos) = self.pending.find(marker.as_str()) {
                let marker_len = marker.len();
                let before: String = self.pending.drain(..pos).collect();
                self.pending.drain(..marker_len);
                self.emit(before, out);
                if self.in_marked_region {
                    out.push(StreamEvent::ThinkingStop);
                } else {
                    out.push(StreamEvent::ThinkingStart);
                }
                self.in_marked_region = !self.in_marked_region;
                continue;
            }

            let keep = partial_marker_len(&self.pending, marker);
            let safe = self.pending.len() - keep;
            let ready: String = self.pending.drain(..safe).collect();
            self.emit(ready, out);
            return;
        }
    }

    /// Release withheld text as whatever the current region is
    fn flush(&mut self, out: &mut Vec<StreamEvent>) {
        let held = std::mem::take(&mut self.pending);
        self.emit(held, out);
    }

    fn close_region(&mut self, out: &mut Vec<StreamEvent>) {
        self.flush(out);
        if self.in_marked_region {
            out.push(StreamEvent::ThinkingStop);
            self.in_marked_region = false;
        }
    }

    fn emit(&self, text: String, out: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        if self.in_marked_region {
            out.push(StreamEvent::ThinkingDelta { text });
        } else {
            out.push(StreamEvent::ContentBlockDelta { text });
        }
    }
}

impl Default for ThinkingTagScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkingDetector for ThinkingTagScanner {
    fn process(&mut self, event: StreamEvent, out: &mut Vec<StreamEvent>) {
        match event {
            StreamEvent::ContentBlockDelta { text } => {
                self.pending.push_str(&text);
                self.scan(out);
            }
            StreamEvent::MessageStart { .. } => {
                self.reset();
                out.push(event);
            }
            StreamEvent::MessageStop { .. } => {
                self.close_region(out);
                out.push(event);
            }
            StreamEvent::ContentBlockStart
            | StreamEvent::ContentBlockStop
            | StreamEvent::ThinkingStart
            | StreamEvent::ToolUseStart { .. }
            | StreamEvent::Error { .. } => {
                self.flush(out);
                out.push(event);
            }
            // Trace records and other blocks' deltas can interleave with a
            // split marker; the withheld text stays put until the text ends
            other => out.push(other),
        }
    }

    fn finish(&mut self, out: &mut Vec<StreamEvent>) {
        self.close_region(out);
    }
}

/// Length of the longest suffix of `text` that is a strict prefix of `marker`
fn partial_marker_len(text: &str, marker: &str) -> usize {
    marker
        .char_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(scanner: &mut ThinkingTagScanner, deltas: &[&str]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        for delta in deltas {
            scanner.process(StreamEvent::text_delta(*delta), &mut out);
        }
        scanner.finish(&mut out);
        out
    }

    fn split_streams(events: &[StreamEvent]) -> (String, String) {
        let mut text = String::new();
        let mut thinking = String::new();
        for event in events {
            match event {
                StreamEvent::ContentBlockDelta { text: t } => text.push_str(t),
                StreamEvent::ThinkingDelta { text: t } => thinking.push_str(t),
                _ => {}
            }
        }
        (text, thinking)
    }

    #[test]
    fn test_marker_pair_in_one_delta() {
        let mut scanner = ThinkingTagScanner::new();
        let out = run(&mut scanner, &["before <thinking>mid</thinking>after"]);
        assert_eq!(
            out,
            vec![
                StreamEvent::text_delta("before "),
                StreamEvent::ThinkingStart,
                StreamEvent::thinking_delta("mid"),
                StreamEvent::ThinkingStop,
                StreamEvent::text_delta("after"),
            ]
        );
    }

    #[test]
    fn test_every_split_point_gives_same_output() {
        let input = "before <thinking>mid</thinking>after";
        for split in 1..input.len() {
            let mut scanner = ThinkingTagScanner::new();
            let out = run(&mut scanner, &[&input[..split], &input[split..]]);
            assert_eq!(split_streams(&out), ("before after".into(), "mid".into()));
        }
    }

    #[test]
    fn test_char_by_char_never_leaks_marker_fragments() {
        let input = "before <thinking>mid</thinking>after";
        let chars: Vec<String> = input.chars().map(String::from).collect();
        let deltas: Vec<&str> = chars.iter().map(String::as_str).collect();

        let mut scanner = ThinkingTagScanner::new();
        let out = run(&mut scanner, &deltas);

        for event in &out {
            if let Some(text) = event.text() {
                assert!(!text.contains('<') && !text.contains('>'), "{event:?}");
            }
        }
        assert_eq!(split_streams(&out), ("before after".into(), "mid".into()));
        assert_eq!(
            out.iter().filter(|e| **e == StreamEvent::ThinkingStart).count(),
            1
        );
    }

    #[test]
    fn test_partial_marker_withheld_then_released() {
        let mut scanner = ThinkingTagScanner::new();
        let mut out = Vec::new();

        scanner.process(StreamEvent::text_delta("a <thin"), &mut out);
        assert_eq!(out, vec![StreamEvent::text_delta("a ")]);
        assert_eq!(scanner.pending(), "<thin");

        // Not a marker after all
        scanner.process(StreamEvent::text_delta("g>"), &mut out);
        assert_eq!(out.last(), Some(&StreamEvent::text_delta("<thing>")));
        assert_eq!(scanner.pending(), "");
    }

    #[test]
    fn test_pending_flushed_before_block_stop() {
        let mut scanner = ThinkingTagScanner::new();
        let mut out = Vec::new();
        scanner.process(StreamEvent::text_delta("x <"), &mut out);
        scanner.process(StreamEvent::ContentBlockStop, &mut out);
        assert_eq!(
            out,
            vec![
                StreamEvent::text_delta("x "),
                StreamEvent::text_delta("<"),
                StreamEvent::ContentBlockStop,
            ]
        );
    }

    #[test]
    fn test_trace_record_does_not_release_partial_marker() {
        let mut scanner = ThinkingTagScanner::new();
        let mut out = Vec::new();
        let trace = StreamEvent::Unknown {
            data: serde_json::json!({"data": "a <thin", "delta": {"text": "a <thin"}}),
        };

        scanner.process(StreamEvent::text_delta("a <thin"), &mut out);
        scanner.process(trace.clone(), &mut out);
        assert_eq!(scanner.pending(), "<thin");
        scanner.process(StreamEvent::text_delta("king>x</thinking>b"), &mut out);
        scanner.finish(&mut out);

        assert_eq!(split_streams(&out), ("a b".to_string(), "x".to_string()));
        assert_eq!(
            out,
            vec![
                StreamEvent::text_delta("a "),
                trace,
                StreamEvent::ThinkingStart,
                StreamEvent::thinking_delta("x"),
                StreamEvent::ThinkingStop,
                StreamEvent::text_delta("b"),
            ]
        );
    }

    #[test]
    fn test_unterminated_region_closed_at_finish() {
        let mut scanner = ThinkingTagScanner::new();
        let out = run(&mut scanner, &["<thinking>still going</thin"]);
        assert_eq!(
            out,
            vec![
                StreamEvent::ThinkingStart,
                StreamEvent::thinking_delta("still going"),
                StreamEvent::thinking_delta("</thin"),
                StreamEvent::ThinkingStop,
            ]
        );
        assert!(!scanner.in_marked_region());
    }

    #[test]
    fn test_nested_begin_marker_is_thinking_text() {
        let mut scanner = ThinkingTagScanner::new();
        let out = run(&mut scanner, &["<thinking>a<thinking>b</thinking>c"]);
        assert_eq!(
            split_streams(&out),
            ("c".to_string(), "a<thinking>b".to_string())
        );
    }

    #[test]
    fn test_pending_stays_bounded() {
        let mut scanner = ThinkingTagScanner::new();
        let mut out = Vec::new();
        for _ in 0..1000 {
            scanner.process(StreamEvent::text_delta("lorem ipsum <"), &mut out);
            assert!(scanner.pending().len() < THINKING_END.len());
        }
    }

    #[test]
    fn test_message_start_resets_state() {
        let mut scanner = ThinkingTagScanner::new();
        let mut out = Vec::new();
        scanner.process(StreamEvent::text_delta("<thinking>x"), &mut out);
        assert!(scanner.in_marked_region());
        scanner.process(
            StreamEvent::MessageStart {
                role: "assistant".into(),
                model: None,
            },
            &mut out,
        );
        assert!(!scanner.in_marked_region());
        assert_eq!(scanner.pending(), "");
    }

    #[test]
    fn test_passthrough_leaves_text_untouched() {
        let mut detector = ThinkingMode::Structured.detector();
        let mut out = Vec::new();
        detector.process(StreamEvent::text_delta("<thinking>x</thinking>"), &mut out);
        detector.finish(&mut out);
        assert_eq!(out, vec![StreamEvent::text_delta("<thinking>x</thinking>")]);
    }

    #[test]
    fn test_partial_marker_len() {
        assert_eq!(partial_marker_len("abc<thi", THINKING_BEGIN), 4);
        assert_eq!(partial_marker_len("abc", THINKING_BEGIN), 0);
        assert_eq!(partial_marker_len("<thinking", THINKING_BEGIN), 9);
        assert_eq!(partial_marker_len("x</", THINKING_END), 2);
        assert_eq!(partial_marker_len("", THINKING_END), 0);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("inline_tags".parse(), Ok(ThinkingMode::InlineTags));
        assert_eq!("Structured".parse(), Ok(ThinkingMode::Structured));
        assert!("bogus".parse::<ThinkingMode>().is_err());
    }
}
