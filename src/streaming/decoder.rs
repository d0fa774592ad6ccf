use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, ready};

use crate::error::StreamError;
use crate::models::{AssembledMessage, ContentBlock, StreamEvent};
use crate::streaming::assembler::MessageAssembler;
use crate::streaming::classifier::EventClassifier;
use crate::streaming::lines::ChunkReassembler;
use crate::streaming::thinking::{ThinkingDetector, ThinkingMode};

/// One stream's full decoding pipeline: chunks -> lines -> events -> message.
///
/// An instance owns all per-stream state and must not be shared between
/// streams. Decoding is total: any byte sequence, including garbage, yields
/// some (possibly empty) event sequence without failing.
pub struct StreamDecoder {
    lines: ChunkReassembler,
    classifier: EventClassifier,
    thinking: Box<dyn ThinkingDetector>,
    assembler: MessageAssembler,
    message: Option<AssembledMessage>,
    emitted: usize,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(mode: ThinkingMode) -> Self {
        Self::with_detector(mode.detector())
    }

    pub fn with_detector(thinking: Box<dyn ThinkingDetector>) -> Self {
        Self {
            lines: ChunkReassembler::new(),
            classifier: EventClassifier::new(),
            thinking,
            assembler: MessageAssembler::new(),
            message: None,
            emitted: 0,
            finished: false,
        }
    }

    /// Feed one raw chunk and return the events it completed
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<StreamEvent> {
        let out = self.decode(chunk);
        self.observe(&out);
        out
    }

    /// Pass an externally produced event (e.g. a transport error) through the pipeline
    pub fn inject(&mut self, event: StreamEvent) -> Vec<StreamEvent> {
        let out = self.detect(event);
        self.observe(&out);
        out
    }

    /// End of input: drop any unterminated line and release withheld text
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let out = self.drain();
        self.observe(&out);
        out
    }

    /// The assembled message, once a `MessageStop` has been decoded
    pub fn message(&self) -> Option<&AssembledMessage> {
        self.message.as_ref()
    }

    pub fn take_message(&mut self) -> Option<AssembledMessage> {
        self.message.take()
    }

    /// Block finished by the most recently observed event, if any
    pub fn last_completed_block(&self) -> Option<&ContentBlock> {
        self.assembler.last_completed_block()
    }

    /// Number of events emitted so far; an event's sequence position is its index
    pub fn events_emitted(&self) -> usize {
        self.emitted
    }

    fn decode(&mut self, chunk: impl AsRef<[u8]>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        for line in self.lines.feed(chunk) {
            if let Some(event) = self.classifier.classify(&line) {
                self.thinking.process(event, &mut out);
            }
        }
        out
    }

    fn detect(&mut self, event: StreamEvent) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        self.thinking.process(event, &mut out);
        out
    }

    fn drain(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        self.lines.finish();
        let mut out = Vec::new();
        self.thinking.finish(&mut out);
        out
    }

    fn observe(&mut self, events: &[StreamEvent]) {
        for event in events {
            if let Some(message) = self.assembler.process_event(event) {
                tracing::debug!(
                    blocks = message.content.len(),
                    stop_reason = ?message.stop_reason,
                    "Message assembled"
                );
                self.message = Some(message);
            }
        }
        self.emitted += events.len();
    }
}

/// Shared driver behind the blocking and async adapters, so both behave
/// identically for the same chunk sequence.
///
/// Queued events reach the assembler only as they are handed out, so the
/// decoder's message state always matches what the caller has seen.
struct Pump {
    decoder: StreamDecoder,
    queue: VecDeque<StreamEvent>,
    done: bool,
}

impl Pump {
    fn new(mode: ThinkingMode) -> Self {
        Self {
            decoder: StreamDecoder::new(mode),
            queue: VecDeque::new(),
            done: false,
        }
    }

    fn push<B, E>(&mut self, item: Option<Result<B, E>>)
    where
        B: AsRef<[u8]>,
        E: Into<StreamError>,
    {
        match item {
            Some(Ok(chunk)) => self.queue.extend(self.decoder.decode(chunk)),
            Some(Err(e)) => {
                let e: StreamError = e.into();
                tracing::error!(error = %e, "Chunk source failed, ending stream");
                // Text received before the failure is still delivered
                self.queue.extend(self.decoder.drain());
                self.queue.extend(
                    self.decoder
                        .detect(StreamEvent::transport_error(e.to_string(), e.error_type())),
                );
                self.done = true;
            }
            None => {
                self.queue.extend(self.decoder.drain());
                self.done = true;
            }
        }
    }

    fn pop(&mut self) -> Option<StreamEvent> {
        let event = self.queue.pop_front()?;
        self.decoder.observe(std::slice::from_ref(&event));
        Some(event)
    }
}

/// Blocking adapter: decodes events while pulling chunks from an iterator
pub struct EventIter<I> {
    chunks: I,
    pump: Pump,
}

impl<I> EventIter<I> {
    pub fn new(chunks: I, mode: ThinkingMode) -> Self {
        Self {
            chunks,
            pump: Pump::new(mode),
        }
    }

    pub fn decoder(&self) -> &StreamDecoder {
        &self.pump.decoder
    }

    pub fn message(&self) -> Option<&AssembledMessage> {
        self.pump.decoder.message()
    }

    pub fn into_message(mut self) -> Option<AssembledMessage> {
        self.pump.decoder.take_message()
    }
}

impl<I, B, E> Iterator for EventIter<I>
where
    I: Iterator<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<StreamError>,
{
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pump.pop() {
                return Some(event);
            }
            if self.pump.done {
                return None;
            }
            let item = self.chunks.next();
            self.pump.push(item);
        }
    }
}

/// Async adapter: a `Stream` of events over a `Stream` of chunks.
///
/// Awaiting the next chunk is the only suspension point. Dropping the
/// adapter drops the chunk source, which releases the connection.
pub struct EventStream<S> {
    chunks: S,
    pump: Pump,
}

impl<S> EventStream<S> {
    pub fn new(chunks: S, mode: ThinkingMode) -> Self {
        Self {
            chunks,
            pump: Pump::new(mode),
        }
    }

    pub fn decoder(&self) -> &StreamDecoder {
        &self.pump.decoder
    }

    pub fn message(&self) -> Option<&AssembledMessage> {
        self.pump.decoder.message()
    }

    pub fn into_message(mut self) -> Option<AssembledMessage> {
        self.pump.decoder.take_message()
    }
}

impl<S, B, E> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<StreamError>,
{
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pump.pop() {
                return Poll::Ready(Some(event));
            }
            if this.pump.done {
                return Poll::Ready(None);
            }
            let item = ready!(this.chunks.poll_next_unpin(cx));
            this.pump.push(item);
        }
    }
}

/// Decode a blocking chunk source
pub fn decode_iter<I, B, E>(chunks: I, mode: ThinkingMode) -> EventIter<I::IntoIter>
where
    I: IntoIterator<Item = Result<B, E>>,
{
    EventIter::new(chunks.into_iter(), mode)
}

/// Decode an async chunk source
pub fn decode_stream<S>(chunks: S, mode: ThinkingMode) -> EventStream<S> {
    EventStream::new(chunks, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const STREAM: &str = concat!(
        "{\"event\":{\"messageStart\":{\"role\":\"assistant\"}}}\n",
        "{\"event\":{\"contentBlockStart\":{}}}\n",
        "{\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\"Hi\"}}}}\n",
        "{\"event\":{\"contentBlockStop\":{}}}\n",
        "{\"event\":{\"messageStop\":{\"stop_reason\":\"end_turn\"}}}\n",
    );

    #[test]
    fn test_feed_whole_stream() {
        let mut decoder = StreamDecoder::new(ThinkingMode::Structured);
        let events = decoder.feed(STREAM);
        assert_eq!(events.len(), 5);
        assert_eq!(decoder.events_emitted(), 5);
        assert_eq!(decoder.message().unwrap().text(), "Hi");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_garbage_input_is_total() {
        let mut decoder = StreamDecoder::new(ThinkingMode::InlineTags);
        let mut events = decoder.feed(b"\xff\xfe\x00garbage\n{{{{\n\"str\"\n[]\nnull\n".as_slice());
        events.extend(decoder.finish());
        assert!(events.is_empty());
        assert!(decoder.message().is_none());
    }

    #[test]
    fn test_iterator_reports_chunk_error() {
        let chunks: Vec<Result<&str, StreamError>> = vec![
            Ok("{\"event\":{\"messageStart\":{}}}\n"),
            Err(StreamError::Upstream {
                status: 500,
                body: "boom".to_string(),
            }),
            Ok("{\"event\":{\"messageStop\":{}}}\n"),
        ];
        let events: Vec<_> = decode_iter(chunks, ThinkingMode::Structured).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            StreamEvent::Error { error_type, .. } if error_type == "http_error"
        ));
    }

    #[test]
    fn test_iterator_keeps_message() {
        let chunks = STREAM.as_bytes().chunks(7).map(Ok::<_, Infallible>);
        let mut iter = decode_iter(chunks, ThinkingMode::Structured);
        let count = iter.by_ref().count();
        assert_eq!(count, 5);
        let message = iter.into_message().unwrap();
        assert_eq!(message.stop_reason.as_deref(), Some("end_turn"));
    }
}
