//! # AgentCore Stream
//!
//! An incremental decoder for the line-delimited event streams an AgentCore
//! agent pushes while it generates a response.
//!
//! ## Overview
//!
//! Data flows one way through a single pass:
//!
//! - **Chunks -> lines**: raw network chunks are reassembled into complete,
//!   newline-terminated lines; partial lines never reach the parser
//! - **Lines -> events**: each line is classified by shape into a typed
//!   [`StreamEvent`]; malformed or debug lines are dropped silently
//! - **Thinking detection**: inline `<thinking>` markers are split out of text
//!   deltas even when a marker straddles chunk boundaries
//! - **Events -> message**: the event sequence folds into one
//!   [`AssembledMessage`] with ordered content blocks and parsed tool calls
//!
//! ## Quick Start
//!
//! ```rust
//! use agentcore_stream::streaming::{ThinkingMode, decode_iter};
//! use std::convert::Infallible;
//!
//! let body = concat!(
//!     "{\"event\":{\"messageStart\":{\"role\":\"assistant\"}}}\n",
//!     "{\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\"Hi\"}}}}\n",
//!     "{\"event\":{\"contentBlockStop\":{}}}\n",
//!     "{\"event\":{\"messageStop\":{\"stop_reason\":\"end_turn\"}}}\n",
//! );
//!
//! let mut events = decode_iter(
//!     body.as_bytes().chunks(5).map(Ok::<_, Infallible>),
//!     ThinkingMode::Structured,
//! );
//! for event in events.by_ref() {
//!     println!("{}", event.kind());
//! }
//! let message = events.into_message().unwrap();
//! assert_eq!(message.text(), "Hi");
//! ```
//!
//! ## Modules
//!
//! - [`client`] - HTTP transport for AgentCore runtimes
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types and handling
//! - [`models`] - Events and the assembled message
//! - [`render`] - Terminal display of events
//! - [`streaming`] - Line reassembly, classification, thinking detection and assembly

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod streaming;

pub use client::AgentCoreClient;
pub use config::ClientConfig;
pub use error::{Result, StreamError};
pub use models::{AssembledMessage, ContentBlock, EventKind, StreamEvent, ToolInput, Usage};
