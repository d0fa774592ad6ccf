pub mod event;
pub mod message;

pub use event::{EventKind, StreamEvent, Usage};
pub use message::{AssembledMessage, ContentBlock, ToolInput};
