pub mod assembler;
pub mod callbacks;
pub mod classifier;
pub mod decoder;
pub mod lines;
pub mod thinking;

pub use assembler::{MessageAssembler, ToolCallAccumulator};
pub use callbacks::StreamCallbacks;
pub use classifier::EventClassifier;
pub use decoder::{EventIter, EventStream, StreamDecoder, decode_iter, decode_stream};
pub use lines::ChunkReassembler;
pub use thinking::{Passthrough, ThinkingDetector, ThinkingMode, ThinkingTagScanner};
