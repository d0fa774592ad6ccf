use bytes::{Buf, BytesMut};

/// Reassembles arbitrarily split chunks into complete, newline-terminated lines.
///
/// Bytes are buffered until a `\n` arrives; each finished line is decoded as
/// UTF-8 on its own, so a multi-byte character split across two chunks is
/// never mangled. The trailing partial line is carried into the next `feed`.
pub struct ChunkReassembler {
    buffer: BytesMut,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Append a chunk and return every line it completed, trimmed.
    /// Blank lines are skipped.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<String> {
        let chunk = chunk.as_ref();
        // Only the new bytes can hold a terminator
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let last_newline = match chunk.iter().rposition(|&b| b == b'\n') {
            Some(pos) => scan_from + pos,
            None => return Vec::new(),
        };

        let complete = self.buffer.split_to(last_newline + 1);
        complete[..]
            .split(|&b| b == b'\n')
            .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Bytes held back waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: an unterminated trailing line is not a complete record
    /// and is dropped. Returns the number of discarded bytes.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buffer.len();
        if discarded > 0 {
            tracing::debug!(
                bytes = discarded,
                "Discarding unterminated trailing line at end of stream"
            );
            self.buffer.advance(discarded);
        }
        if self.buffer.capacity() > 65536 {
            self.buffer = BytesMut::with_capacity(8192);
        }
        discarded
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new()
    }
}
