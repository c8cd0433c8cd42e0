//! Chunk buffer for reassembling frames from partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. Raw transport
//! reads may deliver a frame split at any byte boundary, or several frames
//! coalesced into one read; [`ChunkBuffer::push`] handles both by
//! accumulating bytes and extracting every complete frame in an explicit
//! loop. A pathological stream of many small frames therefore never grows
//! the call stack.
//!
//! # Example
//!
//! ```
//! use nailpin::protocol::ChunkBuffer;
//!
//! let mut buffer = ChunkBuffer::new();
//!
//! // Data arrives in arbitrary pieces from the socket.
//! let chunks = buffer.push(&[0x00, 0x00, 0x00, 0x03]).unwrap();
//! assert!(chunks.is_empty()); // partial header, retained
//!
//! let chunks = buffer.push(&[0x31, b'a', b'b', b'c']).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].payload(), b"abc");
//! ```

use bytes::{Buf, BytesMut};

use super::chunk::{Chunk, ChunkType, CHUNK_HEADER_SIZE};
use crate::error::{NailpinError, Result};

/// Buffer for accumulating incoming bytes and extracting complete chunks.
///
/// Owned exclusively by one connection; grows on each raw read and shrinks
/// by exactly one frame's worth each time an extraction succeeds. The codec
/// never looks at previously-emitted chunks; it is purely a function of the
/// buffered bytes.
pub struct ChunkBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
}

impl ChunkBuffer {
    /// Create a new, empty chunk buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Push data into the buffer and extract all complete chunks.
    ///
    /// This is the main decode API. Returns the chunks whose frames
    /// completed with this read, in wire order. Partial frames stay
    /// buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns [`NailpinError::UnrecognizedChunkType`] if a type byte
    /// outside the nine known codes is seen. The condition is fatal to the
    /// connection; the buffer contents are left as-is.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Chunk>> {
        self.buffer.extend_from_slice(data);

        let mut chunks = Vec::new();
        while let Some(chunk) = self.try_extract_one()? {
            chunks.push(chunk);
        }

        Ok(chunks)
    }

    /// Try to extract a single chunk from the front of the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(chunk))` if a complete frame was consumed
    /// - `Ok(None)` if more data is needed (nothing is consumed)
    /// - `Err(...)` on an unrecognized type byte
    fn try_extract_one(&mut self) -> Result<Option<Chunk>> {
        if self.buffer.len() < CHUNK_HEADER_SIZE {
            return Ok(None);
        }

        // Peek the header without consuming it; an incomplete payload must
        // leave the header available for the next call.
        let payload_len =
            u32::from_be_bytes([self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]])
                as usize;
        let code = self.buffer[4];

        let chunk_type =
            ChunkType::from_code(code).ok_or(NailpinError::UnrecognizedChunkType(code))?;

        if self.buffer.len() < CHUNK_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        self.buffer.advance(CHUNK_HEADER_SIZE);
        let payload = self.buffer.split_to(payload_len).freeze();

        Ok(Some(Chunk::new(chunk_type, payload)))
    }

    /// Get the number of buffered, undecoded bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer holds no undecoded bytes.
    ///
    /// A non-empty buffer at transport end-of-stream means the final frame
    /// was truncated (a premature close, not a clean EOF).
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new()
    }
}
