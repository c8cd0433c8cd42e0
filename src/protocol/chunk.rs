//! Chunk types and frame encoding.
//!
//! Implements the 5-byte frame header format:
//! ```text
//! ┌────────────────┬───────────┬───────────────┐
//! │ Payload length │ Type byte │ Payload       │
//! │ 4 bytes        │ 1 byte    │ N bytes       │
//! │ uint32 BE      │ ASCII     │ raw           │
//! └────────────────┴───────────┴───────────────┘
//! ```
//!
//! The length field describes only the payload, never the header.
//!
//! # Example
//!
//! ```
//! use nailpin::protocol::{encode_chunk, ChunkType, CHUNK_HEADER_SIZE};
//!
//! let frame = encode_chunk(ChunkType::Command, b"io.foldr.ngtesthost.Stdout");
//! assert_eq!(frame.len(), CHUNK_HEADER_SIZE + 26);
//! assert_eq!(&frame[..5], &[0x00, 0x00, 0x00, 0x1A, 0x43]);
//! ```

use bytes::Bytes;

/// Frame header size in bytes (fixed, exactly 5).
pub const CHUNK_HEADER_SIZE: usize = 5;

/// The nine chunk types of the protocol.
///
/// Each maps to exactly one single-byte ASCII wire code. Argument,
/// Environment, WorkingDirectory, Command, Stdin, and Eof flow
/// client-to-server only; Stdout, Stderr, and Exit flow server-to-client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// One command-line argument (`A`).
    Argument,
    /// One `KEY=VALUE` environment entry (`E`).
    Environment,
    /// The remote working directory (`D`).
    WorkingDirectory,
    /// The remote command to invoke (`C`).
    Command,
    /// Standard input payload (`0`).
    Stdin,
    /// Standard output payload (`1`).
    Stdout,
    /// Standard error payload (`2`).
    Stderr,
    /// End of standard input (`.`).
    Eof,
    /// Textual process exit code (`X`).
    Exit,
}

impl ChunkType {
    /// Wire code for this chunk type.
    #[inline]
    pub const fn code(self) -> u8 {
        match self {
            ChunkType::Argument => b'A',
            ChunkType::Environment => b'E',
            ChunkType::WorkingDirectory => b'D',
            ChunkType::Command => b'C',
            ChunkType::Stdin => b'0',
            ChunkType::Stdout => b'1',
            ChunkType::Stderr => b'2',
            ChunkType::Eof => b'.',
            ChunkType::Exit => b'X',
        }
    }

    /// Map a wire code back to a chunk type.
    ///
    /// Returns `None` for any byte outside the nine known codes; callers
    /// treat that as an unrecognized-chunk-type condition.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'A' => Some(ChunkType::Argument),
            b'E' => Some(ChunkType::Environment),
            b'D' => Some(ChunkType::WorkingDirectory),
            b'C' => Some(ChunkType::Command),
            b'0' => Some(ChunkType::Stdin),
            b'1' => Some(ChunkType::Stdout),
            b'2' => Some(ChunkType::Stderr),
            b'.' => Some(ChunkType::Eof),
            b'X' => Some(ChunkType::Exit),
            _ => None,
        }
    }

    /// Check if this type is legal in the server-to-client direction.
    #[inline]
    pub const fn is_server_chunk(self) -> bool {
        matches!(self, ChunkType::Stdout | ChunkType::Stderr | ChunkType::Exit)
    }
}

/// A complete protocol chunk: type tag plus payload.
///
/// Uses `bytes::Bytes` for zero-copy payload sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk type.
    pub chunk_type: ChunkType,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Chunk {
    /// Create a new chunk from type and payload.
    pub fn new(chunk_type: ChunkType, payload: Bytes) -> Self {
        Self {
            chunk_type,
            payload,
        }
    }

    /// Create a chunk from type and raw bytes (copies data).
    pub fn from_parts(chunk_type: ChunkType, payload: &[u8]) -> Self {
        Self {
            chunk_type,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Encode a chunk as a complete wire frame.
///
/// Writes the 4-byte big-endian payload length, the single ASCII type byte,
/// then the payload verbatim. No padding, no checksum. Always succeeds for
/// payload lengths representable in 32 bits.
///
/// # Panics
///
/// Debug-asserts that the payload length fits in a `u32`; practical frames
/// are far smaller.
pub fn encode_chunk(chunk_type: ChunkType, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u32::MAX as usize);
    let mut buf = Vec::with_capacity(CHUNK_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.push(chunk_type.code());
    buf.extend_from_slice(payload);
    buf
}
