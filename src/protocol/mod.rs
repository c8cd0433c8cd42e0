//! Protocol module - chunk types, frame encoding, and reassembly.
//!
//! This module implements the binary wire format:
//! - Nine typed chunks, each with a single-byte ASCII code
//! - 5-byte frame header (4-byte big-endian length + type byte)
//! - Chunk buffer for reassembling frames from partial reads

mod chunk;
mod chunk_buffer;

pub use chunk::{encode_chunk, Chunk, ChunkType, CHUNK_HEADER_SIZE};
pub use chunk_buffer::ChunkBuffer;
