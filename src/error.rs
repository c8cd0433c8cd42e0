//! Error types for nailpin.

use thiserror::Error;

/// Main error type for all nailpin operations.
#[derive(Debug, Error)]
pub enum NailpinError {
    /// I/O error during connect, read, or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk type byte outside the nine known codes was read.
    #[error("unrecognized chunk type byte: 0x{0:02X}")]
    UnrecognizedChunkType(u8),

    /// Protocol violation (duplicate exit, server sent a client-only chunk, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport reached end-of-stream while a frame was partially buffered.
    #[error("connection closed mid-frame ({0} undecoded bytes buffered)")]
    PrematureClose(usize),

    /// Write attempted after the session reached a terminal state.
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid configuration, rejected before any transport activity.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using NailpinError.
pub type Result<T> = std::result::Result<T, NailpinError>;
