//! Handshake frame sequence.
//!
//! Immediately after the transport connects, and before any application
//! payload, the client must send a fixed setup sequence: one Argument chunk
//! per configured argument, one Environment chunk per entry as `KEY=VALUE`,
//! exactly one WorkingDirectory chunk, and finally exactly one Command
//! chunk naming the remote entry point. The session transitions to Ready
//! once the Command frame has been handed to the transport.

use bytes::Bytes;

use crate::config::NailConfig;
use crate::protocol::{encode_chunk, ChunkType};

/// Build the ordered handshake frames for a configuration.
///
/// Argument order follows the configuration. Environment entry order is not
/// semantically significant to the protocol but follows the configuration
/// so a single run produces a stable byte sequence.
pub fn handshake_frames(config: &NailConfig) -> Vec<Bytes> {
    let mut frames =
        Vec::with_capacity(config.args.len() + config.env.len() + 2);

    for arg in &config.args {
        frames.push(Bytes::from(encode_chunk(
            ChunkType::Argument,
            arg.as_bytes(),
        )));
    }

    for (key, value) in &config.env {
        let entry = format!("{key}={value}");
        frames.push(Bytes::from(encode_chunk(
            ChunkType::Environment,
            entry.as_bytes(),
        )));
    }

    frames.push(Bytes::from(encode_chunk(
        ChunkType::WorkingDirectory,
        config.cwd.as_bytes(),
    )));

    frames.push(Bytes::from(encode_chunk(
        ChunkType::Command,
        config.command.as_bytes(),
    )));

    frames
}
