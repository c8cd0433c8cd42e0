//! Inbound chunk dispatch.
//!
//! Routes each decoded chunk to exactly one sink exactly once, in arrival
//! order: Stdout and Stderr payloads to their callbacks, Exit to the exit
//! callback after parsing the textual code. Anything else coming from the
//! server is a protocol violation - Argument, Environment,
//! WorkingDirectory, Command, Stdin, and Eof are client-to-server only.
//!
//! Chunks that arrive before the session is Ready are held in arrival order
//! and delivered as the first thing [`InboundDispatcher::mark_ready`] does.
//! The server is not expected to emit before it has received the Command
//! frame, but the dispatcher stays correct even if it does.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::{NailpinError, Result};
use crate::protocol::{Chunk, ChunkType};

/// Typed session callbacks, set once at session creation.
///
/// All callbacks default to no-ops.
///
/// # Example
///
/// ```
/// use nailpin::SessionEvents;
///
/// let events = SessionEvents::new()
///     .on_stdout(|data| print!("{}", String::from_utf8_lossy(&data)))
///     .on_exit(|code| println!("exited with {code}"));
/// # let _ = events;
/// ```
pub struct SessionEvents {
    pub(crate) stdout: Box<dyn FnMut(Bytes) + Send>,
    pub(crate) stderr: Box<dyn FnMut(Bytes) + Send>,
    pub(crate) exit: Box<dyn FnMut(i32) + Send>,
    pub(crate) error: Box<dyn FnMut(NailpinError) + Send>,
}

impl SessionEvents {
    /// Create a callback set where every callback is a no-op.
    pub fn new() -> Self {
        Self {
            stdout: Box::new(|_| {}),
            stderr: Box::new(|_| {}),
            exit: Box::new(|_| {}),
            error: Box::new(|_| {}),
        }
    }

    /// Set the callback for remote standard output payloads.
    pub fn on_stdout(mut self, f: impl FnMut(Bytes) + Send + 'static) -> Self {
        self.stdout = Box::new(f);
        self
    }

    /// Set the callback for remote standard error payloads.
    pub fn on_stderr(mut self, f: impl FnMut(Bytes) + Send + 'static) -> Self {
        self.stderr = Box::new(f);
        self
    }

    /// Set the callback for the remote exit code. Invoked at most once.
    pub fn on_exit(mut self, f: impl FnMut(i32) + Send + 'static) -> Self {
        self.exit = Box::new(f);
        self
    }

    /// Set the callback for session failures. Invoked at most once.
    pub fn on_error(mut self, f: impl FnMut(NailpinError) + Send + 'static) -> Self {
        self.error = Box::new(f);
        self
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEvents").finish_non_exhaustive()
    }
}

/// Outcome of dispatching a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep streaming.
    Continue,
    /// The Exit chunk was delivered; the session is done with this code.
    Exited(i32),
}

/// Routes decoded chunks to the session callbacks.
pub struct InboundDispatcher {
    events: SessionEvents,
    /// Chunks received before `mark_ready`, in arrival order.
    held: VecDeque<Chunk>,
    ready: bool,
    exited: bool,
}

impl InboundDispatcher {
    /// Create a dispatcher over the given callback set.
    pub fn new(events: SessionEvents) -> Self {
        Self {
            events,
            held: VecDeque::new(),
            ready: false,
            exited: false,
        }
    }

    /// Dispatch one chunk.
    ///
    /// Before `mark_ready` the chunk is held for later delivery and the
    /// result is `Continue`. Afterwards it is delivered immediately.
    pub fn dispatch(&mut self, chunk: Chunk) -> Result<Dispatch> {
        if !self.ready {
            self.held.push_back(chunk);
            return Ok(Dispatch::Continue);
        }
        self.deliver(chunk)
    }

    /// Mark the session Ready and deliver any held chunks in arrival order.
    pub fn mark_ready(&mut self) -> Result<Dispatch> {
        self.ready = true;
        while let Some(chunk) = self.held.pop_front() {
            if let Dispatch::Exited(code) = self.deliver(chunk)? {
                return Ok(Dispatch::Exited(code));
            }
        }
        Ok(Dispatch::Continue)
    }

    /// Surface a terminal session error through the error callback.
    pub fn emit_error(&mut self, err: NailpinError) {
        (self.events.error)(err);
    }

    fn deliver(&mut self, chunk: Chunk) -> Result<Dispatch> {
        match chunk.chunk_type {
            ChunkType::Stdout => {
                (self.events.stdout)(chunk.payload);
                Ok(Dispatch::Continue)
            }
            ChunkType::Stderr => {
                (self.events.stderr)(chunk.payload);
                Ok(Dispatch::Continue)
            }
            ChunkType::Exit => {
                if self.exited {
                    return Err(NailpinError::Protocol(
                        "duplicate exit chunk".to_string(),
                    ));
                }
                let code = parse_exit_code(&chunk.payload)?;
                self.exited = true;
                (self.events.exit)(code);
                Ok(Dispatch::Exited(code))
            }
            other => {
                tracing::warn!("server sent client-only chunk type {:?}", other);
                Err(NailpinError::Protocol(format!(
                    "server sent client-only chunk type {other:?}"
                )))
            }
        }
    }
}

/// Parse the textual exit code carried by an Exit chunk.
fn parse_exit_code(payload: &[u8]) -> Result<i32> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .ok_or_else(|| {
            NailpinError::Protocol(format!(
                "invalid exit code payload: {:?}",
                String::from_utf8_lossy(payload)
            ))
        })
}
