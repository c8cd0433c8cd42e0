//! Invocation session: connection lifecycle and runtime loop.
//!
//! A [`Session`] owns one remote invocation over one connection. The
//! lifecycle is a fixed state machine:
//!
//! 1. `Connecting` - transport connect in progress; writes are queued
//! 2. `Handshaking` - queued writes flushed, then the setup sequence is sent
//! 3. `Ready` - stdin writes forwarded directly, inbound dispatch active
//! 4. `Closed` / `Failed` - terminal; further writes are rejected
//!
//! All decode, dispatch, and write work happens on a single actor task that
//! owns the transport halves, the reassembly buffer, and the outbound
//! queue, so no locking is needed. Callers talk to the actor over a command
//! channel; inbound traffic surfaces through the [`SessionEvents`]
//! callbacks set at creation.
//!
//! # Example
//!
//! ```ignore
//! use nailpin::{NailConfig, Session, SessionEvents};
//!
//! #[tokio::main]
//! async fn main() -> nailpin::Result<()> {
//!     let config = NailConfig::new("io.foldr.ngtesthost.Stdout");
//!     let events = SessionEvents::new()
//!         .on_stdout(|data| print!("{}", String::from_utf8_lossy(&data)))
//!         .on_exit(|code| println!("exit: {code}"));
//!
//!     let session = Session::open(config, events)?;
//!     session.close_stdin().await?;
//!     session.closed().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::NailConfig;
use crate::dispatch::{Dispatch, InboundDispatcher, SessionEvents};
use crate::error::{NailpinError, Result};
use crate::handshake::handshake_frames;
use crate::protocol::{encode_chunk, ChunkBuffer, ChunkType};
use crate::queue::OutboundQueue;
use crate::transport::Transport;

/// Read buffer size for the transport read loop.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Command channel capacity.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connect in progress; writes are queued.
    Connecting,
    /// Connected; flushing the queue and sending the setup sequence.
    Handshaking,
    /// Handshake complete; application traffic flows.
    Ready,
    /// Terminal: remote exit, local close, or clean end-of-stream.
    Closed,
    /// Terminal: transport error or protocol violation.
    Failed,
}

impl SessionState {
    /// Check if the session has reached a terminal state.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// Commands from the session handle to the actor task.
enum Command {
    Write {
        frame: Bytes,
        completion: Option<oneshot::Sender<()>>,
    },
    Close,
}

/// Handle to a running invocation session.
///
/// Cheap to use from the caller's task; all I/O happens on the actor.
/// Dropping the handle closes the session.
pub struct Session {
    tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionState>,
    queued_bytes: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl Session {
    /// Open a session to `config.host:config.port` over TCP.
    ///
    /// Configuration is validated synchronously, before any transport
    /// activity; the connect itself proceeds in the background and writes
    /// issued meanwhile are queued. Must be called within a Tokio runtime.
    pub fn open(config: NailConfig, events: SessionEvents) -> Result<Self> {
        let host = config.host.clone();
        let port = config.port;
        Self::open_with(config, events, async move {
            crate::transport::connect(&host, port).await
        })
    }

    /// Open a session over an arbitrary transport.
    ///
    /// `connect` resolves to the established byte stream; until it does the
    /// session stays in `Connecting` and queues writes. This is the seam
    /// tests use to drive the engine over an in-memory duplex stream.
    pub fn open_with<S, F>(config: NailConfig, events: SessionEvents, connect: F) -> Result<Self>
    where
        S: Transport + 'static,
        F: Future<Output = std::io::Result<S>> + Send + 'static,
    {
        config.validate()?;

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let queue = OutboundQueue::new();
        let queued_bytes = queue.queued_bytes_handle();

        let task = tokio::spawn(run(connect, config, events, rx, state_tx, queue));

        Ok(Self {
            tx,
            state_rx,
            queued_bytes,
            task,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Bytes currently buffered in the outbound queue.
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes.load(Ordering::Acquire)
    }

    /// Send a Stdin chunk carrying `data`.
    ///
    /// Queued while `Connecting`, forwarded directly afterwards. Fails with
    /// [`NailpinError::ConnectionClosed`] once the session is terminal.
    pub async fn write_stdin(&self, data: &[u8]) -> Result<()> {
        self.send_frame(encode_chunk(ChunkType::Stdin, data), None)
            .await
    }

    /// Send a Stdin chunk and wait until it has been handed to the transport.
    pub async fn write_stdin_acked(&self, data: &[u8]) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_frame(encode_chunk(ChunkType::Stdin, data), Some(tx))
            .await?;
        rx.await.map_err(|_| NailpinError::ConnectionClosed)
    }

    /// Close the stdin stream by sending a single Eof chunk.
    ///
    /// This is an explicit caller action; the session never sends Eof
    /// implicitly.
    pub async fn close_stdin(&self) -> Result<()> {
        self.send_frame(encode_chunk(ChunkType::Eof, b""), None).await
    }

    /// Close the session.
    ///
    /// Frames still queued are discarded without partial transport writes.
    /// Idempotent: closing an already-terminal session is a no-op.
    pub async fn close(&self) {
        let _ = self.tx.send(Command::Close).await;
    }

    /// Wait until the session reaches a terminal state and return it.
    pub async fn closed(mut self) -> SessionState {
        while !self.state_rx.borrow().is_terminal() {
            if self.state_rx.changed().await.is_err() {
                break;
            }
        }
        let state = *self.state_rx.borrow();
        let _ = self.task.await;
        state
    }

    async fn send_frame(
        &self,
        frame: Vec<u8>,
        completion: Option<oneshot::Sender<()>>,
    ) -> Result<()> {
        if self.state().is_terminal() {
            return Err(NailpinError::ConnectionClosed);
        }
        self.tx
            .send(Command::Write {
                frame: Bytes::from(frame),
                completion,
            })
            .await
            .map_err(|_| NailpinError::ConnectionClosed)
    }
}

/// The session actor: owns the transport and drives the state machine.
async fn run<S, F>(
    connect: F,
    config: NailConfig,
    events: SessionEvents,
    mut rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<SessionState>,
    mut queue: OutboundQueue,
) where
    S: Transport + 'static,
    F: Future<Output = std::io::Result<S>> + Send + 'static,
{
    let mut dispatcher = InboundDispatcher::new(events);

    tokio::pin!(connect);

    // Connecting: queue writes until the transport is up. Close here
    // discards the queue whole, so nothing half-written reaches the wire.
    let stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(stream) => break stream,
                Err(e) => {
                    fail(&mut dispatcher, &state_tx, &mut queue, NailpinError::Io(e));
                    return;
                }
            },
            cmd = rx.recv() => match cmd {
                Some(Command::Write { frame, completion }) => {
                    queue.enqueue(frame, completion);
                }
                Some(Command::Close) | None => {
                    let discarded = queue.discard();
                    if discarded > 0 {
                        tracing::debug!(discarded, "closed while connecting, dropping queued frames");
                    }
                    let _ = state_tx.send(SessionState::Closed);
                    return;
                }
            },
        }
    };

    tracing::debug!(command = %config.command, "transport connected, starting handshake");
    let _ = state_tx.send(SessionState::Handshaking);

    let (mut reader, mut writer) = tokio::io::split(stream);

    // Flush writes queued while connecting, then emit the setup sequence:
    // arguments, environment, working directory, command.
    if let Err(e) = queue.flush(&mut writer).await {
        fail(&mut dispatcher, &state_tx, &mut queue, e);
        return;
    }
    for frame in handshake_frames(&config) {
        if let Err(e) = writer.write_all(&frame).await {
            fail(&mut dispatcher, &state_tx, &mut queue, NailpinError::Io(e));
            return;
        }
    }
    if let Err(e) = writer.flush().await {
        fail(&mut dispatcher, &state_tx, &mut queue, NailpinError::Io(e));
        return;
    }

    let _ = state_tx.send(SessionState::Ready);
    match dispatcher.mark_ready() {
        Ok(Dispatch::Continue) => {}
        Ok(Dispatch::Exited(code)) => {
            tracing::debug!(code, "remote invocation exited");
            let _ = state_tx.send(SessionState::Closed);
            return;
        }
        Err(e) => {
            fail(&mut dispatcher, &state_tx, &mut queue, e);
            return;
        }
    }

    // Streaming: decode inbound reads and forward outbound commands. A
    // command is processed to completion before the next select, so frames
    // are always written whole.
    let mut chunk_buffer = ChunkBuffer::new();
    let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = reader.read(&mut read_buf) => match result {
                Ok(0) => {
                    if chunk_buffer.is_empty() {
                        let _ = state_tx.send(SessionState::Closed);
                    } else {
                        fail(
                            &mut dispatcher,
                            &state_tx,
                            &mut queue,
                            NailpinError::PrematureClose(chunk_buffer.len()),
                        );
                    }
                    return;
                }
                Ok(n) => {
                    let chunks = match chunk_buffer.push(&read_buf[..n]) {
                        Ok(chunks) => chunks,
                        Err(e) => {
                            fail(&mut dispatcher, &state_tx, &mut queue, e);
                            return;
                        }
                    };
                    for chunk in chunks {
                        match dispatcher.dispatch(chunk) {
                            Ok(Dispatch::Continue) => {}
                            Ok(Dispatch::Exited(code)) => {
                                tracing::debug!(code, "remote invocation exited");
                                let _ = state_tx.send(SessionState::Closed);
                                return;
                            }
                            Err(e) => {
                                fail(&mut dispatcher, &state_tx, &mut queue, e);
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    fail(&mut dispatcher, &state_tx, &mut queue, NailpinError::Io(e));
                    return;
                }
            },
            cmd = rx.recv() => match cmd {
                Some(Command::Write { frame, completion }) => {
                    let written = async {
                        writer.write_all(&frame).await?;
                        writer.flush().await
                    }
                    .await;
                    match written {
                        Ok(()) => {
                            if let Some(tx) = completion {
                                let _ = tx.send(());
                            }
                        }
                        Err(e) => {
                            fail(&mut dispatcher, &state_tx, &mut queue, NailpinError::Io(e));
                            return;
                        }
                    }
                }
                Some(Command::Close) | None => {
                    let _ = state_tx.send(SessionState::Closed);
                    return;
                }
            },
        }
    }
}

/// Terminal failure: discard queued writes, publish `Failed`, surface the
/// cause exactly once through the error callback.
fn fail(
    dispatcher: &mut InboundDispatcher,
    state_tx: &watch::Sender<SessionState>,
    queue: &mut OutboundQueue,
    err: NailpinError,
) {
    tracing::error!(error = %err, "session failed");
    queue.discard();
    let _ = state_tx.send(SessionState::Failed);
    dispatcher.emit_error(err);
}
