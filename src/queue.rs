//! Outbound queue for frames produced before the transport is writable.
//!
//! While the session is still connecting, every encoded frame lands here in
//! FIFO order. On the Connecting → Handshaking transition the session calls
//! [`OutboundQueue::flush`] exactly once, which writes every queued frame to
//! the transport in enqueue order. Once connected, the session forwards
//! frames directly and the queue stays empty.
//!
//! The queued byte count is shared through an `Arc<AtomicUsize>` so the
//! session handle can report it without touching the queue itself. No size
//! limit is enforced at this layer; not outrunning the remote consumer is a
//! caller responsibility.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;

use crate::error::Result;

/// A frame waiting for the transport to become writable.
#[derive(Debug)]
pub struct PendingWrite {
    /// Complete encoded frame (header + payload).
    pub frame: Bytes,
    /// Resolved once the frame has been handed to the transport. Dropped
    /// (canceling the receiver) if the write is discarded.
    pub completion: Option<oneshot::Sender<()>>,
}

/// FIFO of frames enqueued while the connection is being established.
pub struct OutboundQueue {
    pending: VecDeque<PendingWrite>,
    /// Total queued payload+header bytes, shared for observability.
    queued_bytes: Arc<AtomicUsize>,
}

impl OutboundQueue {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            queued_bytes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append a frame to the queue.
    pub fn enqueue(&mut self, frame: Bytes, completion: Option<oneshot::Sender<()>>) {
        self.queued_bytes.fetch_add(frame.len(), Ordering::Release);
        self.pending.push_back(PendingWrite { frame, completion });
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total queued bytes.
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes.load(Ordering::Acquire)
    }

    /// Shared handle to the queued byte counter.
    pub fn queued_bytes_handle(&self) -> Arc<AtomicUsize> {
        self.queued_bytes.clone()
    }

    /// Write every queued frame to the transport in enqueue order.
    ///
    /// Called exactly once, on the Connecting → Handshaking transition.
    /// Each frame is written whole before the next starts; completions are
    /// resolved as their frame is handed off. A write error aborts the
    /// flush and leaves the remaining completions to be discarded by the
    /// caller's failure path.
    pub async fn flush<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> Result<()> {
        while let Some(write) = self.pending.pop_front() {
            let len = write.frame.len();
            writer.write_all(&write.frame).await?;
            self.queued_bytes.fetch_sub(len, Ordering::Release);
            if let Some(tx) = write.completion {
                let _ = tx.send(());
            }
        }
        writer.flush().await?;
        Ok(())
    }

    /// Drop all queued frames without writing them.
    ///
    /// Used on failure or cancellation: nothing reaches the transport, so
    /// no torn frames. Completion senders are dropped, which cancels their
    /// receivers. Returns the number of discarded frames.
    pub fn discard(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.queued_bytes.store(0, Ordering::Release);
        discarded
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}
