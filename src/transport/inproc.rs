//! In-process channels backed by tokio `mpsc`.
//!
//! ```text
//! scheduler ─► RequestSender ─► RequestReceiver ─► executor-0 ─┐
//! scheduler ─► RequestSender ─► RequestReceiver ─► executor-1 ─┼─► ReplyPublisher ─► ReplyStream ─► scheduler
//! scheduler ─► RequestSender ─► RequestReceiver ─► executor-N ─┘
//! ```
//!
//! Request channels are bounded; a full channel makes the scheduler wait,
//! which is the only flow control there is. The reply channel is unbounded
//! so an executor never blocks on publishing.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::{EventPublisher, RequestInbox};
use crate::error::{Result, ThreadwireError};
use crate::protocol::Reply;

/// Create the private request channel of one executor.
///
/// `capacity` is clamped to at least 1.
pub fn request_channel(capacity: usize) -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RequestSender { tx }, RequestReceiver { rx })
}

/// Create the shared reply channel.
pub fn reply_channel() -> (ReplyPublisher, ReplyStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReplyPublisher { tx }, ReplyStream { rx })
}

/// Scheduler end of a request channel.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: mpsc::Sender<Bytes>,
}

impl RequestSender {
    /// Send a frame, waiting while the channel is full.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| ThreadwireError::ChannelClosed)
    }

    /// Send a frame from synchronous code.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .blocking_send(frame)
            .map_err(|_| ThreadwireError::ChannelClosed)
    }

    /// Check if the receiving executor is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Executor end of a request channel.
#[derive(Debug)]
pub struct RequestReceiver {
    rx: mpsc::Receiver<Bytes>,
}

impl RequestInbox for RequestReceiver {
    fn recv(&mut self) -> Option<Bytes> {
        self.rx.blocking_recv()
    }
}

/// Executor end of the reply channel; cloned once per executor.
#[derive(Debug, Clone)]
pub struct ReplyPublisher {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl EventPublisher for ReplyPublisher {
    fn publish(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| ThreadwireError::Transport("reply stream is closed".to_string()))
    }
}

/// Scheduler end of the reply channel.
///
/// Yields whole reply frames in publish order per executor; frames from
/// different executors interleave arbitrarily.
#[derive(Debug)]
pub struct ReplyStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl ReplyStream {
    /// Wait for the next reply frame.
    ///
    /// Returns `None` once every publisher has been dropped and the
    /// channel is drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Wait for the next reply frame from synchronous code.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<Bytes> {
        self.rx.blocking_recv()
    }

    /// Take a reply frame if one is ready.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next reply and decode it.
    pub async fn recv_reply(&mut self) -> Option<Result<Reply>> {
        self.recv().await.map(Reply::decode)
    }
}
