//! Transport module - channels between the scheduler and executors.
//!
//! Executors only see two traits: a blocking [`RequestInbox`] they drain
//! and an [`EventPublisher`] they publish replies to. The in-process
//! implementation in [`inproc`] backs both with tokio `mpsc` channels, so
//! the scheduler side can `.await` while executor threads block.

pub mod inproc;

use bytes::Bytes;

use crate::error::Result;

pub use inproc::{
    reply_channel, request_channel, ReplyPublisher, ReplyStream, RequestReceiver, RequestSender,
};

/// Private request endpoint of one executor.
pub trait RequestInbox: Send {
    /// Block until the next whole frame arrives.
    ///
    /// Returns `None` once every sender has been dropped.
    fn recv(&mut self) -> Option<Bytes>;
}

/// Shared endpoint replies are published to.
pub trait EventPublisher: Send {
    /// Publish one whole reply frame.
    ///
    /// # Errors
    ///
    /// [`ThreadwireError::Transport`](crate::ThreadwireError::Transport)
    /// if no subscriber can ever receive it.
    fn publish(&self, frame: Bytes) -> Result<()>;
}
