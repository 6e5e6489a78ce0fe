//! Error types for threadwire.

use thiserror::Error;

/// Main error type for all threadwire operations.
#[derive(Debug, Error)]
pub enum ThreadwireError {
    /// I/O error (thread spawn, filesystem helpers).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error for typed values.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error for typed values.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (malformed frame, bad ids, wrong arity).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A value could not be decoded from the request buffer.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A buffer could not grow to hold the data written to it.
    #[error("Buffer overflow: need {needed} bytes, capacity {capacity}")]
    Overflow { needed: usize, capacity: usize },

    /// Handler registration rejected during bootstrap.
    #[error("Registration error: {0}")]
    Registration(String),

    /// Channel bind/connect or publish failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request channel of an executor is closed.
    #[error("Executor channel closed")]
    ChannelClosed,

    /// The executor thread panicked.
    #[error("Executor thread panicked")]
    ExecutorPanicked,

    /// A handler panicked while serving a request.
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
}

impl ThreadwireError {
    /// Errors that indicate a bug in the coordinating scheduler.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_)
                | Self::Decode(_)
                | Self::Overflow { .. }
                | Self::MsgPackEncode(_)
                | Self::MsgPackDecode(_)
        )
    }

    /// Errors raised by the channel layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ChannelClosed)
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub(crate) fn decode(msg: impl std::fmt::Display) -> Self {
        Self::Decode(msg.to_string())
    }
}

/// Result type alias using ThreadwireError.
pub type Result<T> = std::result::Result<T, ThreadwireError>;
