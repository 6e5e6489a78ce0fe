//! Protocol module - request/reply frames exchanged with executors.
//!
//! - [`HandlerAddress`] and the frame layout constants
//! - [`RequestHeader`] and [`begin_reply`] for the executor side
//! - [`RequestBuilder`], [`Reply`] and [`CorrelationIds`] for the scheduler side

mod correlation;
mod frame;
mod wire_format;

pub use correlation::{CorrelationIds, FIRST_CORRELATION_ID, LAST_CORRELATION_ID};
pub use frame::{begin_reply, shutdown_frame, Reply, RequestBuilder, RequestHeader};
pub use wire_format::{
    decode_correlation_id, HandlerAddress, REPLY_LEN, REQUEST_PREFIX_LEN, SHUTDOWN_FRAME,
};
