//! Handler module - blocking work invoked by executors.
//!
//! Provides:
//! - [`Handler`] - the fixed invocation signature every handler implements
//! - [`HandlerGroup`] - an ordered list of handlers registered together
//! - [`RegistryBuilder`] / [`HandlerRegistry`] - bootstrap-time registration
//!   and the immutable table executors dispatch through
//! - [`echo`] and [`fs`] - builtin groups
//!
//! # Example
//!
//! ```
//! use threadwire::handler::{handler_fn, HandlerGroup, RegistryBuilder};
//!
//! let mut builder = RegistryBuilder::new();
//! let group = builder
//!     .register_group(HandlerGroup::new().handler(handler_fn(|request, reply, argc| {
//!         // Sum all integer arguments
//!         let mut sum = 0i64;
//!         for _ in 0..argc {
//!             sum += request.read_i64()?;
//!         }
//!         reply.write_sint(sum)
//!     })))
//!     .unwrap();
//! assert_eq!(group, 1);
//!
//! let registry = builder.build();
//! assert!(registry.lookup(group, 0).is_ok());
//! assert!(registry.lookup(group, 1).is_err());
//! ```

pub mod echo;
pub mod fs;
mod registry;

pub use registry::{GroupId, HandlerGroup, HandlerRegistry, RegistryBuilder, MAX_HANDLER_GROUPS};

use crate::codec::{BufferReader, BufferWriter};
use crate::error::Result;

/// Result type for handler invocations.
pub type HandlerResult = Result<()>;

/// A unit of blocking work addressed by `(group, index)`.
///
/// `request` is positioned at the first of `argc` arguments; the handler
/// writes exactly one value (its result) to `reply`, or nothing for `nil`.
///
/// Domain failures belong in the written result. Returning `Err` means the
/// arguments broke the handler's contract and is fatal to the process.
pub trait Handler: Send + Sync + 'static {
    /// Run the handler on the calling executor thread.
    fn invoke(
        &self,
        request: &mut BufferReader<'_>,
        reply: &mut BufferWriter<'_>,
        argc: u32,
    ) -> HandlerResult;
}

/// Wrapper turning a closure into a [`Handler`].
pub struct FnHandler<F> {
    handler: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut BufferReader<'_>, &mut BufferWriter<'_>, u32) -> HandlerResult
        + Send
        + Sync
        + 'static,
{
    fn invoke(
        &self,
        request: &mut BufferReader<'_>,
        reply: &mut BufferWriter<'_>,
        argc: u32,
    ) -> HandlerResult {
        (self.handler)(request, reply, argc)
    }
}

/// Create a handler from a closure.
pub fn handler_fn<F>(handler: F) -> FnHandler<F>
where
    F: Fn(&mut BufferReader<'_>, &mut BufferWriter<'_>, u32) -> HandlerResult
        + Send
        + Sync
        + 'static,
{
    FnHandler { handler }
}
