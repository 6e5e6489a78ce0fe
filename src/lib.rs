//! # threadwire
//!
//! Offload blocking work from a single-threaded cooperative scheduler to
//! background executor threads.
//!
//! The scheduler encodes a call as a MessagePack request frame and sends it
//! to one executor's private channel. The executor decodes it, runs the
//! addressed handler (which may block for as long as it likes), and
//! publishes a reply tagged with the caller's correlation id on a channel
//! shared by all executors. The scheduler polls that channel and resumes
//! whichever task owns the id.
//!
//! ## Architecture
//!
//! - **Registry** (bootstrap only): handler groups addressed by 1-based id
//! - **Request channels**: one bounded channel per executor, processed in order
//! - **Reply channel**: one unbounded channel shared by every executor
//! - **Wire format**: `[address, correlation_id, args...]` requests,
//!   `[correlation_id, result]` replies, `[]` to stop an executor
//!
//! Malformed frames are bugs in the scheduler, not runtime conditions: they
//! terminate the process.
//!
//! ## Example
//!
//! ```no_run
//! use threadwire::handler::{echo::echo_group, RegistryBuilder};
//! use threadwire::protocol::{CorrelationIds, RequestBuilder};
//! use threadwire::Engine;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> threadwire::Result<()> {
//!     let mut registry = RegistryBuilder::new();
//!     let echo = registry.register_group(echo_group())?;
//!
//!     let mut engine = Engine::new(registry.build());
//!     let mut replies = engine.subscribe_replies()?;
//!     let executor = engine.spawn_executor(0)?;
//!
//!     let ids = CorrelationIds::new();
//!     let frame = RequestBuilder::new(echo, ids.next_id()).arg(250).arg("later").build()?;
//!     executor.send(frame).await?;
//!
//!     if let Some(reply) = replies.recv_reply().await {
//!         println!("{:?}", reply?.value()?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod engine;
pub mod error;
pub mod executor;
pub mod handler;
pub mod protocol;
pub mod transport;

pub use buffer::ByteBuffer;
pub use engine::{Engine, EngineBuilder};
pub use error::{Result, ThreadwireError};
pub use executor::{ExecutorConfig, ExecutorExit, ExecutorHandle, ExitReason, FatalAction};
pub use handler::{handler_fn, Handler, HandlerGroup, HandlerRegistry, RegistryBuilder};
