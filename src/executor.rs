//! Executor threads: receive a request, run its handler, publish the reply.
//!
//! Each executor owns one request and one reply [`ByteBuffer`], allocated
//! once at thread start and reset between requests. The loop is:
//!
//! ```text
//! recv ─► copy into request buffer ─► decode header ─► resolve handler
//!   ▲                                      │ []                 │
//!   │                                      ▼                    ▼
//!   │                                   shutdown        invoke into reply buffer
//!   └──────────────── publish [correlation_id, result] ◄────────┘
//! ```
//!
//! Any protocol or transport failure is fatal, and so is a panicking
//! handler. With the default
//! [`FatalAction::ExitProcess`] the whole process exits with
//! [`FATAL_EXIT_CODE`]; a crashed integration is meant to be restarted by
//! its supervisor, not patched up at runtime.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use crate::buffer::ByteBuffer;
use crate::codec::{BufferReader, BufferWriter};
use crate::error::{Result, ThreadwireError};
use crate::handler::HandlerRegistry;
use crate::protocol::{begin_reply, shutdown_frame, RequestHeader};
use crate::transport::{EventPublisher, RequestInbox, RequestSender};

/// Default initial capacity of the request buffer.
pub const DEFAULT_REQUEST_BUFFER_CAPACITY: usize = 1024;

/// Default initial capacity of the reply buffer.
pub const DEFAULT_REPLY_BUFFER_CAPACITY: usize = 1024;

/// Default limit both buffers may grow to (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default number of requests that may queue for one executor.
pub const DEFAULT_REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Process exit status used for fatal errors (`EX_SOFTWARE`).
pub const FATAL_EXIT_CODE: i32 = 70;

/// What an executor does when it hits a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalAction {
    /// Log, print a diagnostic to stderr and exit the process.
    #[default]
    ExitProcess,
    /// Stop the executor and return the error from its thread.
    Return,
}

/// Configuration for executors.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Initial request buffer capacity.
    pub request_buffer_capacity: usize,
    /// Initial reply buffer capacity.
    pub reply_buffer_capacity: usize,
    /// Largest request or reply frame an executor accepts.
    pub max_frame_size: usize,
    /// Bound of each executor's request channel.
    pub request_channel_capacity: usize,
    /// Reaction to fatal errors.
    pub fatal_action: FatalAction,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            request_buffer_capacity: DEFAULT_REQUEST_BUFFER_CAPACITY,
            reply_buffer_capacity: DEFAULT_REPLY_BUFFER_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            request_channel_capacity: DEFAULT_REQUEST_CHANNEL_CAPACITY,
            fatal_action: FatalAction::ExitProcess,
        }
    }
}

/// Why an executor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Received the `[]` sentinel.
    Shutdown,
    /// Every request sender was dropped.
    InboxClosed,
}

/// Summary returned by a cleanly stopped executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorExit {
    pub reason: ExitReason,
    /// Requests that produced a reply.
    pub requests: u64,
}

/// Apply `action` to a fatal error.
///
/// Returns the error only for [`FatalAction::Return`].
pub(crate) fn fatal(action: FatalAction, executor: usize, err: ThreadwireError) -> ThreadwireError {
    error!(executor, error = %err, "fatal executor error");
    if action == FatalAction::ExitProcess {
        eprintln!("threadwire: fatal error in executor-{}: {}", executor, err);
        std::process::exit(FATAL_EXIT_CODE);
    }
    err
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The reply result must be exactly one encoded value.
fn check_single_result(result: &[u8]) -> Result<()> {
    let mut reader = BufferReader::from_bytes(result);
    reader.skip_value()?;
    if reader.remaining() != 0 {
        return Err(ThreadwireError::Protocol(format!(
            "handler wrote more than one result value ({} trailing bytes)",
            reader.remaining()
        )));
    }
    Ok(())
}

/// Outcome of one request frame.
enum Step {
    Reply(Bytes),
    Shutdown,
}

/// Per-thread executor state.
struct Executor {
    index: usize,
    registry: Arc<HandlerRegistry>,
    request: ByteBuffer,
    reply: ByteBuffer,
}

impl Executor {
    fn new(index: usize, registry: Arc<HandlerRegistry>, config: &ExecutorConfig) -> Self {
        Self {
            index,
            registry,
            request: ByteBuffer::with_limit(config.request_buffer_capacity, config.max_frame_size),
            reply: ByteBuffer::with_limit(config.reply_buffer_capacity, config.max_frame_size),
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Result<Step> {
        self.request.reset();
        if self.request.append(frame) != frame.len() {
            return Err(ThreadwireError::Overflow {
                needed: frame.len(),
                capacity: self.request.capacity(),
            });
        }

        let mut reader = BufferReader::new(&self.request);
        let Some(header) = RequestHeader::decode(&mut reader)? else {
            return Ok(Step::Shutdown);
        };
        let handler = self.registry.resolve(header.address)?;
        debug!(
            executor = self.index,
            group = header.address.group,
            handler = header.address.handler,
            correlation_id = header.correlation_id,
            argc = header.argc,
            "dispatching request"
        );

        self.reply.reset();
        let mut writer = BufferWriter::new(&mut self.reply);
        begin_reply(&mut writer, header.correlation_id)?;
        let prefix = writer.written();
        panic::catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(&mut reader, &mut writer, header.argc)
        }))
        .map_err(|payload| ThreadwireError::HandlerPanicked(panic_message(&*payload)))??;
        if writer.written() == prefix {
            writer.write_nil()?;
        }
        check_single_result(&self.reply.as_slice()[prefix..])?;

        trace!(
            executor = self.index,
            correlation_id = header.correlation_id,
            len = self.reply.len(),
            "reply encoded"
        );
        Ok(Step::Reply(Bytes::copy_from_slice(self.reply.as_slice())))
    }
}

/// Run the executor loop on the current thread until shutdown.
///
/// # Errors
///
/// Returns the first fatal error when `config.fatal_action` is
/// [`FatalAction::Return`]; with [`FatalAction::ExitProcess`] a fatal
/// error never returns.
pub fn run_executor<I, P>(
    index: usize,
    registry: Arc<HandlerRegistry>,
    config: &ExecutorConfig,
    inbox: &mut I,
    publisher: &P,
) -> Result<ExecutorExit>
where
    I: RequestInbox + ?Sized,
    P: EventPublisher + ?Sized,
{
    let mut executor = Executor::new(index, registry, config);
    let mut requests = 0u64;
    debug!(executor = index, "executor started");

    let reason = loop {
        let Some(frame) = inbox.recv() else {
            warn!(executor = index, "request inbox closed without shutdown");
            break ExitReason::InboxClosed;
        };
        let step = executor
            .handle_frame(&frame)
            .map_err(|e| fatal(config.fatal_action, index, e))?;
        match step {
            Step::Shutdown => break ExitReason::Shutdown,
            Step::Reply(reply) => {
                publisher
                    .publish(reply)
                    .map_err(|e| fatal(config.fatal_action, index, e))?;
                requests += 1;
            }
        }
    };

    debug!(executor = index, requests, ?reason, "executor stopped");
    Ok(ExecutorExit { reason, requests })
}

/// Handle to a spawned executor thread.
#[derive(Debug)]
pub struct ExecutorHandle {
    index: usize,
    sender: RequestSender,
    thread: JoinHandle<Result<ExecutorExit>>,
}

impl ExecutorHandle {
    /// Spawn an executor thread named `executor-<index>`.
    pub(crate) fn spawn<I, P>(
        index: usize,
        registry: Arc<HandlerRegistry>,
        config: ExecutorConfig,
        sender: RequestSender,
        mut inbox: I,
        publisher: P,
    ) -> Result<Self>
    where
        I: RequestInbox + 'static,
        P: EventPublisher + 'static,
    {
        let thread = thread::Builder::new()
            .name(format!("executor-{}", index))
            .spawn(move || run_executor(index, registry, &config, &mut inbox, &publisher))
            .map_err(|e| ThreadwireError::Transport(format!("failed to spawn executor-{}: {}", index, e)))?;

        Ok(Self {
            index,
            sender,
            thread,
        })
    }

    /// Index this executor was spawned with.
    pub fn index(&self) -> usize {
        self.index
    }

    /// A cloneable sender for this executor's request channel.
    pub fn sender(&self) -> &RequestSender {
        &self.sender
    }

    /// Queue a request frame, waiting while the channel is full.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.sender.send(frame).await
    }

    /// Queue a request frame from synchronous code.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_send(&self, frame: Bytes) -> Result<()> {
        self.sender.blocking_send(frame)
    }

    /// Check if the executor thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Send the shutdown sentinel and wait for the thread to exit.
    ///
    /// Requests queued before the sentinel are still served.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; use
    /// `send(shutdown_frame())` followed by [`join`](Self::join) on a
    /// blocking task there.
    pub fn shutdown(self) -> Result<ExecutorExit> {
        // A closed channel means the thread already stopped; join reports why
        if self.sender.blocking_send(shutdown_frame()).is_err() {
            debug!(executor = self.index, "executor already stopped");
        }
        self.join()
    }

    /// Wait for the thread to exit without sending anything.
    pub fn join(self) -> Result<ExecutorExit> {
        self.thread
            .join()
            .map_err(|_| ThreadwireError::ExecutorPanicked)?
    }
}
