//! Engine builder and executor lifecycle.
//!
//! The [`EngineBuilder`] configures executors; the [`Engine`] owns the
//! frozen [`HandlerRegistry`] and the shared reply channel, and spawns
//! executors on demand:
//! 1. Register handler groups on a [`RegistryBuilder`](crate::handler::RegistryBuilder)
//! 2. Build the engine from the frozen registry
//! 3. Take the [`ReplyStream`] once
//! 4. Spawn executors and send them request frames
//! 5. Shut executors down with the `[]` sentinel
//!
//! # Example
//!
//! ```
//! use threadwire::handler::{echo::echo_group, RegistryBuilder};
//! use threadwire::protocol::{Reply, RequestBuilder};
//! use threadwire::Engine;
//!
//! let mut registry = RegistryBuilder::new();
//! let echo = registry.register_group(echo_group()).unwrap();
//!
//! let mut engine = Engine::builder().build(registry.build());
//! let mut replies = engine.subscribe_replies().unwrap();
//! let executor = engine.spawn_executor(0).unwrap();
//!
//! let frame = RequestBuilder::new(echo, -7).arg(0).arg(42).build().unwrap();
//! executor.blocking_send(frame).unwrap();
//!
//! let reply = Reply::decode(replies.blocking_recv().unwrap()).unwrap();
//! assert_eq!(reply.correlation_id(), -7);
//! assert_eq!(reply.result::<Vec<i32>>().unwrap(), vec![42]);
//!
//! executor.shutdown().unwrap();
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, ThreadwireError};
use crate::executor::{fatal, ExecutorConfig, ExecutorHandle, FatalAction};
use crate::handler::HandlerRegistry;
use crate::transport::{reply_channel, request_channel, ReplyPublisher, ReplyStream};

/// Builder for configuring and creating an [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: ExecutorConfig,
}

impl EngineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial request buffer capacity.
    ///
    /// Default: 1024
    pub fn request_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.request_buffer_capacity = capacity;
        self
    }

    /// Set the initial reply buffer capacity.
    ///
    /// Default: 1024
    pub fn reply_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.reply_buffer_capacity = capacity;
        self
    }

    /// Set the largest request or reply frame an executor accepts.
    ///
    /// Larger frames are fatal overflows. Default: 1 MiB
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the bound of each executor's request channel.
    ///
    /// Default: 64
    pub fn request_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.request_channel_capacity = capacity;
        self
    }

    /// Set the reaction to fatal executor errors.
    ///
    /// Default: [`FatalAction::ExitProcess`]
    pub fn fatal_action(mut self, action: FatalAction) -> Self {
        self.config.fatal_action = action;
        self
    }

    /// Use a complete configuration.
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine around a frozen registry.
    pub fn build(self, registry: HandlerRegistry) -> Engine {
        Engine::with_config(registry, self.config)
    }
}

/// Owner of the handler registry and the shared reply channel.
pub struct Engine {
    registry: Arc<HandlerRegistry>,
    config: ExecutorConfig,
    publisher: ReplyPublisher,
    replies: Option<ReplyStream>,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine with default configuration.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::with_config(registry, ExecutorConfig::default())
    }

    fn with_config(registry: HandlerRegistry, config: ExecutorConfig) -> Self {
        let (publisher, replies) = reply_channel();
        Self {
            registry: Arc::new(registry),
            config,
            publisher,
            replies: Some(replies),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Take the reply stream all executors publish to.
    ///
    /// Replies published before this call are buffered.
    ///
    /// # Errors
    ///
    /// [`ThreadwireError::Transport`] if the stream was already taken.
    pub fn subscribe_replies(&mut self) -> Result<ReplyStream> {
        self.replies
            .take()
            .ok_or_else(|| ThreadwireError::Transport("reply stream already taken".to_string()))
    }

    /// Spawn executor thread `executor-<index>` with its own request channel.
    ///
    /// # Errors
    ///
    /// [`ThreadwireError::Transport`] if the thread cannot be spawned and
    /// the fatal action is [`FatalAction::Return`]; otherwise the process
    /// exits.
    pub fn spawn_executor(&self, index: usize) -> Result<ExecutorHandle> {
        let (sender, inbox) = request_channel(self.config.request_channel_capacity);
        let handle = ExecutorHandle::spawn(
            index,
            Arc::clone(&self.registry),
            self.config.clone(),
            sender,
            inbox,
            self.publisher.clone(),
        )
        .map_err(|e| fatal(self.config.fatal_action, index, e))?;
        debug!(executor = index, "executor spawned");
        Ok(handle)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("groups", &self.registry.group_count())
            .field("config", &self.config)
            .field("replies_taken", &self.replies.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExitReason;
    use crate::handler::{echo::echo_group, RegistryBuilder};
    use crate::protocol::{shutdown_frame, Reply, RequestBuilder};

    fn echo_engine() -> Engine {
        let mut registry = RegistryBuilder::new();
        registry.register_group(echo_group()).unwrap();
        Engine::builder()
            .fatal_action(FatalAction::Return)
            .build(registry.build())
    }

    #[test]
    fn test_builder_setters() {
        let mut registry = RegistryBuilder::new();
        registry.register_group(echo_group()).unwrap();

        let engine = Engine::builder()
            .request_buffer_capacity(10)
            .reply_buffer_capacity(20)
            .max_frame_size(4096)
            .request_channel_capacity(3)
            .fatal_action(FatalAction::Return)
            .build(registry.build());

        let config = engine.config();
        assert_eq!(config.request_buffer_capacity, 10);
        assert_eq!(config.reply_buffer_capacity, 20);
        assert_eq!(config.max_frame_size, 4096);
        assert_eq!(config.request_channel_capacity, 3);
        assert_eq!(config.fatal_action, FatalAction::Return);
        assert_eq!(engine.registry().group_count(), 1);
    }

    #[test]
    fn test_subscribe_once() {
        let mut engine = echo_engine();
        assert!(engine.subscribe_replies().is_ok());
        assert!(engine.subscribe_replies().unwrap_err().is_transport());
    }

    #[test]
    fn test_replies_buffered_before_subscribe() {
        let mut engine = echo_engine();
        let executor = engine.spawn_executor(0).unwrap();
        executor
            .blocking_send(RequestBuilder::new(1, -5).arg(0).arg("x").build().unwrap())
            .unwrap();
        let exit = executor.shutdown().unwrap();
        assert_eq!(exit.requests, 1);

        let mut replies = engine.subscribe_replies().unwrap();
        let reply = Reply::decode(replies.try_recv().unwrap()).unwrap();
        assert_eq!(reply.correlation_id(), -5);
        assert_eq!(reply.result::<Vec<String>>().unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn test_executor_thread_name() {
        let mut registry = RegistryBuilder::new();
        registry
            .register_group(crate::handler::HandlerGroup::new().handler(
                crate::handler::handler_fn(|_, reply, _| {
                    reply.write_str(std::thread::current().name().unwrap_or(""))
                }),
            ))
            .unwrap();
        let mut engine = Engine::new(registry.build());
        let mut replies = engine.subscribe_replies().unwrap();

        let executor = engine.spawn_executor(3).unwrap();
        assert_eq!(executor.index(), 3);
        executor
            .blocking_send(RequestBuilder::new(1, -1).build().unwrap())
            .unwrap();

        let reply = Reply::decode(replies.blocking_recv().unwrap()).unwrap();
        assert_eq!(reply.result::<String>().unwrap(), "executor-3");
        executor.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_after_sentinel_already_sent() {
        let engine = echo_engine();
        let executor = engine.spawn_executor(0).unwrap();
        executor.blocking_send(shutdown_frame()).unwrap();

        while !executor.is_finished() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let exit = executor.shutdown().unwrap();
        assert_eq!(exit.reason, ExitReason::Shutdown);
    }

    #[test]
    fn test_fatal_error_surfaces_on_join() {
        let engine = echo_engine();
        let executor = engine.spawn_executor(0).unwrap();
        // Group 9 does not exist
        executor
            .blocking_send(RequestBuilder::new(9, -1).build().unwrap())
            .unwrap();

        let err = executor.join().unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("out of range"));
    }
}
