//! Echo demo - a cooperative scheduler offloading sleeps to executors.
//!
//! This demo shows:
//! - Registering builtin handler groups during bootstrap
//! - Spawning executors and sending them request frames
//! - Routing replies back to waiting tasks by correlation id
//!
//! Every task asks for a different delay; all of them run on one scheduler
//! thread, yet the total run time is close to the longest delay because the
//! sleeping happens on executor threads.
//!
//! ```text
//! RUST_LOG=threadwire=debug cargo run --example echo
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use threadwire::handler::{echo::echo_group, RegistryBuilder};
use threadwire::protocol::{shutdown_frame, CorrelationIds, Reply, RequestBuilder};
use threadwire::{Engine, ExecutorHandle};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Reply>>>>;

const EXECUTORS: usize = 4;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut registry = RegistryBuilder::new();
    let echo = registry.register_group(echo_group())?;

    let mut engine = Engine::new(registry.build());
    let mut replies = engine.subscribe_replies()?;
    let executors: Arc<Vec<ExecutorHandle>> = Arc::new(
        (0..EXECUTORS)
            .map(|i| engine.spawn_executor(i))
            .collect::<threadwire::Result<_>>()?,
    );

    // Resume whichever task owns each reply
    let pending: Pending = Arc::default();
    let router = {
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(reply) = replies.recv_reply().await {
                let reply = match reply {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::error!(error = %e, "undecodable reply");
                        continue;
                    }
                };
                let waiter = pending.lock().ok().and_then(|mut p| p.remove(&reply.correlation_id()));
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => tracing::warn!(id = reply.correlation_id(), "reply for unknown task"),
                }
            }
        })
    };

    let ids = Arc::new(CorrelationIds::new());
    let start = Instant::now();
    let tasks: Vec<_> = (0..8u64)
        .map(|task| {
            let executors = Arc::clone(&executors);
            let pending = Arc::clone(&pending);
            let ids = Arc::clone(&ids);
            tokio::spawn(async move {
                let id = ids.next_id();
                let (tx, rx) = oneshot::channel();
                if let Ok(mut p) = pending.lock() {
                    p.insert(id, tx);
                }

                let delay = 50 * (task + 1);
                let frame = RequestBuilder::new(echo, id)
                    .arg(delay)
                    .arg(format!("task {}", task))
                    .build()?;
                executors[task as usize % EXECUTORS].send(frame).await?;

                let reply = rx.await.map_err(|_| threadwire::ThreadwireError::ChannelClosed)?;
                let echoed: Vec<String> = reply.result()?;
                println!("task {} woke after {:?}: {:?}", task, start.elapsed(), echoed);
                threadwire::Result::Ok(())
            })
        })
        .collect();

    for task in tasks {
        task.await??;
    }
    println!("all tasks done in {:?}", start.elapsed());

    for executor in executors.iter() {
        executor.send(shutdown_frame()).await?;
    }
    router.abort();
    Ok(())
}
