//! Echo group: waits, then returns its arguments unchanged.
//!
//! Handler 0 takes `(delay_ms, values...)`, sleeps `delay_ms` milliseconds
//! (integer or float) and replies with an array of `values`, each copied
//! byte-for-byte from the request.

use std::time::Duration;

use super::{handler_fn, HandlerGroup, HandlerResult};
use crate::codec::{BufferReader, BufferWriter};
use crate::error::ThreadwireError;

/// Index of the echo handler within [`echo_group`].
pub const ECHO: u32 = 0;

/// Build the echo group.
pub fn echo_group() -> HandlerGroup {
    HandlerGroup::new().handler(handler_fn(echo))
}

fn echo(request: &mut BufferReader<'_>, reply: &mut BufferWriter<'_>, argc: u32) -> HandlerResult {
    if argc == 0 {
        return Err(ThreadwireError::protocol(
            "echo expects (delay_ms, values...)",
        ));
    }
    let delay_ms = request.read_number()?;
    if !delay_ms.is_finite() || delay_ms < 0.0 {
        return Err(ThreadwireError::Protocol(format!(
            "echo delay must be a non-negative number, got {}",
            delay_ms
        )));
    }
    let delay = Duration::try_from_secs_f64(delay_ms / 1000.0).map_err(|e| {
        ThreadwireError::Protocol(format!("echo delay {} ms is out of range ({})", delay_ms, e))
    })?;
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }

    reply.write_array_len(argc - 1)?;
    for _ in 1..argc {
        let raw = request.skip_value()?;
        reply.write_raw(raw)?;
    }
    Ok(())
}
