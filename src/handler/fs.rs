//! Filesystem group: blocking file calls with errors returned as data.
//!
//! Every reply is `[status, payload]`. On success `status` is 0 and
//! `payload` is the call's result; on failure `status` is the OS error code
//! (or -1 when there is none) and `payload` is the error message.
//!
//! | index | call                       | result                  |
//! |-------|----------------------------|-------------------------|
//! | 0     | `stat(path)`               | [`FileStat`] map        |
//! | 1     | `read(path, offset, len)`  | bin, at most `len` long |
//! | 2     | `write(path, offset, bin)` | bytes written           |
//! | 3     | `lstat(path)`              | [`FileStat`] map        |
//!
//! `read` is short when the file ends early or when `len` would not fit in
//! the executor's reply buffer; callers loop like they would on `read(2)`.

use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use super::{handler_fn, HandlerGroup, HandlerResult};
use crate::codec::{BufferReader, BufferWriter};
use crate::error::{Result, ThreadwireError};

pub const STAT: u32 = 0;
pub const READ: u32 = 1;
pub const WRITE: u32 = 2;
pub const LSTAT: u32 = 3;

/// Reply bytes around the data of a successful read: the array header, the
/// status and the largest bin header.
const READ_REPLY_OVERHEAD: usize = 1 + 1 + 5;

/// Result of `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Only ever set by `lstat`.
    pub is_symlink: bool,
    pub readonly: bool,
    /// Seconds since the Unix epoch, if the platform reports it.
    pub modified: Option<u64>,
}

/// Build the filesystem group.
pub fn fs_group() -> HandlerGroup {
    HandlerGroup::new()
        .handler(handler_fn(stat))
        .handler(handler_fn(read))
        .handler(handler_fn(write))
        .handler(handler_fn(lstat))
}

fn expect_args(name: &str, argc: u32, expected: u32) -> Result<()> {
    if argc == expected {
        return Ok(());
    }
    Err(ThreadwireError::Protocol(format!(
        "{} expects {} arguments, got {}",
        name, expected, argc
    )))
}

/// Write `[0, result]` or `[errno, message]`.
fn write_outcome<T>(
    reply: &mut BufferWriter<'_>,
    outcome: io::Result<T>,
    write_ok: impl FnOnce(&mut BufferWriter<'_>, T) -> Result<()>,
) -> HandlerResult {
    reply.write_array_len(2)?;
    match outcome {
        Ok(value) => {
            reply.write_sint(0)?;
            write_ok(reply, value)
        }
        Err(e) => {
            reply.write_sint(e.raw_os_error().map_or(-1, i64::from))?;
            reply.write_str(&e.to_string())
        }
    }
}

impl From<Metadata> for FileStat {
    fn from(meta: Metadata) -> Self {
        Self {
            size: meta.len(),
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            is_symlink: meta.file_type().is_symlink(),
            readonly: meta.permissions().readonly(),
            modified: meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
        }
    }
}

fn stat(request: &mut BufferReader<'_>, reply: &mut BufferWriter<'_>, argc: u32) -> HandlerResult {
    expect_args("stat", argc, 1)?;
    let path = request.read_str()?;
    let outcome = std::fs::metadata(&path).map(FileStat::from);
    write_outcome(reply, outcome, |w, stat| w.write_typed(&stat))
}

fn lstat(request: &mut BufferReader<'_>, reply: &mut BufferWriter<'_>, argc: u32) -> HandlerResult {
    expect_args("lstat", argc, 1)?;
    let path = request.read_str()?;
    let outcome = std::fs::symlink_metadata(&path).map(FileStat::from);
    write_outcome(reply, outcome, |w, stat| w.write_typed(&stat))
}

fn read(request: &mut BufferReader<'_>, reply: &mut BufferWriter<'_>, argc: u32) -> HandlerResult {
    expect_args("read", argc, 3)?;
    let path = request.read_str()?;
    let offset = request.read_u64()?;
    let len = match reply.headroom() {
        Some(room) => request
            .read_u64()?
            .min(room.saturating_sub(READ_REPLY_OVERHEAD) as u64),
        None => request.read_u64()?,
    };

    let outcome = File::open(&path).and_then(|mut file| {
        file.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::new();
        file.take(len).read_to_end(&mut data)?;
        Ok(data)
    });
    write_outcome(reply, outcome, |w, data| w.write_bin(&data))
}

fn write(request: &mut BufferReader<'_>, reply: &mut BufferWriter<'_>, argc: u32) -> HandlerResult {
    expect_args("write", argc, 3)?;
    let path = request.read_str()?;
    let offset = request.read_u64()?;
    let data = request.read_bin()?;

    let outcome = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .and_then(|mut file| {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&data)?;
            Ok(data.len() as u64)
        });
    write_outcome(reply, outcome, |w, n| w.write_uint(n))
}
