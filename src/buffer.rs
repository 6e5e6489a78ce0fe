//! Reusable byte storage underlying the wire codec.
//!
//! A [`ByteBuffer`] keeps an explicit logical `size` next to its `capacity`.
//! Executors allocate one buffer per direction at thread start and
//! [`reset`](ByteBuffer::reset) it between requests, so steady-state traffic
//! performs no allocation. Growth rounds the capacity up to a multiple of
//! [`BLOCK_SIZE`].
//!
//! # Example
//!
//! ```
//! use threadwire::buffer::{ByteBuffer, BLOCK_SIZE};
//!
//! let mut buf = ByteBuffer::new(16);
//! assert_eq!(buf.append(&[0xAB; 20]), 20);
//! assert_eq!(buf.len(), 20);
//! assert_eq!(buf.capacity(), BLOCK_SIZE);
//!
//! buf.reset();
//! assert!(buf.is_empty());
//! assert_eq!(buf.capacity(), BLOCK_SIZE);
//! ```

use crate::error::{Result, ThreadwireError};

/// Capacity growth granularity in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Capacity used by [`ByteBuffer::default`].
pub const DEFAULT_CAPACITY: usize = 256;

/// How a buffer reacts to an append that does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Never grows; overflowing appends fail.
    Fixed,
    /// Grows without an upper bound.
    Unbounded,
    /// Grows until capacity would exceed the given number of bytes.
    Limited(usize),
}

/// Growable byte storage with `size <= capacity`.
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    /// Backing storage; `data.len()` is the capacity.
    data: Vec<u8>,
    /// Logical size.
    size: usize,
    growth: Growth,
}

/// Round `n` up to the next multiple of [`BLOCK_SIZE`].
#[inline]
fn round_to_block(n: usize) -> Option<usize> {
    n.checked_add(BLOCK_SIZE - 1).map(|v| v / BLOCK_SIZE * BLOCK_SIZE)
}

impl ByteBuffer {
    /// Create a growable buffer with the given initial capacity.
    pub fn new(capacity: usize) -> Self {
        Self::with_growth(capacity, Growth::Unbounded)
    }

    /// Create a buffer that never grows.
    pub fn fixed(capacity: usize) -> Self {
        Self::with_growth(capacity, Growth::Fixed)
    }

    /// Create a buffer that grows up to `max_capacity` bytes.
    pub fn with_limit(capacity: usize, max_capacity: usize) -> Self {
        Self::with_growth(capacity, Growth::Limited(max_capacity))
    }

    fn with_growth(capacity: usize, growth: Growth) -> Self {
        Self {
            data: vec![0; capacity],
            size: 0,
            growth,
        }
    }

    /// Create a growable buffer holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::new(bytes.len());
        buf.data.copy_from_slice(bytes);
        buf.size = bytes.len();
        buf
    }

    /// Logical size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if the logical size is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Allocated capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Growth mode of this buffer.
    #[inline]
    pub fn growth(&self) -> Growth {
        self.growth
    }

    /// Largest logical size the buffer can reach, or `None` if unbounded.
    pub fn max_len(&self) -> Option<usize> {
        match self.growth {
            Growth::Fixed => Some(self.capacity()),
            Growth::Unbounded => None,
            Growth::Limited(max) => Some(self.capacity().max(max / BLOCK_SIZE * BLOCK_SIZE)),
        }
    }

    /// Check if the buffer may grow at all.
    #[inline]
    pub fn is_growable(&self) -> bool {
        self.growth != Growth::Fixed
    }

    /// The logically filled part of the buffer.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Grow capacity to hold at least `n` bytes.
    ///
    /// The new capacity is `n` rounded up to a multiple of [`BLOCK_SIZE`].
    /// Requests at or below the current capacity are a no-op. Returns the
    /// capacity after the call.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadwireError::Overflow`] if the buffer is fixed, the
    /// rounded capacity exceeds the growth limit, or allocation fails.
    pub fn resize(&mut self, n: usize) -> Result<usize> {
        if n <= self.capacity() {
            return Ok(self.capacity());
        }
        let overflow = ThreadwireError::Overflow {
            needed: n,
            capacity: self.capacity(),
        };
        let target = match (self.growth, round_to_block(n)) {
            (Growth::Fixed, _) | (_, None) => return Err(overflow),
            (Growth::Limited(max), Some(t)) if t > max => return Err(overflow),
            (_, Some(t)) => t,
        };
        let additional = target - self.data.len();
        if self.data.try_reserve_exact(additional).is_err() {
            return Err(overflow);
        }
        self.data.resize(target, 0);
        Ok(self.capacity())
    }

    /// Append `bytes`, growing if allowed.
    ///
    /// Returns the number of bytes appended: `bytes.len()` on success, 0 if
    /// the data does not fit and the buffer cannot grow. Nothing is written
    /// on failure.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let Some(new_size) = self.size.checked_add(bytes.len()) else {
            return 0;
        };
        if new_size > self.capacity() && self.resize(new_size).is_err() {
            return 0;
        }
        self.data[self.size..new_size].copy_from_slice(bytes);
        self.size = new_size;
        bytes.len()
    }

    /// Logical clear; keeps the allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.size = 0;
    }

    /// Overwrite the logical contents with `byte`.
    pub fn fill(&mut self, byte: u8) {
        self.data[..self.size].fill(byte);
    }

    /// Overwrite the logical contents with zeroes.
    pub fn clear(&mut self) {
        self.fill(0);
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBuffer {}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
