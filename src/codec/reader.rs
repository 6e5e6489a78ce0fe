//! Streaming MessagePack reader over a [`ByteBuffer`].
//!
//! Reads never go past the buffer's logical size; a truncated value fails
//! with [`ThreadwireError::Decode`].

use std::io::{self, Read};

use rmp::Marker;
use serde::de::DeserializeOwned;

use super::Value;
use crate::buffer::ByteBuffer;
use crate::error::{Result, ThreadwireError};

/// Maximum nesting depth accepted by [`BufferReader::read_value`].
pub const MAX_VALUE_DEPTH: usize = 256;

/// An integer as found on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Integer {
    Unsigned(u64),
    Signed(i64),
}

/// Reader bound to a byte buffer and a cursor.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a ByteBuffer) -> Self {
        Self::from_bytes(buf.as_slice())
    }

    /// Start reading at the beginning of a plain byte slice.
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor position in bytes.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the logical end.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_marker(&mut self) -> Result<Marker> {
        rmp::decode::read_marker(self).map_err(|e| ThreadwireError::decode(e.0))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ThreadwireError::Decode(format!(
                "need {} bytes at offset {}, only {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let data = self.data;
        let out = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_be<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn integer(&mut self, marker: Marker) -> Result<Option<Integer>> {
        use Integer::*;
        let value = match marker {
            Marker::FixPos(v) => Unsigned(u64::from(v)),
            Marker::FixNeg(v) => Signed(i64::from(v)),
            Marker::U8 => Unsigned(u64::from(self.read_be::<1>()?[0])),
            Marker::U16 => Unsigned(u64::from(u16::from_be_bytes(self.read_be()?))),
            Marker::U32 => Unsigned(u64::from(u32::from_be_bytes(self.read_be()?))),
            Marker::U64 => Unsigned(u64::from_be_bytes(self.read_be()?)),
            Marker::I8 => Signed(i64::from(i8::from_be_bytes(self.read_be()?))),
            Marker::I16 => Signed(i64::from(i16::from_be_bytes(self.read_be()?))),
            Marker::I32 => Signed(i64::from(i32::from_be_bytes(self.read_be()?))),
            Marker::I64 => Signed(i64::from_be_bytes(self.read_be()?)),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn expect_integer(&mut self) -> Result<Integer> {
        let marker = self.read_marker()?;
        self.integer(marker)?
            .ok_or_else(|| unexpected("integer", marker))
    }

    fn length(&mut self, marker: Marker) -> Result<Option<usize>> {
        let len = match marker {
            Marker::FixStr(n) | Marker::FixArray(n) | Marker::FixMap(n) => usize::from(n),
            Marker::Str8 | Marker::Bin8 => usize::from(self.read_be::<1>()?[0]),
            Marker::Str16 | Marker::Bin16 | Marker::Array16 | Marker::Map16 => {
                usize::from(u16::from_be_bytes(self.read_be()?))
            }
            Marker::Str32 | Marker::Bin32 | Marker::Array32 | Marker::Map32 => {
                u32::from_be_bytes(self.read_be()?) as usize
            }
            _ => return Ok(None),
        };
        Ok(Some(len))
    }

    /// Read an array header and return its element count.
    pub fn read_array_len(&mut self) -> Result<u32> {
        let marker = self.read_marker()?;
        match marker {
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
                Ok(self.length(marker)?.unwrap_or(0) as u32)
            }
            _ => Err(unexpected("array", marker)),
        }
    }

    /// Read a map header and return its entry count.
    pub fn read_map_len(&mut self) -> Result<u32> {
        let marker = self.read_marker()?;
        match marker {
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
                Ok(self.length(marker)?.unwrap_or(0) as u32)
            }
            _ => Err(unexpected("map", marker)),
        }
    }

    pub fn read_nil(&mut self) -> Result<()> {
        match self.read_marker()? {
            Marker::Null => Ok(()),
            other => Err(unexpected("nil", other)),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_marker()? {
            Marker::True => Ok(true),
            Marker::False => Ok(false),
            other => Err(unexpected("bool", other)),
        }
    }

    /// Read any integer that fits `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        match self.expect_integer()? {
            Integer::Unsigned(v) => Ok(v),
            Integer::Signed(v) => u64::try_from(v).map_err(|_| out_of_range(v, "u64")),
        }
    }

    /// Read any integer that fits `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        match self.expect_integer()? {
            Integer::Signed(v) => Ok(v),
            Integer::Unsigned(v) => i64::try_from(v).map_err(|_| out_of_range(v, "i64")),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.read_u64()?;
        u8::try_from(v).map_err(|_| out_of_range(v, "u8"))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self.read_u64()?;
        u16::try_from(v).map_err(|_| out_of_range(v, "u16"))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.read_u64()?;
        u32::try_from(v).map_err(|_| out_of_range(v, "u32"))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        let v = self.read_i64()?;
        i8::try_from(v).map_err(|_| out_of_range(v, "i8"))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let v = self.read_i64()?;
        i16::try_from(v).map_err(|_| out_of_range(v, "i16"))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let v = self.read_i64()?;
        i32::try_from(v).map_err(|_| out_of_range(v, "i32"))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        match self.read_marker()? {
            Marker::F32 => Ok(f32::from_be_bytes(self.read_be()?)),
            other => Err(unexpected("f32", other)),
        }
    }

    /// Read a double; single-precision floats are widened.
    pub fn read_f64(&mut self) -> Result<f64> {
        match self.read_marker()? {
            Marker::F64 => Ok(f64::from_be_bytes(self.read_be()?)),
            Marker::F32 => Ok(f64::from(f32::from_be_bytes(self.read_be()?))),
            other => Err(unexpected("f64", other)),
        }
    }

    /// Read any integer or float as `f64`.
    pub fn read_number(&mut self) -> Result<f64> {
        let marker = self.read_marker()?;
        match marker {
            Marker::F64 => Ok(f64::from_be_bytes(self.read_be()?)),
            Marker::F32 => Ok(f64::from(f32::from_be_bytes(self.read_be()?))),
            _ => match self.integer(marker)? {
                Some(Integer::Unsigned(v)) => Ok(v as f64),
                Some(Integer::Signed(v)) => Ok(v as f64),
                None => Err(unexpected("number", marker)),
            },
        }
    }

    /// Read a UTF-8 string.
    pub fn read_str(&mut self) -> Result<String> {
        let marker = self.read_marker()?;
        match marker {
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
                let len = self.length(marker)?.unwrap_or(0);
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec()).map_err(ThreadwireError::decode)
            }
            _ => Err(unexpected("str", marker)),
        }
    }

    /// Read a raw byte string.
    pub fn read_bin(&mut self) -> Result<Vec<u8>> {
        let marker = self.read_marker()?;
        match marker {
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
                let len = self.length(marker)?.unwrap_or(0);
                Ok(self.take(len)?.to_vec())
            }
            _ => Err(unexpected("bin", marker)),
        }
    }

    /// Read one complete value of any supported type.
    pub fn read_value(&mut self) -> Result<Value> {
        self.read_value_at(0)
    }

    fn read_value_at(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_VALUE_DEPTH {
            return Err(ThreadwireError::Decode(format!(
                "value nested deeper than {}",
                MAX_VALUE_DEPTH
            )));
        }
        let marker = self.read_marker()?;
        if let Some(int) = self.integer(marker)? {
            return Ok(match int {
                Integer::Unsigned(v) => Value::from_u64(v),
                Integer::Signed(v) => Value::Int(v),
            });
        }
        let value = match marker {
            Marker::Null => Value::Nil,
            Marker::True => Value::Bool(true),
            Marker::False => Value::Bool(false),
            Marker::F32 => Value::F32(f32::from_be_bytes(self.read_be()?)),
            Marker::F64 => Value::F64(f64::from_be_bytes(self.read_be()?)),
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
                let len = self.length(marker)?.unwrap_or(0);
                let bytes = self.take(len)?;
                Value::Str(String::from_utf8(bytes.to_vec()).map_err(ThreadwireError::decode)?)
            }
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
                let len = self.length(marker)?.unwrap_or(0);
                Value::Bin(self.take(len)?.to_vec())
            }
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
                let len = self.length(marker)?.unwrap_or(0);
                // Every element takes at least one byte
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.read_value_at(depth + 1)?);
                }
                Value::Array(items)
            }
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
                let len = self.length(marker)?.unwrap_or(0);
                let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
                for _ in 0..len {
                    let key = self.read_value_at(depth + 1)?;
                    let value = self.read_value_at(depth + 1)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            other => return Err(unexpected("supported value", other)),
        };
        Ok(value)
    }

    /// Skip one value and return its raw encoded bytes.
    pub fn skip_value(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        self.read_value()?;
        Ok(&self.data[start..self.pos])
    }

    /// Deserialize one value into `T` with rmp-serde.
    pub fn read_typed<T: DeserializeOwned>(&mut self) -> Result<T> {
        Ok(rmp_serde::decode::from_read(&mut *self)?)
    }
}

impl Read for BufferReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn unexpected(expected: &str, marker: Marker) -> ThreadwireError {
    ThreadwireError::Decode(format!("expected {}, found marker {:?}", expected, marker))
}

fn out_of_range(v: impl std::fmt::Display, target: &str) -> ThreadwireError {
    ThreadwireError::Decode(format!("{} does not fit {}", v, target))
}
