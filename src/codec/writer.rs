//! Streaming MessagePack writer appending to a [`ByteBuffer`].
//!
//! Every write goes through [`ByteBuffer::append`], so the buffer grows per
//! its growth mode. When it cannot, the write fails with
//! [`ThreadwireError::Overflow`] and the buffer keeps whatever complete
//! pieces were appended before.

use std::io::{self, Write};

use serde::Serialize;

use super::Value;
use crate::buffer::ByteBuffer;
use crate::error::{Result, ThreadwireError};

/// Writer bound to a byte buffer; the cursor is the buffer's end.
#[derive(Debug)]
pub struct BufferWriter<'a> {
    buf: &'a mut ByteBuffer,
    start: usize,
    /// `(needed, capacity)` of the last append that did not fit.
    overflow: Option<(usize, usize)>,
}

impl<'a> BufferWriter<'a> {
    /// Append after the current contents of `buf`.
    pub fn new(buf: &'a mut ByteBuffer) -> Self {
        let start = buf.len();
        Self {
            buf,
            start,
            overflow: None,
        }
    }

    /// Bytes written through this writer.
    #[inline]
    pub fn written(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Cursor position (absolute offset in the buffer).
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Bytes that can still be written before the buffer overflows, or
    /// `None` if it grows without bound.
    pub fn headroom(&self) -> Option<usize> {
        self.buf.max_len().map(|max| max.saturating_sub(self.buf.len()))
    }

    fn overflow_error(&mut self) -> ThreadwireError {
        let (needed, capacity) = self
            .overflow
            .take()
            .unwrap_or((self.buf.len(), self.buf.capacity()));
        ThreadwireError::Overflow { needed, capacity }
    }

    pub fn write_array_len(&mut self, len: u32) -> Result<()> {
        rmp::encode::write_array_len(self, len).map_err(|_| self.overflow_error())?;
        Ok(())
    }

    pub fn write_map_len(&mut self, len: u32) -> Result<()> {
        rmp::encode::write_map_len(self, len).map_err(|_| self.overflow_error())?;
        Ok(())
    }

    pub fn write_nil(&mut self) -> Result<()> {
        rmp::encode::write_nil(self).map_err(|_| self.overflow_error())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        rmp::encode::write_bool(self, v).map_err(|_| self.overflow_error())
    }

    /// Write an unsigned integer in its most compact form.
    pub fn write_uint(&mut self, v: u64) -> Result<()> {
        rmp::encode::write_uint(self, v).map_err(|_| self.overflow_error())?;
        Ok(())
    }

    /// Write a signed integer in its most compact form.
    pub fn write_sint(&mut self, v: i64) -> Result<()> {
        rmp::encode::write_sint(self, v).map_err(|_| self.overflow_error())?;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        rmp::encode::write_u8(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        rmp::encode::write_u16(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        rmp::encode::write_u32(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        rmp::encode::write_u64(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        rmp::encode::write_i8(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        rmp::encode::write_i16(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        rmp::encode::write_i32(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        rmp::encode::write_i64(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        rmp::encode::write_f32(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        rmp::encode::write_f64(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_str(&mut self, v: &str) -> Result<()> {
        rmp::encode::write_str(self, v).map_err(|_| self.overflow_error())
    }

    pub fn write_bin(&mut self, v: &[u8]) -> Result<()> {
        rmp::encode::write_bin(self, v).map_err(|_| self.overflow_error())
    }

    /// Append bytes that already hold one or more encoded values.
    pub fn write_raw(&mut self, encoded: &[u8]) -> Result<()> {
        self.write_all(encoded).map_err(|_| self.overflow_error())
    }

    /// Write a dynamic value, recursing into arrays and maps.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Nil => self.write_nil(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(v) => self.write_sint(*v),
            Value::UInt(v) => self.write_uint(*v),
            Value::F32(v) => self.write_f32(*v),
            Value::F64(v) => self.write_f64(*v),
            Value::Str(s) => self.write_str(s),
            Value::Bin(b) => self.write_bin(b),
            Value::Array(items) => {
                self.write_array_len(len_u32(items.len())?)?;
                items.iter().try_for_each(|item| self.write_value(item))
            }
            Value::Map(entries) => {
                self.write_map_len(len_u32(entries.len())?)?;
                entries.iter().try_for_each(|(k, v)| {
                    self.write_value(k)?;
                    self.write_value(v)
                })
            }
        }
    }

    /// Serialize `value` with rmp-serde; structs are written as maps with
    /// field names.
    pub fn write_typed<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        match rmp_serde::encode::write_named(self, value) {
            Ok(()) => Ok(()),
            Err(_) if self.overflow.is_some() => Err(self.overflow_error()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Write for BufferWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.append(data) == data.len() {
            return Ok(data.len());
        }
        self.overflow = Some((self.buf.len() + data.len(), self.buf.capacity()));
        Err(io::Error::new(
            io::ErrorKind::WriteZero,
            "buffer cannot grow to hold the write",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ThreadwireError::protocol(format!("{} elements exceed u32", len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BLOCK_SIZE;
    use crate::codec::BufferReader;

    #[test]
    fn test_writer_appends_after_existing() {
        let mut buf = ByteBuffer::new(16);
        buf.append(&[0x92]);
        let mut writer = BufferWriter::new(&mut buf);
        writer.write_uint(1).unwrap();
        writer.write_uint(2).unwrap();
        assert_eq!(writer.written(), 2);
        assert_eq!(buf.as_slice(), &[0x92, 0x01, 0x02]);
    }

    #[test]
    fn test_compact_integer_encoding() {
        let mut buf = ByteBuffer::new(64);
        let mut writer = BufferWriter::new(&mut buf);
        writer.write_sint(-7).unwrap();
        writer.write_sint(42).unwrap();
        writer.write_uint(300).unwrap();
        assert_eq!(buf.as_slice(), &[0xf9, 0x2a, 0xcd, 0x01, 0x2c]);
    }

    #[test]
    fn test_fixed_width_encoding() {
        let mut buf = ByteBuffer::new(64);
        let mut writer = BufferWriter::new(&mut buf);
        writer.write_u8(1).unwrap();
        writer.write_i32(-1).unwrap();
        assert_eq!(buf.as_slice(), &[0xcc, 0x01, 0xd2, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_overflow_on_fixed_buffer() {
        let mut buf = ByteBuffer::fixed(4);
        let mut writer = BufferWriter::new(&mut buf);
        let err = writer.write_str("longer than four bytes").unwrap_err();
        assert!(matches!(err, ThreadwireError::Overflow { capacity: 4, .. }));
        assert!(buf.len() <= buf.capacity());
    }

    #[test]
    fn test_growth_while_writing() {
        let mut buf = ByteBuffer::new(8);
        let mut writer = BufferWriter::new(&mut buf);
        writer.write_bin(&[7; 2000]).unwrap();
        assert_eq!(buf.capacity(), 2 * BLOCK_SIZE);

        let mut reader = BufferReader::new(&buf);
        assert_eq!(reader.read_bin().unwrap(), vec![7; 2000]);
    }

    #[test]
    fn test_write_typed_overflow() {
        let mut buf = ByteBuffer::fixed(2);
        let mut writer = BufferWriter::new(&mut buf);
        let err = writer.write_typed(&vec![1u32, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, ThreadwireError::Overflow { .. }));
    }

    #[test]
    fn test_headroom() {
        let mut buf = ByteBuffer::fixed(10);
        let mut writer = BufferWriter::new(&mut buf);
        assert_eq!(writer.headroom(), Some(10));
        writer.write_str("abc").unwrap();
        assert_eq!(writer.headroom(), Some(6));

        let mut buf = ByteBuffer::new(4);
        assert_eq!(BufferWriter::new(&mut buf).headroom(), None);
    }

    #[test]
    fn test_write_raw() {
        let mut buf = ByteBuffer::new(8);
        let mut writer = BufferWriter::new(&mut buf);
        writer.write_array_len(1).unwrap();
        writer.write_raw(&[0xa1, b'z']).unwrap();

        let mut reader = BufferReader::new(&buf);
        assert_eq!(
            reader.read_value().unwrap(),
            Value::Array(vec![Value::from("z")])
        );
    }
}
