//! Codec module - MessagePack over reusable byte buffers.
//!
//! - [`BufferReader`] / [`BufferWriter`] - streaming reader and writer bound
//!   to a [`ByteBuffer`](crate::buffer::ByteBuffer) and a cursor, built on `rmp`
//! - [`Value`] - dynamic representation of any supported value
//! - [`MsgPackCodec`] - whole-value encode/decode using `rmp-serde`
//!
//! # Example
//!
//! ```
//! use threadwire::buffer::ByteBuffer;
//! use threadwire::codec::{BufferReader, BufferWriter, Value};
//!
//! let mut buf = ByteBuffer::new(64);
//! let mut writer = BufferWriter::new(&mut buf);
//! writer.write_array_len(2).unwrap();
//! writer.write_sint(-7).unwrap();
//! writer.write_str("done").unwrap();
//!
//! let mut reader = BufferReader::new(&buf);
//! assert_eq!(
//!     reader.read_value().unwrap(),
//!     Value::Array(vec![Value::Int(-7), Value::from("done")])
//! );
//! ```

mod msgpack;
mod reader;
mod value;
mod writer;

pub use msgpack::MsgPackCodec;
pub use reader::{BufferReader, MAX_VALUE_DEPTH};
pub use value::Value;
pub use writer::BufferWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteBuffer;

    fn roundtrip(value: &Value) -> Value {
        let mut buf = ByteBuffer::new(16);
        BufferWriter::new(&mut buf).write_value(value).unwrap();
        let mut reader = BufferReader::new(&buf);
        let decoded = reader.read_value().unwrap();
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    #[test]
    fn test_integer_boundaries_roundtrip() {
        let values = [
            0i64,
            -1,
            127,
            128,
            -32,
            -33,
            i64::from(i8::MIN),
            i64::from(i8::MAX),
            i64::from(u8::MAX),
            i64::from(i16::MIN),
            i64::from(i16::MAX),
            i64::from(u16::MAX),
            i64::from(i32::MIN),
            i64::from(i32::MAX),
            i64::from(u32::MAX),
            i64::MIN,
            i64::MAX,
        ];
        for v in values {
            assert_eq!(roundtrip(&Value::Int(v)), Value::Int(v), "value {}", v);
        }
        assert_eq!(roundtrip(&Value::UInt(u64::MAX)), Value::UInt(u64::MAX));
    }

    #[test]
    fn test_fixed_width_writes_read_back() {
        let mut buf = ByteBuffer::new(16);
        let mut writer = BufferWriter::new(&mut buf);
        writer.write_u8(u8::MAX).unwrap();
        writer.write_u16(u16::MAX).unwrap();
        writer.write_u32(u32::MAX).unwrap();
        writer.write_u64(u64::MAX).unwrap();
        writer.write_i8(i8::MIN).unwrap();
        writer.write_i16(i16::MIN).unwrap();
        writer.write_i32(i32::MIN).unwrap();
        writer.write_i64(i64::MIN).unwrap();
        writer.write_u8(0).unwrap();
        writer.write_i64(-1).unwrap();

        let mut reader = BufferReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), u8::MAX);
        assert_eq!(reader.read_u16().unwrap(), u16::MAX);
        assert_eq!(reader.read_u32().unwrap(), u32::MAX);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert_eq!(reader.read_i8().unwrap(), i8::MIN);
        assert_eq!(reader.read_i16().unwrap(), i16::MIN);
        assert_eq!(reader.read_i32().unwrap(), i32::MIN);
        assert_eq!(reader.read_i64().unwrap(), i64::MIN);
        assert_eq!(reader.read_u64().unwrap(), 0);
        assert_eq!(reader.read_i64().unwrap(), -1);
    }

    #[test]
    fn test_scalars_roundtrip() {
        for value in [
            Value::Nil,
            Value::Bool(true),
            Value::Bool(false),
            Value::F32(1.25),
            Value::F32(f32::MAX),
            Value::F64(-0.5),
            Value::F64(f64::MIN_POSITIVE),
            Value::from(""),
            Value::from("héllo"),
            Value::from("x".repeat(70_000)),
            Value::Bin(Vec::new()),
            Value::Bin(vec![0; 300]),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_nested_arrays_roundtrip() {
        let value = Value::Array(vec![
            Value::Int(1),
            Value::Array(vec![]),
            Value::Array(vec![Value::Nil, Value::Array(vec![Value::from("deep")])]),
            Value::Map(vec![(Value::from("k"), Value::Array(vec![Value::Bool(true)]))]),
            Value::Array((0..20).map(Value::from).collect()),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_typed_roundtrip_through_buffer() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Stat {
            size: u64,
            readonly: bool,
        }

        let stat = Stat {
            size: 12,
            readonly: true,
        };

        let mut buf = ByteBuffer::new(16);
        BufferWriter::new(&mut buf).write_typed(&stat).unwrap();

        let mut reader = BufferReader::new(&buf);
        let decoded: Stat = reader.read_typed().unwrap();
        assert_eq!(decoded, stat);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_typed_bytes_read_as_bin() {
        let mut buf = ByteBuffer::new(16);
        BufferWriter::new(&mut buf)
            .write_typed(&serde_bytes::Bytes::new(b"raw"))
            .unwrap();

        let mut reader = BufferReader::new(&buf);
        assert_eq!(reader.read_bin().unwrap(), b"raw".to_vec());
    }
}
