//! Whole-value MsgPack codec.
//!
//! Used for payloads that are not streamed through a [`ByteBuffer`], such as
//! the raw result span of a [`Reply`](crate::protocol::Reply) or a frame
//! built from a plain tuple. Structs are written with field names, matching
//! [`BufferWriter::write_typed`], and decoding goes through
//! [`BufferReader`] so a span must hold exactly one value.
//!
//! [`ByteBuffer`]: crate::buffer::ByteBuffer
//! [`BufferWriter::write_typed`]: super::BufferWriter::write_typed
//!
//! # Example
//!
//! ```
//! use threadwire::codec::MsgPackCodec;
//!
//! // A request frame [1, -7, 0, 42] written as a tuple
//! let frame = MsgPackCodec::encode(&(1u32, -7i64, 0u32, 42u32)).unwrap();
//! assert_eq!(&frame[..], &[0x94, 0x01, 0xf9, 0x00, 0x2a]);
//!
//! let (group, id): (u32, i64) = MsgPackCodec::decode(&[0x92, 0x01, 0xf9]).unwrap();
//! assert_eq!((group, id), (1, -7));
//! assert!(MsgPackCodec::decode::<u32>(&[0x01, 0x02]).is_err());
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::BufferReader;
use crate::error::{Result, ThreadwireError};

/// Encoder and decoder for single MsgPack values.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode `value` into a standalone frame.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
    }

    /// Decode exactly one value spanning all of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails if the bytes do not deserialize to `T` or if anything follows
    /// the value.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        let mut reader = BufferReader::from_bytes(bytes);
        let value = reader.read_typed()?;
        if reader.remaining() != 0 {
            return Err(ThreadwireError::decode(format!(
                "{} trailing bytes after value",
                reader.remaining()
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct FileInfo {
        size: u64,
        name: String,
        is_dir: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = FileInfo {
            size: 4096,
            name: "notes.txt".to_string(),
            is_dir: false,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: FileInfo = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_struct_is_written_as_map() {
        let info = FileInfo {
            size: 1,
            name: "x".to_string(),
            is_dir: true,
        };

        let encoded = MsgPackCodec::encode(&info).unwrap();

        // fixmap with 3 entries, not fixarray
        assert_eq!(encoded[0], 0x83, "Expected map format, got {:02X}", encoded[0]);
    }

    #[test]
    fn test_tuple_is_written_as_array() {
        let encoded = MsgPackCodec::encode(&(-7i32, vec![42u8])).unwrap();
        assert_eq!(&encoded[..], &[0x92, 0xf9, 0x91, 0x2a]);
    }

    #[test]
    fn test_option_nil() {
        let encoded = MsgPackCodec::encode(&None::<i32>).unwrap();
        assert_eq!(&encoded[..], &[0xc0]);

        let decoded: Option<i32> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let err = MsgPackCodec::decode::<u8>(&[0x01, 0xc0]).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<FileInfo> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }

    #[test]
    fn test_binary_payload() {
        let data: Vec<u8> = vec![0x01, 0x02, 0x03];
        let encoded = MsgPackCodec::encode(&serde_bytes::Bytes::new(&data)).unwrap();

        assert_eq!(encoded[0], 0xc4, "Expected bin8 format");

        let decoded: serde_bytes::ByteBuf = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded.as_ref(), &data);
    }
}
