//! Request and reply frames.
//!
//! The executor side uses [`RequestHeader::decode`] and [`begin_reply`];
//! the scheduler side builds requests with [`RequestBuilder`] and reads
//! completions with [`Reply`].
//!
//! # Example
//!
//! ```
//! use threadwire::protocol::{HandlerAddress, Reply, RequestBuilder};
//!
//! let frame = RequestBuilder::new(HandlerAddress::new(1, 0), -7)
//!     .arg(0)
//!     .arg(42)
//!     .build()
//!     .unwrap();
//! assert_eq!(&frame[..], &[0x94, 0x01, 0xf9, 0x00, 0x2a]);
//!
//! let reply = Reply::decode(bytes::Bytes::from_static(&[0x92, 0xf9, 0x91, 0x2a])).unwrap();
//! assert_eq!(reply.correlation_id(), -7);
//! assert_eq!(reply.result::<Vec<i32>>().unwrap(), vec![42]);
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::wire_format::{
    decode_correlation_id, HandlerAddress, REPLY_LEN, REQUEST_PREFIX_LEN, SHUTDOWN_FRAME,
};
use crate::buffer::ByteBuffer;
use crate::codec::{BufferReader, BufferWriter, MsgPackCodec, Value};
use crate::error::{Result, ThreadwireError};

/// Decoded leading part of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Target handler.
    pub address: HandlerAddress,
    /// Caller-chosen negative id echoed in the reply.
    pub correlation_id: i64,
    /// Number of handler arguments following the header.
    pub argc: u32,
}

impl RequestHeader {
    /// Decode the frame prefix, leaving the reader at the first argument.
    ///
    /// Returns `Ok(None)` for the shutdown sentinel.
    ///
    /// # Errors
    ///
    /// Protocol error if the frame is not an array, has fewer than two
    /// elements, or carries an invalid address or correlation id. The
    /// frame must hold exactly its declared elements: a truncated argument
    /// or trailing bytes (also after `[]`) are rejected.
    pub fn decode(reader: &mut BufferReader<'_>) -> Result<Option<Self>> {
        let elements = reader
            .read_array_len()
            .map_err(|e| ThreadwireError::Protocol(format!("request is not an array ({})", e)))?;
        if elements == 0 {
            if reader.remaining() != 0 {
                return Err(ThreadwireError::Protocol(format!(
                    "shutdown sentinel must be the whole frame, got {} trailing bytes",
                    reader.remaining()
                )));
            }
            return Ok(None);
        }
        if elements < REQUEST_PREFIX_LEN {
            return Err(ThreadwireError::Protocol(format!(
                "request should be an array of at least two elements: [address, correlation_id, ...], got {}",
                elements
            )));
        }
        let address = HandlerAddress::decode(reader)?;
        let correlation_id = decode_correlation_id(reader)?;
        let argc = elements - REQUEST_PREFIX_LEN;

        // Arguments must be complete and end the frame
        let mut args = reader.clone();
        for _ in 0..argc {
            args.skip_value()?;
        }
        if args.remaining() != 0 {
            return Err(ThreadwireError::Protocol(format!(
                "request has {} trailing bytes after its {} arguments",
                args.remaining(),
                argc
            )));
        }

        Ok(Some(Self {
            address,
            correlation_id,
            argc,
        }))
    }
}

/// Write the reply prefix `[correlation_id, ` leaving the result to the handler.
pub fn begin_reply(writer: &mut BufferWriter<'_>, correlation_id: i64) -> Result<()> {
    writer.write_array_len(REPLY_LEN)?;
    writer.write_sint(correlation_id)
}

/// The encoded shutdown sentinel.
pub fn shutdown_frame() -> Bytes {
    Bytes::from_static(&SHUTDOWN_FRAME)
}

/// Builder for request frames on the scheduler side.
pub struct RequestBuilder {
    address: HandlerAddress,
    correlation_id: i64,
    args: ByteBuffer,
    argc: u32,
    error: Option<ThreadwireError>,
}

impl RequestBuilder {
    /// Start a request for `address` tagged with `correlation_id`.
    pub fn new(address: impl Into<HandlerAddress>, correlation_id: i64) -> Self {
        Self {
            address: address.into(),
            correlation_id,
            args: ByteBuffer::default(),
            argc: 0,
            error: None,
        }
    }

    fn push(mut self, write: impl FnOnce(&mut BufferWriter<'_>) -> Result<()>) -> Self {
        if self.error.is_none() {
            match write(&mut BufferWriter::new(&mut self.args)) {
                Ok(()) => self.argc += 1,
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Append an argument.
    pub fn arg(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.push(|w| w.write_value(&value))
    }

    /// Append a serde-serializable argument.
    pub fn arg_typed<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.push(|w| w.write_typed(value))
    }

    /// Append an argument that is already MessagePack-encoded.
    pub fn arg_raw(self, encoded: &[u8]) -> Self {
        self.push(|w| w.write_raw(encoded))
    }

    /// Encode the frame.
    ///
    /// # Errors
    ///
    /// Returns the first argument encoding error, or a protocol error if
    /// the correlation id is not negative.
    pub fn build(self) -> Result<Bytes> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.correlation_id >= 0 {
            return Err(ThreadwireError::Protocol(format!(
                "correlation id ({}) should be a negative number",
                self.correlation_id
            )));
        }
        let elements = self
            .argc
            .checked_add(REQUEST_PREFIX_LEN)
            .ok_or_else(|| ThreadwireError::protocol("too many arguments"))?;

        let mut frame = ByteBuffer::new(self.args.len() + 16);
        let mut writer = BufferWriter::new(&mut frame);
        writer.write_array_len(elements)?;
        self.address.encode(&mut writer)?;
        writer.write_sint(self.correlation_id)?;
        writer.write_raw(self.args.as_slice())?;
        Ok(Bytes::copy_from_slice(frame.as_slice()))
    }
}

/// A decoded reply frame.
#[derive(Debug, Clone)]
pub struct Reply {
    correlation_id: i64,
    frame: Bytes,
    result_start: usize,
}

impl Reply {
    /// Decode a reply frame; the result stays encoded until asked for.
    pub fn decode(frame: Bytes) -> Result<Self> {
        let mut reader = BufferReader::from_bytes(&frame);
        let elements = reader.read_array_len()?;
        if elements != REPLY_LEN {
            return Err(ThreadwireError::Protocol(format!(
                "reply should be an array of two elements, got {}",
                elements
            )));
        }
        let correlation_id = reader.read_i64()?;
        let result_start = reader.position();
        reader.skip_value()?;
        if reader.remaining() != 0 {
            return Err(ThreadwireError::Protocol(format!(
                "reply has {} trailing bytes after its result",
                reader.remaining()
            )));
        }
        Ok(Self {
            correlation_id,
            frame,
            result_start,
        })
    }

    /// Read only the correlation id of a reply frame.
    pub fn peek_correlation_id(frame: &[u8]) -> Result<i64> {
        let mut reader = BufferReader::from_bytes(frame);
        match reader.read_array_len()? {
            REPLY_LEN => reader.read_i64(),
            n => Err(ThreadwireError::Protocol(format!(
                "reply should be an array of two elements, got {}",
                n
            ))),
        }
    }

    /// The id of the request this reply completes.
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    /// Encoded bytes of the result element.
    pub fn raw_result(&self) -> &[u8] {
        &self.frame[self.result_start..]
    }

    /// The result as a dynamic value.
    pub fn value(&self) -> Result<Value> {
        BufferReader::from_bytes(self.raw_result()).read_value()
    }

    /// The result deserialized into `T`.
    pub fn result<T: DeserializeOwned>(&self) -> Result<T> {
        MsgPackCodec::decode(self.raw_result())
    }

    /// The whole encoded frame.
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }
}
