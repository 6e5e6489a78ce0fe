//! Wire format of request and reply frames.
//!
//! Every frame is a single MessagePack array:
//!
//! ```text
//! request  = [address, correlation_id, arg0, ..., argN-1]
//! reply    = [correlation_id, result]
//! shutdown = []
//!
//! address  = group_id                 (handler index 0)
//!          | [group_id, handler_index]
//! ```
//!
//! Group ids are 1-based, handler indexes 0-based, correlation ids strictly
//! negative. Ids may be sent as integers or as floats holding an exact
//! integral value.

use crate::codec::{BufferReader, BufferWriter, Value};
use crate::error::{Result, ThreadwireError};

/// Number of leading request elements before the handler arguments.
pub const REQUEST_PREFIX_LEN: u32 = 2;

/// Element count of every reply frame.
pub const REPLY_LEN: u32 = 2;

/// Encoded shutdown sentinel: an empty fixarray.
pub const SHUTDOWN_FRAME: [u8; 1] = [0x90];

/// Which handler a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerAddress {
    /// 1-based handler group id.
    pub group: u32,
    /// 0-based index within the group.
    pub handler: u32,
}

impl HandlerAddress {
    /// Create an address.
    pub fn new(group: u32, handler: u32) -> Self {
        Self { group, handler }
    }

    /// Decode the address element of a request.
    pub fn decode(reader: &mut BufferReader<'_>) -> Result<Self> {
        match reader.read_value()? {
            Value::Array(parts) => match parts.as_slice() {
                [group, handler] => Ok(Self {
                    group: id_u32(group, "handler group id")?,
                    handler: id_u32(handler, "handler index")?,
                }),
                _ => Err(ThreadwireError::Protocol(format!(
                    "handler address should be [group_id, handler_index], got {} elements",
                    parts.len()
                ))),
            },
            scalar => Ok(Self {
                group: id_u32(&scalar, "handler group id")?,
                handler: 0,
            }),
        }
    }

    /// Encode the address: a plain group id when the handler index is 0.
    pub fn encode(&self, writer: &mut BufferWriter<'_>) -> Result<()> {
        if self.handler == 0 {
            return writer.write_uint(u64::from(self.group));
        }
        writer.write_array_len(2)?;
        writer.write_uint(u64::from(self.group))?;
        writer.write_uint(u64::from(self.handler))
    }
}

impl From<u32> for HandlerAddress {
    fn from(group: u32) -> Self {
        Self::new(group, 0)
    }
}

impl From<(u32, u32)> for HandlerAddress {
    fn from((group, handler): (u32, u32)) -> Self {
        Self::new(group, handler)
    }
}

/// Integral view of an id that may have been sent as a float.
fn integral(value: &Value) -> Option<i128> {
    match *value {
        Value::Int(v) => Some(i128::from(v)),
        Value::UInt(v) => Some(i128::from(v)),
        Value::F32(v) => float_integral(f64::from(v)),
        Value::F64(v) => float_integral(v),
        _ => None,
    }
}

fn float_integral(v: f64) -> Option<i128> {
    // Bounds keep the cast exact
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.2e18 {
        Some(v as i128)
    } else {
        None
    }
}

fn id_u32(value: &Value, what: &str) -> Result<u32> {
    let id = integral(value)
        .ok_or_else(|| ThreadwireError::Protocol(format!("{} is not an integer: {:?}", what, value)))?;
    u32::try_from(id).map_err(|_| ThreadwireError::Protocol(format!("{} is out of range: {}", what, id)))
}

/// Decode and validate the correlation id element of a request.
pub fn decode_correlation_id(reader: &mut BufferReader<'_>) -> Result<i64> {
    let value = reader.read_value()?;
    let id = integral(&value).ok_or_else(|| {
        ThreadwireError::Protocol(format!("correlation id is not an integer: {:?}", value))
    })?;
    if id >= 0 {
        return Err(ThreadwireError::Protocol(format!(
            "correlation id ({}) should be a negative number",
            id
        )));
    }
    i64::try_from(id)
        .map_err(|_| ThreadwireError::Protocol(format!("correlation id out of range: {}", id)))
}
