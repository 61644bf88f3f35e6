//! XDR wire encoding for notifications
//!
//! Everything is big-endian and padded to 4-byte boundaries. A frame is
//!
//! ```text
//! [frame length: i32][type id: i32][body]
//! ```
//!
//! where the length counts the type id and body but not itself.
//!
//! An attribute set is a count followed by `name, type code, value` triples.
//! Strings and opaques are a length, the bytes, then zero padding.

use crate::error::CodecError;
use avis_types::{Attributes, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const TYPE_INT32: i32 = 1;
pub const TYPE_INT64: i32 = 2;
pub const TYPE_REAL64: i32 = 3;
pub const TYPE_STRING: i32 = 4;
pub const TYPE_OPAQUE: i32 = 5;

pub const NOTIFY_EMIT: i32 = 56;
pub const NOTIFY_DELIVER: i32 = 57;

/// Default frame size limit (2 MiB)
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 2 * 1024 * 1024;

/// Messages carried between a client and its router
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client to router: publish a notification
    NotifyEmit {
        attributes: Attributes,
        deliver_insecure: bool,
    },
    /// Router to client: a notification matching some subscriptions
    NotifyDeliver {
        attributes: Attributes,
        secure_matches: Vec<i64>,
        insecure_matches: Vec<i64>,
    },
}

impl Message {
    pub fn type_id(&self) -> i32 {
        match self {
            Message::NotifyEmit { .. } => NOTIFY_EMIT,
            Message::NotifyDeliver { .. } => NOTIFY_DELIVER,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::NotifyEmit { .. } => "NotifyEmit",
            Message::NotifyDeliver { .. } => "NotifyDeliver",
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Message::NotifyEmit { attributes, .. } => attributes,
            Message::NotifyDeliver { attributes, .. } => attributes,
        }
    }
}

/// Serialization seam between the connection and its transport
pub trait Codec: Send + Sync {
    /// Encode an attribute set (no frame header)
    fn encode(&self, attributes: &Attributes) -> Bytes;

    /// Decode an attribute set, rejecting trailing bytes
    fn decode(&self, bytes: &[u8]) -> Result<Attributes, CodecError>;

    fn encode_frame(&self, message: &Message) -> Result<Bytes, CodecError>;

    fn decode_frame(&self, frame: &[u8]) -> Result<Message, CodecError>;
}

/// The Elvin XDR codec
#[derive(Debug, Clone)]
pub struct XdrCodec {
    max_frame_length: usize,
}

impl Default for XdrCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl XdrCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Codec for XdrCodec {
    fn encode(&self, attributes: &Attributes) -> Bytes {
        let mut buf = BytesMut::new();
        put_attributes(&mut buf, attributes);
        buf.freeze()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Attributes, CodecError> {
        let mut reader = Reader::new(bytes);
        let attributes = reader.attributes()?;
        reader.finish()?;
        Ok(attributes)
    }

    fn encode_frame(&self, message: &Message) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_i32(0);
        buf.put_i32(message.type_id());

        match message {
            Message::NotifyEmit {
                attributes,
                deliver_insecure,
            } => {
                put_attributes(&mut buf, attributes);
                put_bool(&mut buf, *deliver_insecure);
                // Key set: always empty
                buf.put_i32(0);
            }
            Message::NotifyDeliver {
                attributes,
                secure_matches,
                insecure_matches,
            } => {
                put_attributes(&mut buf, attributes);
                put_long_array(&mut buf, secure_matches);
                put_long_array(&mut buf, insecure_matches);
            }
        }

        let frame_length = buf.len() - 4;
        if frame_length % 4 != 0 {
            return Err(CodecError::Unaligned(frame_length));
        }
        if frame_length > self.max_frame_length {
            return Err(CodecError::FrameTooLarge {
                length: frame_length,
                max: self.max_frame_length,
            });
        }

        buf[..4].copy_from_slice(&(frame_length as i32).to_be_bytes());
        Ok(buf.freeze())
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<Message, CodecError> {
        let mut reader = Reader::new(frame);
        let frame_length = reader.length()?;

        if frame_length % 4 != 0 {
            return Err(CodecError::Unaligned(frame_length));
        }
        if frame_length > self.max_frame_length {
            return Err(CodecError::FrameTooLarge {
                length: frame_length,
                max: self.max_frame_length,
            });
        }
        if reader.remaining() < frame_length {
            return Err(CodecError::Truncated {
                needed: frame_length,
                available: reader.remaining(),
            });
        }
        if reader.remaining() > frame_length {
            return Err(CodecError::TrailingBytes(reader.remaining() - frame_length));
        }

        let message = match reader.i32()? {
            NOTIFY_EMIT => {
                let attributes = reader.attributes()?;
                let deliver_insecure = reader.bool()?;
                reader.skip_keys()?;
                Message::NotifyEmit {
                    attributes,
                    deliver_insecure,
                }
            }
            NOTIFY_DELIVER => Message::NotifyDeliver {
                attributes: reader.attributes()?,
                secure_matches: reader.long_array()?,
                insecure_matches: reader.long_array()?,
            },
            other => return Err(CodecError::UnknownFrame(other)),
        };

        reader.finish()?;
        Ok(message)
    }
}

/// Zero bytes needed to pad `length` to a multiple of 4
fn padding_for(length: usize) -> usize {
    (4 - (length & 3)) & 3
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_i32(bytes.len() as i32);
    buf.put_slice(bytes);
    buf.put_bytes(0, padding_for(bytes.len()));
}

fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_i32(i32::from(value));
}

fn put_long_array(buf: &mut BytesMut, values: &[i64]) {
    buf.put_i32(values.len() as i32);
    for value in values {
        buf.put_i64(*value);
    }
}

fn put_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Int32(i) => {
            buf.put_i32(TYPE_INT32);
            buf.put_i32(*i);
        }
        Value::Int64(i) => {
            buf.put_i32(TYPE_INT64);
            buf.put_i64(*i);
        }
        Value::Real64(d) => {
            buf.put_i32(TYPE_REAL64);
            buf.put_u64(d.to_bits());
        }
        Value::String(s) => {
            buf.put_i32(TYPE_STRING);
            put_bytes(buf, s.as_bytes());
        }
        Value::Opaque(b) => {
            buf.put_i32(TYPE_OPAQUE);
            put_bytes(buf, b);
        }
    }
}

fn put_attributes(buf: &mut BytesMut, attributes: &Attributes) {
    buf.put_i32(attributes.len() as i32);
    for (name, value) in attributes.iter() {
        put_bytes(buf, name.as_bytes());
        put_value(buf, value);
    }
}

/// Bounds-checked reader over a byte slice
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn remaining(&self) -> usize {
        self.data.remaining()
    }

    fn check_remaining(&self, needed: usize) -> Result<(), CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::Truncated {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        self.check_remaining(4)?;
        Ok(self.data.get_i32())
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        self.check_remaining(8)?;
        Ok(self.data.get_i64())
    }

    fn length(&mut self) -> Result<usize, CodecError> {
        let length = self.i32()?;
        usize::try_from(length).map_err(|_| CodecError::NegativeLength(length))
    }

    fn bool(&mut self) -> Result<bool, CodecError> {
        match self.i32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let length = self.length()?;
        let padded = length + padding_for(length);
        self.check_remaining(padded)?;

        let (bytes, rest) = self.data.split_at(length);
        self.data = &rest[padded - length..];
        Ok(bytes)
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn value(&mut self) -> Result<Value, CodecError> {
        Ok(match self.i32()? {
            TYPE_INT32 => Value::Int32(self.i32()?),
            TYPE_INT64 => Value::Int64(self.i64()?),
            TYPE_REAL64 => Value::Real64(f64::from_bits(self.i64()? as u64)),
            TYPE_STRING => Value::String(self.string()?),
            TYPE_OPAQUE => Value::Opaque(self.bytes()?.to_vec()),
            other => return Err(CodecError::UnknownType(other)),
        })
    }

    fn attributes(&mut self) -> Result<Attributes, CodecError> {
        let count = self.length()?;
        let mut attributes = Attributes::new();
        for _ in 0..count {
            let name = self.string()?;
            let value = self.value()?;
            attributes.set(name, value)?;
        }
        Ok(attributes)
    }

    fn long_array(&mut self) -> Result<Vec<i64>, CodecError> {
        let count = self.length()?;
        self.check_remaining(count.saturating_mul(8))?;
        (0..count).map(|_| self.i64()).collect()
    }

    /// Read a key set, which must be empty
    fn skip_keys(&mut self) -> Result<(), CodecError> {
        match self.length()? {
            0 => Ok(()),
            schemes => Err(CodecError::UnsupportedKeys(schemes)),
        }
    }

    fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            left => Err(CodecError::TrailingBytes(left)),
        }
    }
}
