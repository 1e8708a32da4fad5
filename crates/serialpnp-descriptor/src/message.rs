//! Bodies of property, command and event packets.
//!
//! ```text
//! InterfaceIndex:u8 NameLen:u8 Name:bytes[NameLen] Payload:bytes*
//! ```
//! The payload is the schema-encoded value and fills the rest of the body.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::ValueError;
use crate::value::{Schema, Value};

/// Result code carried in the reserved header byte of replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ResponseStatus {
    Ok = 0,
    /// No property or command with that name on that interface.
    NotFound = 1,
    /// The request payload did not decode with the declared schema.
    InvalidPayload = 2,
    /// Write to a property that is not writeable.
    ReadOnly = 3,
    /// The handler produced a value that does not match its schema.
    HandlerFault = 4,
}

impl ResponseStatus {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(ResponseStatus::Ok),
            1 => Some(ResponseStatus::NotFound),
            2 => Some(ResponseStatus::InvalidPayload),
            3 => Some(ResponseStatus::ReadOnly),
            4 => Some(ResponseStatus::HandlerFault),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == ResponseStatus::Ok
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResponseStatus::Ok => "ok",
            ResponseStatus::NotFound => "not found",
            ResponseStatus::InvalidPayload => "invalid payload",
            ResponseStatus::ReadOnly => "read-only",
            ResponseStatus::HandlerFault => "handler fault",
        })
    }
}

/// A `(interface, name, payload)` packet body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedValue {
    pub interface: u8,
    pub name: String,
    pub payload: Bytes,
}

impl NamedValue {
    /// Body carrying an encoded value.
    pub fn new(interface: u8, name: impl Into<String>, value: &Value) -> Self {
        Self {
            interface,
            name: name.into(),
            payload: value.to_bytes(),
        }
    }

    /// Body with no payload (property reads, not-found replies).
    pub fn empty(interface: u8, name: impl Into<String>) -> Self {
        Self {
            interface,
            name: name.into(),
            payload: Bytes::new(),
        }
    }

    /// Encode as a packet body. Names longer than 255 bytes are rejected.
    pub fn encode(&self) -> Result<Bytes, ValueError> {
        let name_len = u8::try_from(self.name.len())
            .map_err(|_| ValueError::MalformedBody("name longer than 255 bytes"))?;
        let mut body = BytesMut::with_capacity(2 + self.name.len() + self.payload.len());
        body.put_u8(self.interface);
        body.put_u8(name_len);
        body.put_slice(self.name.as_bytes());
        body.put_slice(&self.payload);
        Ok(body.freeze())
    }

    /// Decode a packet body.
    pub fn decode(body: &Bytes) -> Result<Self, ValueError> {
        if body.len() < 2 {
            return Err(ValueError::MalformedBody("missing interface or name length"));
        }
        let interface = body[0];
        let name_len = body[1] as usize;
        let name_end = 2 + name_len;
        if body.len() < name_end {
            return Err(ValueError::MalformedBody("name runs past end of body"));
        }
        let name = std::str::from_utf8(&body[2..name_end])
            .map_err(|_| ValueError::InvalidUtf8)?
            .to_string();
        Ok(Self {
            interface,
            name,
            payload: body.slice(name_end..),
        })
    }

    /// Decode the payload with `schema`.
    pub fn value(&self, schema: Schema) -> Result<Value, ValueError> {
        Value::decode(schema, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_layout() {
        let body = NamedValue::new(0, "sample_rate", &Value::Float(500.0))
            .encode()
            .unwrap();
        assert_eq!(body[0], 0);
        assert_eq!(body[1], 11);
        assert_eq!(&body[2..13], b"sample_rate");
        assert_eq!(&body[13..], &500.0f32.to_le_bytes());
    }

    #[test]
    fn decode_splits_name_and_payload() {
        let body = Bytes::from_static(&[2, 4, b't', b'e', b'm', b'p', 0, 0, 0xAC, 0x41]);
        let msg = NamedValue::decode(&body).unwrap();
        assert_eq!(msg.interface, 2);
        assert_eq!(msg.name, "temp");
        assert_eq!(msg.value(Schema::Float).unwrap(), Value::Float(21.5));
    }

    #[test]
    fn empty_payload_is_allowed() {
        let body = NamedValue::empty(0, "sample_rate").encode().unwrap();
        let msg = NamedValue::decode(&body).unwrap();
        assert!(msg.payload.is_empty());
        assert_eq!(msg.value(Schema::None).unwrap(), Value::Unit);
    }

    #[test]
    fn short_bodies_are_rejected() {
        assert!(NamedValue::decode(&Bytes::from_static(&[0])).is_err());
        assert!(NamedValue::decode(&Bytes::from_static(&[0, 5, b'a'])).is_err());
    }

    #[test]
    fn overlong_name_is_rejected() {
        let msg = NamedValue::empty(0, "n".repeat(256));
        assert!(matches!(msg.encode(), Err(ValueError::MalformedBody(_))));
    }

    #[test]
    fn status_codes() {
        for code in 0u8..=4 {
            assert_eq!(ResponseStatus::from_u8(code).unwrap().as_u8(), code);
        }
        assert_eq!(ResponseStatus::from_u8(9), None);
        assert!(ResponseStatus::Ok.is_ok());
        assert_eq!(ResponseStatus::ReadOnly.to_string(), "read-only");
    }
}
