use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DescriptorError, ValueError};

/// Wire type of a property, command or event payload.
///
/// Numeric payloads are little-endian. `String` is raw UTF-8 filling the rest
/// of the packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum Schema {
    None = 0,
    Byte = 1,
    Float = 2,
    Double = 3,
    Int = 4,
    Long = 5,
    Boolean = 6,
    String = 7,
}

impl Schema {
    /// Descriptor wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Encoded payload size, or `None` for variable-length strings.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Schema::None => Some(0),
            Schema::Byte | Schema::Boolean => Some(1),
            Schema::Float | Schema::Int => Some(4),
            Schema::Double | Schema::Long => Some(8),
            Schema::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Schema::None => "none",
            Schema::Byte => "byte",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Boolean => "boolean",
            Schema::String => "string",
        }
    }
}

impl TryFrom<u16> for Schema {
    type Error = DescriptorError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Schema::None,
            1 => Schema::Byte,
            2 => Schema::Float,
            3 => Schema::Double,
            4 => Schema::Int,
            5 => Schema::Long,
            6 => Schema::Boolean,
            7 => Schema::String,
            other => return Err(DescriptorError::UnknownSchema(other)),
        })
    }
}

impl FromStr for Schema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Schema::None),
            "byte" => Ok(Schema::Byte),
            "float" => Ok(Schema::Float),
            "double" => Ok(Schema::Double),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "boolean" | "bool" => Ok(Schema::Boolean),
            "string" => Ok(Schema::String),
            other => Err(format!("unknown schema: {other}")),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed payload value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Value of [`Schema::None`]: an empty payload.
    Unit,
    Byte(u8),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Boolean(bool),
    String(String),
}

impl Value {
    /// The schema this value encodes as.
    pub fn schema(&self) -> Schema {
        match self {
            Value::Unit => Schema::None,
            Value::Byte(_) => Schema::Byte,
            Value::Float(_) => Schema::Float,
            Value::Double(_) => Schema::Double,
            Value::Int(_) => Schema::Int,
            Value::Long(_) => Schema::Long,
            Value::Boolean(_) => Schema::Boolean,
            Value::String(_) => Schema::String,
        }
    }

    /// Fail unless this value has the `expected` schema.
    pub fn check_schema(&self, expected: Schema) -> Result<(), ValueError> {
        let actual = self.schema();
        if actual == expected {
            Ok(())
        } else {
            Err(ValueError::SchemaMismatch { expected, actual })
        }
    }

    /// Number of bytes [`Value::encode`] appends.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            other => other.schema().fixed_size().unwrap_or(0),
        }
    }

    /// Append the wire form of this value.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Value::Unit => {}
            Value::Byte(v) => dst.put_u8(*v),
            Value::Float(v) => dst.put_f32_le(*v),
            Value::Double(v) => dst.put_f64_le(*v),
            Value::Int(v) => dst.put_i32_le(*v),
            Value::Long(v) => dst.put_i64_le(*v),
            Value::Boolean(v) => dst.put_u8(u8::from(*v)),
            Value::String(s) => dst.put_slice(s.as_bytes()),
        }
    }

    /// Wire form of this value as an owned buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a payload according to `schema`.
    ///
    /// Fixed-size schemas require the exact byte count.
    pub fn decode(schema: Schema, payload: &[u8]) -> Result<Self, ValueError> {
        if let Some(expected) = schema.fixed_size() {
            if payload.len() != expected {
                return Err(ValueError::LengthMismatch {
                    schema,
                    expected,
                    actual: payload.len(),
                });
            }
        }

        Ok(match schema {
            Schema::None => Value::Unit,
            Schema::Byte => Value::Byte(payload[0]),
            Schema::Float => Value::Float(f32::from_le_bytes(fixed(payload))),
            Schema::Double => Value::Double(f64::from_le_bytes(fixed(payload))),
            Schema::Int => Value::Int(i32::from_le_bytes(fixed(payload))),
            Schema::Long => Value::Long(i64::from_le_bytes(fixed(payload))),
            Schema::Boolean => Value::Boolean(payload[0] != 0),
            Schema::String => Value::String(
                std::str::from_utf8(payload)
                    .map_err(|_| ValueError::InvalidUtf8)?
                    .to_string(),
            ),
        })
    }

    /// Parse the text form of a value (`"500"`, `"true"`, `"hello"`).
    pub fn parse(schema: Schema, input: &str) -> Result<Self, ValueError> {
        let err = || ValueError::Parse {
            schema,
            input: input.to_string(),
        };
        let trimmed = input.trim();

        Ok(match schema {
            Schema::None if trimmed.is_empty() => Value::Unit,
            Schema::None => return Err(err()),
            Schema::Byte => Value::Byte(trimmed.parse().map_err(|_| err())?),
            Schema::Float => Value::Float(trimmed.parse().map_err(|_| err())?),
            Schema::Double => Value::Double(trimmed.parse().map_err(|_| err())?),
            Schema::Int => Value::Int(trimmed.parse().map_err(|_| err())?),
            Schema::Long => Value::Long(trimmed.parse().map_err(|_| err())?),
            Schema::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Value::Boolean(true),
                "false" | "0" | "off" => Value::Boolean(false),
                _ => return Err(err()),
            },
            Schema::String => Value::String(input.to_string()),
        })
    }
}

// Callers have already checked the length.
fn fixed<const N: usize>(payload: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&payload[..N]);
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_codes_match_wire() {
        for code in 0u16..=7 {
            assert_eq!(Schema::try_from(code).unwrap().code(), code);
        }
        assert!(matches!(
            Schema::try_from(8),
            Err(DescriptorError::UnknownSchema(8))
        ));
    }

    #[test]
    fn float_is_four_bytes_little_endian() {
        let bytes = Value::Float(21.5).to_bytes();
        assert_eq!(bytes.as_ref(), &21.5f32.to_le_bytes());
        assert_eq!(Value::decode(Schema::Float, &bytes).unwrap(), Value::Float(21.5));
    }

    #[test]
    fn long_is_eight_bytes() {
        let bytes = Value::Long(-2).to_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(Value::decode(Schema::Long, &bytes).unwrap(), Value::Long(-2));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = Value::decode(Schema::Int, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            ValueError::LengthMismatch {
                schema: Schema::Int,
                expected: 4,
                actual: 3
            }
        );
        assert!(Value::decode(Schema::None, &[0]).is_err());
    }

    #[test]
    fn decode_string_requires_utf8() {
        assert_eq!(
            Value::decode(Schema::String, b"abc").unwrap(),
            Value::String("abc".into())
        );
        assert_eq!(
            Value::decode(Schema::String, &[0xFF, 0xFE]),
            Err(ValueError::InvalidUtf8)
        );
    }

    #[test]
    fn parse_text_forms() {
        assert_eq!(Value::parse(Schema::Float, "500").unwrap(), Value::Float(500.0));
        assert_eq!(Value::parse(Schema::Int, " -7 ").unwrap(), Value::Int(-7));
        assert_eq!(Value::parse(Schema::Boolean, "TRUE").unwrap(), Value::Boolean(true));
        assert_eq!(Value::parse(Schema::Boolean, "0").unwrap(), Value::Boolean(false));
        assert_eq!(Value::parse(Schema::None, "").unwrap(), Value::Unit);
        assert_eq!(
            Value::parse(Schema::String, " padded ").unwrap(),
            Value::String(" padded ".into())
        );
        assert!(matches!(
            Value::parse(Schema::Byte, "256"),
            Err(ValueError::Parse { .. })
        ));
    }

    #[test]
    fn display_is_parseable() {
        for value in [
            Value::Float(21.5),
            Value::Double(-0.25),
            Value::Int(42),
            Value::Long(1 << 40),
            Value::Boolean(true),
            Value::Byte(9),
        ] {
            let text = value.to_string();
            assert_eq!(Value::parse(value.schema(), &text).unwrap(), value);
        }
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let err = Value::Int(1).check_schema(Schema::Float).unwrap_err();
        assert_eq!(
            err,
            ValueError::SchemaMismatch {
                expected: Schema::Float,
                actual: Schema::Int
            }
        );
    }

    #[test]
    fn schema_from_str() {
        assert_eq!("Float".parse::<Schema>().unwrap(), Schema::Float);
        assert_eq!("bool".parse::<Schema>().unwrap(), Schema::Boolean);
        assert!("uuid".parse::<Schema>().is_err());
    }

    #[test]
    fn value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Value::Float(21.5)).unwrap(), "21.5");
        assert_eq!(serde_json::to_string(&Value::Unit).unwrap(), "null");
    }
}
