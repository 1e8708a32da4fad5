use crate::value::Schema;

/// Errors raised while building or decoding a device descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// A declared length runs past the end of the buffer.
    #[error("truncated {field} at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A top-level block started with a tag other than the interface tag.
    #[error("unknown descriptor tag 0x{tag:02x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A schema code outside the known set.
    #[error("unknown schema code {0}")]
    UnknownSchema(u16),

    /// A string field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A string does not fit its length prefix.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A property, command or event was registered before any interface.
    #[error("no interface declared before {0}")]
    NoInterface(&'static str),

    /// Interface indices are a single byte on the wire.
    #[error("too many interfaces (max {max})")]
    TooManyInterfaces { max: usize },

    /// The encoded descriptor would not fit a single descriptor response.
    #[error("descriptor too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
}

/// Errors converting between typed values and their wire or text form.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The payload length does not match the fixed size of the schema.
    #[error("{schema} payload must be {expected} bytes, got {actual}")]
    LengthMismatch {
        schema: Schema,
        expected: usize,
        actual: usize,
    },

    /// A string payload is not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// Text could not be parsed as the schema's type.
    #[error("cannot parse {input:?} as {schema}")]
    Parse { schema: Schema, input: String },

    /// The value's type differs from the declared schema.
    #[error("expected {expected} value, got {actual}")]
    SchemaMismatch { expected: Schema, actual: Schema },

    /// A packet body ended before the name or payload it declared.
    #[error("malformed message body: {0}")]
    MalformedBody(&'static str),
}

pub type Result<T> = std::result::Result<T, DescriptorError>;
