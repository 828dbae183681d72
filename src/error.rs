//! Protobuf encoding, decoding, descriptor, and JSON mapping errors.

use core::fmt;

use crate::descriptor::ProtoType;
use crate::encoding::wire_type::WireType;

/// A protobuf message decoding error.
///
/// `DecodeError` indicates that the input buffer does not contain a valid
/// protobuf message. The error details should be considered 'best effort': in
/// general it is not possible to exactly pinpoint why data is malformed.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
}

impl DecodeError {
    /// Get details about the decode error.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }
}

/// The root cause of a [`DecodeError`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The input ended in the middle of a value.
    Truncated,
    /// A varint ran past ten bytes, or its tenth byte overflowed 64 bits.
    InvalidVarint,
    /// A field key did not fit into 32 bits.
    InvalidKey(u64),
    /// A field key carried field number zero.
    InvalidTag,
    /// A wire type outside the proto3 set {0, 1, 2, 5}.
    UnsupportedWireType(u64),
    /// A wire type inconsistent with the field's declared type.
    UnexpectedWireType {
        actual: WireType,
        expected: WireType,
    },
    /// A length-delimited payload ran past its delimiter.
    DelimitedLengthExceeded,
    /// A `string` field held bytes that are not valid UTF-8.
    InvalidUtf8,
    /// Nested messages exceeded the recursion limit.
    RecursionLimit,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Truncated => write!(f, "buffer underflow"),
            DecodeErrorKind::InvalidVarint => write!(f, "invalid varint"),
            DecodeErrorKind::InvalidKey(key) => write!(f, "invalid key value: {}", key),
            DecodeErrorKind::InvalidTag => write!(f, "invalid tag value: 0"),
            DecodeErrorKind::UnsupportedWireType(value) => {
                write!(f, "invalid wire type value: {}", value)
            }
            DecodeErrorKind::UnexpectedWireType { actual, expected } => {
                write!(f, "invalid wire type: {:?} (expected {:?})", actual, expected)
            }
            DecodeErrorKind::DelimitedLengthExceeded => write!(f, "delimited length exceeded"),
            DecodeErrorKind::InvalidUtf8 => {
                write!(f, "invalid string value: data is not UTF-8 encoded")
            }
            DecodeErrorKind::RecursionLimit => write!(f, "recursion limit reached"),
        }
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeError")
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode protobuf message: {}", self.kind)
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> Self {
        DecodeError { kind }
    }
}

impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, error)
    }
}

/// A protobuf message encoding error.
///
/// `EncodeError` always indicates that a message failed to encode because the
/// provided buffer had insufficient capacity. Message encoding is otherwise
/// infallible.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodeError {
    required: usize,
    remaining: usize,
}

impl EncodeError {
    pub(crate) fn new(required: usize, remaining: usize) -> EncodeError {
        EncodeError {
            required,
            remaining,
        }
    }

    /// Returns the required buffer capacity to encode the message.
    pub fn required_capacity(&self) -> usize {
        self.required
    }

    /// Returns the remaining length in the provided buffer at the time of encoding.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to encode protobuf message; insufficient buffer capacity (required: {}, remaining: {})",
            self.required, self.remaining
        )
    }
}

impl std::error::Error for EncodeError {}

impl From<EncodeError> for std::io::Error {
    fn from(error: EncodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, error)
    }
}

/// An invalid message descriptor.
///
/// Raised while building a [`MessageDescriptor`](crate::MessageDescriptor)
/// from the field records emitted by the code generator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptorError {
    /// A field number was used more than once.
    DuplicateFieldNumber(u32),
    /// A field name (original or JSON form) was used more than once.
    DuplicateFieldName(String),
    /// A field number of zero, or above the 29-bit tag limit.
    InvalidFieldNumber(u32),
    /// A field number in the reserved range 19000-19999.
    ReservedFieldNumber(u32),
    /// A map key type outside the integral/bool/string set.
    InvalidMapKeyType(ProtoType),
    /// A message-typed field without a message descriptor reference.
    MissingMessageType(u32),
    /// An enum-typed field without an enum descriptor reference.
    MissingEnumType(u32),
    /// A oneof group containing a repeated or map field.
    OneofNotSingular(u32),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::DuplicateFieldNumber(number) => {
                write!(f, "duplicate field number: {}", number)
            }
            DescriptorError::DuplicateFieldName(name) => {
                write!(f, "duplicate field name: {}", name)
            }
            DescriptorError::InvalidFieldNumber(number) => {
                write!(f, "invalid field number: {}", number)
            }
            DescriptorError::ReservedFieldNumber(number) => {
                write!(f, "field number {} is in the reserved range 19000-19999", number)
            }
            DescriptorError::InvalidMapKeyType(proto_type) => {
                write!(f, "invalid map key type: {:?}", proto_type)
            }
            DescriptorError::MissingMessageType(number) => {
                write!(f, "field {} has message type but no message descriptor", number)
            }
            DescriptorError::MissingEnumType(number) => {
                write!(f, "field {} has enum type but no enum descriptor", number)
            }
            DescriptorError::OneofNotSingular(number) => {
                write!(f, "oneof member {} must be a singular field", number)
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

/// A JSON mapping error.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum JsonError {
    /// Structurally invalid JSON, or a value of the wrong JSON kind for the
    /// target field.
    Parse(String),
    /// A well-formed JSON value outside the target field's domain.
    Value(String),
}

impl JsonError {
    pub(crate) fn parse(message: impl Into<String>) -> JsonError {
        JsonError::Parse(message.into())
    }

    pub(crate) fn value(message: impl Into<String>) -> JsonError {
        JsonError::Value(message.into())
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonError::Parse(message) => write!(f, "invalid JSON: {}", message),
            JsonError::Value(message) => write!(f, "invalid JSON value: {}", message),
        }
    }
}

impl std::error::Error for JsonError {}

impl From<serde_json::Error> for JsonError {
    fn from(error: serde_json::Error) -> Self {
        JsonError::Parse(error.to_string())
    }
}
