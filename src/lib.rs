//! A dynamic Protocol Buffers (proto3) runtime.
//!
//! Generated message types describe themselves with a static
//! [`MessageDescriptor`] and hold their data in a [`DynamicMessage`]. The
//! runtime provides the binary wire codec (including unknown-field
//! passthrough, packed repeated fields, oneof groups, and maps), the proto3
//! JSON mapping, and the well-known `google.protobuf` types.

pub use bytes;

mod descriptor;
mod error;
mod message;
mod unknown;
mod value;

pub mod encoding;
pub mod json;
pub mod well_known;

pub use crate::descriptor::{
    Cardinality, EnumDescriptor, EnumRef, FieldDescriptor, MessageDescriptor, MessageRef,
    ProtoType,
};
pub use crate::error::{
    DecodeError, DecodeErrorKind, DescriptorError, EncodeError, JsonError,
};
pub use crate::json::{from_json, from_value, to_json, to_value, Casing, JsonOptions};
pub use crate::message::DynamicMessage;
pub use crate::unknown::{UnknownFieldSet, UnknownValue};
pub use crate::value::{MapKey, Value};

// 100 is the default recursion limit in the C++ implementation.
const RECURSION_LIMIT: u32 = 100;
