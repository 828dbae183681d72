//! The proto3 JSON mapping.
//!
//! Messages convert to and from JSON text with [`to_json`] / [`from_json`],
//! or to and from a [`serde_json::Value`] tree with [`to_value`] /
//! [`from_value`]. Field names emit in a configurable casing; parsing
//! accepts both the lowerCamelCase and the declared snake_case names. The
//! well-known `google.protobuf` types take their mandated special shapes.

mod de;
mod ser;

use serde::Serialize;

use crate::descriptor::{Cardinality, FieldDescriptor, MessageDescriptor, ProtoType};
use crate::error::JsonError;
use crate::message::DynamicMessage;

/// Whether the field holds a `google.protobuf.Value`, for which JSON `null`
/// is a value rather than an absence marker.
fn is_json_value_field(field: &FieldDescriptor) -> bool {
    field.cardinality() == Cardinality::Singular
        && field.proto_type() == ProtoType::Message
        && field
            .message_descriptor()
            .is_some_and(|descriptor| descriptor.full_name() == "google.protobuf.Value")
}

/// The identifier style used for emitted field names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Casing {
    /// lowerCamelCase, the canonical proto3 JSON style.
    #[default]
    Camel,
    /// snake_case.
    Snake,
    /// UpperCamelCase.
    Pascal,
    /// The names exactly as declared in the schema.
    Original,
}

/// Options controlling JSON emission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct JsonOptions {
    pub casing: Casing,
    /// Emit fields holding their default value instead of omitting them.
    /// Inactive oneof members and absent sub-messages still emit as absent
    /// and `null` respectively, so parsing the output reconstructs the
    /// instance.
    pub include_default_values: bool,
    /// Pretty-print with the given indent width.
    pub indent: Option<usize>,
}

impl JsonOptions {
    pub fn new() -> JsonOptions {
        JsonOptions::default()
    }

    pub fn casing(mut self, casing: Casing) -> JsonOptions {
        self.casing = casing;
        self
    }

    pub fn include_default_values(mut self, include: bool) -> JsonOptions {
        self.include_default_values = include;
        self
    }

    pub fn indent(mut self, indent: usize) -> JsonOptions {
        self.indent = Some(indent);
        self
    }
}

/// Renders a message as JSON text.
pub fn to_json(message: &DynamicMessage, options: &JsonOptions) -> Result<String, JsonError> {
    let value = ser::message_to_json(message, options)?;
    match options.indent {
        None => Ok(serde_json::to_string(&value)?),
        Some(indent) => {
            let indent = vec![b' '; indent];
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            value.serialize(&mut serializer)?;
            Ok(String::from_utf8(out).expect("serde_json emits UTF-8"))
        }
    }
}

/// Renders a message as a [`serde_json::Value`] tree (the "dict" form).
pub fn to_value(
    message: &DynamicMessage,
    options: &JsonOptions,
) -> Result<serde_json::Value, JsonError> {
    ser::message_to_json(message, options)
}

/// Parses a message from JSON text.
pub fn from_json(
    descriptor: &'static MessageDescriptor,
    json: &str,
) -> Result<DynamicMessage, JsonError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    de::message_from_json(descriptor, &value)
}

/// Parses a message from a [`serde_json::Value`] tree.
pub fn from_value(
    descriptor: &'static MessageDescriptor,
    value: &serde_json::Value,
) -> Result<DynamicMessage, JsonError> {
    de::message_from_json(descriptor, value)
}
