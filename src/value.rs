//! The dynamic value domains message fields are stored in.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::descriptor::{Cardinality, FieldDescriptor, ProtoType};
use crate::message::DynamicMessage;

/// A single field value.
///
/// The `sint*`, `fixed*` and `sfixed*` proto types share the plain integer
/// domains; the field descriptor decides the wire transform.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Bytes),
    /// An enum value. Unknown integers are accepted and preserved.
    Enum(i32),
    Message(DynamicMessage),
    Repeated(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    /// The value a freshly constructed message reads for the field.
    ///
    /// For singular sub-message fields this is an empty instance; note that
    /// such fields are *absent* until assigned, so the codecs never consult
    /// this default for them.
    pub fn default_of(field: &FieldDescriptor) -> Value {
        match field.cardinality() {
            Cardinality::Repeated => Value::Repeated(Vec::new()),
            Cardinality::Map => Value::Map(BTreeMap::new()),
            Cardinality::Singular => Value::default_of_type(field, field.proto_type()),
        }
    }

    pub(crate) fn default_of_type(field: &FieldDescriptor, proto_type: ProtoType) -> Value {
        match proto_type {
            ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 => Value::Int32(0),
            ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64 => Value::Int64(0),
            ProtoType::Uint32 | ProtoType::Fixed32 => Value::Uint32(0),
            ProtoType::Uint64 | ProtoType::Fixed64 => Value::Uint64(0),
            ProtoType::Bool => Value::Bool(false),
            ProtoType::Float => Value::Float(0.0),
            ProtoType::Double => Value::Double(0.0),
            ProtoType::String => Value::String(String::new()),
            ProtoType::Bytes => Value::Bytes(Bytes::new()),
            ProtoType::Enum => Value::Enum(
                field
                    .enum_descriptor()
                    .map_or(0, |descriptor| descriptor.default_number()),
            ),
            ProtoType::Message => {
                let descriptor = field
                    .message_descriptor()
                    .expect("validated descriptor has a message type");
                Value::Message(DynamicMessage::new(descriptor))
            }
        }
    }

    /// Whether the value equals the field's default, and so is elided from
    /// the wire and the JSON object.
    ///
    /// Sub-message values are never default: presence is meaningful.
    pub fn is_default(&self, field: &FieldDescriptor) -> bool {
        match self {
            Value::Int32(value) => *value == 0,
            Value::Int64(value) => *value == 0,
            Value::Uint32(value) => *value == 0,
            Value::Uint64(value) => *value == 0,
            Value::Bool(value) => !value,
            Value::Float(value) => *value == 0.0,
            Value::Double(value) => *value == 0.0,
            Value::String(value) => value.is_empty(),
            Value::Bytes(value) => value.is_empty(),
            Value::Enum(value) => {
                *value == field.enum_descriptor().map_or(0, |d| d.default_number())
            }
            Value::Message(_) => false,
            Value::Repeated(values) => values.is_empty(),
            Value::Map(entries) => entries.is_empty(),
        }
    }

    /// Whether the value is storable in the field.
    pub(crate) fn is_valid_for(&self, field: &FieldDescriptor) -> bool {
        match field.cardinality() {
            Cardinality::Singular => self.is_valid_scalar(field, field.proto_type()),
            Cardinality::Repeated => match self {
                Value::Repeated(values) => values
                    .iter()
                    .all(|value| value.is_valid_scalar(field, field.proto_type())),
                _ => false,
            },
            Cardinality::Map => match self {
                Value::Map(entries) => {
                    let Some(key_type) = field.map_key() else {
                        return false;
                    };
                    let Some(value_type) = field.map_value() else {
                        return false;
                    };
                    entries.iter().all(|(key, value)| {
                        key.is_valid_for(key_type) && value.is_valid_scalar(field, value_type)
                    })
                }
                _ => false,
            },
        }
    }

    fn is_valid_scalar(&self, field: &FieldDescriptor, proto_type: ProtoType) -> bool {
        match (proto_type, self) {
            (ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32, Value::Int32(_)) => true,
            (ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64, Value::Int64(_)) => true,
            (ProtoType::Uint32 | ProtoType::Fixed32, Value::Uint32(_)) => true,
            (ProtoType::Uint64 | ProtoType::Fixed64, Value::Uint64(_)) => true,
            (ProtoType::Bool, Value::Bool(_)) => true,
            (ProtoType::Float, Value::Float(_)) => true,
            (ProtoType::Double, Value::Double(_)) => true,
            (ProtoType::String, Value::String(_)) => true,
            (ProtoType::Bytes, Value::Bytes(_)) => true,
            (ProtoType::Enum, Value::Enum(_)) => true,
            (ProtoType::Message, Value::Message(message)) => field
                .message_descriptor()
                .is_some_and(|descriptor| std::ptr::eq(message.descriptor(), descriptor)),
            _ => false,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Uint32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            Value::Enum(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_repeated(&self) -> Option<&[Value]> {
        match self {
            Value::Repeated(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<DynamicMessage> for Value {
    fn from(value: DynamicMessage) -> Value {
        Value::Message(value)
    }
}

/// A map field key. Key types are restricted to the integral, bool, and
/// string proto types.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
}

impl MapKey {
    pub(crate) fn default_of(proto_type: ProtoType) -> MapKey {
        match proto_type {
            ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 => MapKey::Int32(0),
            ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64 => MapKey::Int64(0),
            ProtoType::Uint32 | ProtoType::Fixed32 => MapKey::Uint32(0),
            ProtoType::Uint64 | ProtoType::Fixed64 => MapKey::Uint64(0),
            ProtoType::Bool => MapKey::Bool(false),
            _ => MapKey::String(String::new()),
        }
    }

    pub(crate) fn is_default(&self) -> bool {
        match self {
            MapKey::Int32(value) => *value == 0,
            MapKey::Int64(value) => *value == 0,
            MapKey::Uint32(value) => *value == 0,
            MapKey::Uint64(value) => *value == 0,
            MapKey::Bool(value) => !value,
            MapKey::String(value) => value.is_empty(),
        }
    }

    pub(crate) fn is_valid_for(&self, proto_type: ProtoType) -> bool {
        matches!(
            (proto_type, self),
            (
                ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32,
                MapKey::Int32(_)
            ) | (
                ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64,
                MapKey::Int64(_)
            ) | (ProtoType::Uint32 | ProtoType::Fixed32, MapKey::Uint32(_))
                | (ProtoType::Uint64 | ProtoType::Fixed64, MapKey::Uint64(_))
                | (ProtoType::Bool, MapKey::Bool(_))
                | (ProtoType::String, MapKey::String(_))
        )
    }
}

impl fmt::Display for MapKey {
    /// The JSON object key form: decimal for integers, `true`/`false` for
    /// bool, the string itself for strings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int32(value) => write!(f, "{}", value),
            MapKey::Int64(value) => write!(f, "{}", value),
            MapKey::Uint32(value) => write!(f, "{}", value),
            MapKey::Uint64(value) => write!(f, "{}", value),
            MapKey::Bool(value) => write!(f, "{}", value),
            MapKey::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> MapKey {
        MapKey::String(value.to_string())
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> MapKey {
        MapKey::String(value)
    }
}
