//! Message to JSON tree conversion.

use base64::prelude::*;
use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

use super::{Casing, JsonOptions};
use crate::descriptor::{Cardinality, FieldDescriptor, ProtoType};
use crate::error::JsonError;
use crate::message::DynamicMessage;
use crate::value::Value;
use crate::well_known::{self, Duration, Timestamp};

pub(crate) fn message_to_json(
    message: &DynamicMessage,
    options: &JsonOptions,
) -> Result<serde_json::Value, JsonError> {
    match message.descriptor().full_name() {
        "google.protobuf.Timestamp" => {
            if let Some(timestamp) = Timestamp::from_message(message) {
                return Ok(serde_json::Value::String(timestamp.to_string()));
            }
        }
        "google.protobuf.Duration" => {
            if let Some(duration) = Duration::from_message(message) {
                return Ok(serde_json::Value::String(duration.to_string()));
            }
        }
        "google.protobuf.Struct" => return Ok(well_known::struct_to_json(message)),
        "google.protobuf.Value" => return Ok(well_known::value_to_json(message)),
        "google.protobuf.ListValue" => return Ok(well_known::list_to_json(message)),
        "google.protobuf.Empty" => {
            return Ok(serde_json::Value::Object(serde_json::Map::new()))
        }
        "google.protobuf.FieldMask" => {
            if let Some(paths) = field_mask_paths(message) {
                return Ok(serde_json::Value::String(paths));
            }
        }
        full_name if well_known::is_wrapper(full_name) => {
            // A present wrapper is its bare inner scalar.
            if let Some(field) = message.descriptor().field_by_name("value") {
                return scalar_to_json(
                    field,
                    field.proto_type(),
                    &message.get_or_default("value"),
                    options,
                );
            }
        }
        _ => {}
    }

    object_to_json(message, options)
}

fn object_to_json(
    message: &DynamicMessage,
    options: &JsonOptions,
) -> Result<serde_json::Value, JsonError> {
    let mut object = serde_json::Map::new();

    for field in message.descriptor().fields() {
        match message.get(field.name()) {
            Some(value) => {
                object.insert(
                    json_field_name(field, options.casing),
                    field_to_json(field, value, options)?,
                );
            }
            None => {
                // Inactive oneof members never emit, so that parsing the
                // output reconstructs the group state. Absent Value fields
                // stay hidden too: `null` would read back as a present
                // null value.
                if !options.include_default_values
                    || field.oneof().is_some()
                    || super::is_json_value_field(field)
                {
                    continue;
                }
                object.insert(json_field_name(field, options.casing), default_json(field));
            }
        }
    }

    Ok(serde_json::Value::Object(object))
}

fn field_mask_paths(message: &DynamicMessage) -> Option<String> {
    message.descriptor().field_by_name("paths")?;
    let paths = match message.get("paths") {
        Some(Value::Repeated(paths)) => paths
            .iter()
            .map(|path| {
                // Casing converts per dot-separated segment, so nested
                // paths keep their structure.
                path.as_str()
                    .unwrap_or_default()
                    .split('.')
                    .map(|segment| segment.to_lower_camel_case())
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    };
    Some(paths)
}

fn json_field_name(field: &FieldDescriptor, casing: Casing) -> String {
    match casing {
        Casing::Camel => field.json_name().to_string(),
        Casing::Snake => field.name().to_snake_case(),
        Casing::Pascal => field.name().to_upper_camel_case(),
        Casing::Original => field.name().to_string(),
    }
}

fn field_to_json(
    field: &FieldDescriptor,
    value: &Value,
    options: &JsonOptions,
) -> Result<serde_json::Value, JsonError> {
    match (field.cardinality(), value) {
        (Cardinality::Singular, value) => {
            scalar_to_json(field, field.proto_type(), value, options)
        }
        (Cardinality::Repeated, Value::Repeated(values)) => {
            let items = values
                .iter()
                .map(|value| scalar_to_json(field, field.proto_type(), value, options))
                .collect::<Result<Vec<_>, JsonError>>()?;
            Ok(serde_json::Value::Array(items))
        }
        (Cardinality::Map, Value::Map(entries)) => {
            let value_type = field
                .map_value()
                .expect("validated map field has a value type");
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                object.insert(
                    key.to_string(),
                    scalar_to_json(field, value_type, value, options)?,
                );
            }
            Ok(serde_json::Value::Object(object))
        }
        _ => unreachable!("field values are kind-checked on assignment"),
    }
}

fn scalar_to_json(
    field: &FieldDescriptor,
    proto_type: ProtoType,
    value: &Value,
    options: &JsonOptions,
) -> Result<serde_json::Value, JsonError> {
    let json = match (proto_type, value) {
        (
            ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32,
            Value::Int32(value),
        ) => serde_json::Value::Number((*value).into()),
        (ProtoType::Uint32 | ProtoType::Fixed32, Value::Uint32(value)) => {
            serde_json::Value::Number((*value).into())
        }
        // 64-bit integers exceed the interoperable JSON number range, so
        // they emit as decimal strings.
        (
            ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64,
            Value::Int64(value),
        ) => serde_json::Value::String(value.to_string()),
        (ProtoType::Uint64 | ProtoType::Fixed64, Value::Uint64(value)) => {
            serde_json::Value::String(value.to_string())
        }
        (ProtoType::Bool, Value::Bool(value)) => serde_json::Value::Bool(*value),
        (ProtoType::Float, Value::Float(value)) => float32_to_json(*value),
        (ProtoType::Double, Value::Double(value)) => float64_to_json(*value),
        (ProtoType::String, Value::String(value)) => serde_json::Value::String(value.clone()),
        (ProtoType::Bytes, Value::Bytes(value)) => {
            serde_json::Value::String(BASE64_STANDARD.encode(value))
        }
        (ProtoType::Enum, Value::Enum(value)) => {
            match field.enum_descriptor().and_then(|d| d.name(*value)) {
                Some(name) => serde_json::Value::String(name.to_string()),
                // Unknown enum integers round-trip as integers.
                None => serde_json::Value::Number((*value).into()),
            }
        }
        (ProtoType::Message, Value::Message(message)) => message_to_json(message, options)?,
        _ => unreachable!("field values are kind-checked on assignment"),
    };
    Ok(json)
}

fn float32_to_json(value: f32) -> serde_json::Value {
    if value.is_nan() {
        serde_json::Value::String("NaN".to_string())
    } else if value.is_infinite() {
        let name = if value.is_sign_positive() {
            "Infinity"
        } else {
            "-Infinity"
        };
        serde_json::Value::String(name.to_string())
    } else {
        // Emit the shortest decimal form of the f32 rather than its f64
        // widening.
        value
            .to_string()
            .parse::<serde_json::Number>()
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn float64_to_json(value: f64) -> serde_json::Value {
    if value.is_nan() {
        serde_json::Value::String("NaN".to_string())
    } else if value.is_infinite() {
        let name = if value.is_sign_positive() {
            "Infinity"
        } else {
            "-Infinity"
        };
        serde_json::Value::String(name.to_string())
    } else {
        serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn default_json(field: &FieldDescriptor) -> serde_json::Value {
    match field.cardinality() {
        Cardinality::Repeated => serde_json::Value::Array(Vec::new()),
        Cardinality::Map => serde_json::Value::Object(serde_json::Map::new()),
        Cardinality::Singular => match field.proto_type() {
            ProtoType::Int32
            | ProtoType::Sint32
            | ProtoType::Sfixed32
            | ProtoType::Uint32
            | ProtoType::Fixed32 => serde_json::Value::Number(0.into()),
            ProtoType::Int64
            | ProtoType::Sint64
            | ProtoType::Sfixed64
            | ProtoType::Uint64
            | ProtoType::Fixed64 => serde_json::Value::String("0".to_string()),
            ProtoType::Bool => serde_json::Value::Bool(false),
            ProtoType::Float | ProtoType::Double => serde_json::Value::Number(0.into()),
            ProtoType::String | ProtoType::Bytes => serde_json::Value::String(String::new()),
            ProtoType::Enum => {
                let default = field.enum_descriptor().map_or(0, |d| d.default_number());
                match field.enum_descriptor().and_then(|d| d.name(default)) {
                    Some(name) => serde_json::Value::String(name.to_string()),
                    None => serde_json::Value::Number(default.into()),
                }
            }
            // Absent sub-messages (wrappers included) emit as null.
            ProtoType::Message => serde_json::Value::Null,
        },
    }
}
