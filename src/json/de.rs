//! JSON tree to message conversion.

use std::collections::BTreeMap;

use base64::prelude::*;
use heck::ToSnakeCase;

use crate::descriptor::{Cardinality, FieldDescriptor, MessageDescriptor, ProtoType};
use crate::error::JsonError;
use crate::message::DynamicMessage;
use crate::value::{MapKey, Value};
use crate::well_known::{self, Duration, Timestamp};

pub(crate) fn message_from_json(
    descriptor: &'static MessageDescriptor,
    json: &serde_json::Value,
) -> Result<DynamicMessage, JsonError> {
    let mut message = build_message(descriptor, json)?;
    message.mark_from_wire();
    Ok(message)
}

fn build_message(
    descriptor: &'static MessageDescriptor,
    json: &serde_json::Value,
) -> Result<DynamicMessage, JsonError> {
    match descriptor.full_name() {
        "google.protobuf.Timestamp" => {
            let text = expect_str(json, "an RFC 3339 timestamp string")?;
            let timestamp: Timestamp = text
                .parse()
                .map_err(|_| JsonError::value(format!("invalid timestamp: {:?}", text)))?;
            return Ok(timestamp.to_message());
        }
        "google.protobuf.Duration" => {
            let text = expect_str(json, "a duration string")?;
            let duration: Duration = text
                .parse()
                .map_err(|_| JsonError::value(format!("invalid duration: {:?}", text)))?;
            return Ok(duration.to_message());
        }
        "google.protobuf.Struct" => {
            let entries = json
                .as_object()
                .ok_or_else(|| JsonError::parse("expected an object for Struct"))?;
            return Ok(well_known::json_to_struct(entries));
        }
        "google.protobuf.Value" => return Ok(well_known::json_to_value(json)),
        "google.protobuf.ListValue" => {
            let items = json
                .as_array()
                .ok_or_else(|| JsonError::parse("expected an array for ListValue"))?;
            return Ok(well_known::json_to_list(items));
        }
        "google.protobuf.FieldMask" => {
            let text = expect_str(json, "a comma-separated path string")?;
            let mut message = DynamicMessage::new(descriptor);
            if !text.is_empty() && descriptor.field_by_name("paths").is_some() {
                let paths: Vec<Value> = text
                    .split(',')
                    .map(|path| {
                        // Casing converts per dot-separated segment.
                        let path = path
                            .split('.')
                            .map(|segment| segment.to_snake_case())
                            .collect::<Vec<_>>()
                            .join(".");
                        Value::String(path)
                    })
                    .collect();
                message.set("paths", Value::Repeated(paths));
            }
            return Ok(message);
        }
        full_name if well_known::is_wrapper(full_name) => {
            let mut message = DynamicMessage::new(descriptor);
            if let Some(field) = descriptor.field_by_name("value") {
                let value = scalar_from_json(field, field.proto_type(), json)?;
                message.set(field.name(), value);
            }
            return Ok(message);
        }
        _ => {}
    }

    let object = json.as_object().ok_or_else(|| {
        JsonError::parse(format!("expected an object for {}", descriptor.full_name()))
    })?;

    let mut message = DynamicMessage::new(descriptor);
    for (key, entry) in object {
        // Keys resolve through both the JSON and the declared name; keys
        // unknown to the descriptor are ignored.
        let Some(field) = descriptor.field_by_name(key) else {
            continue;
        };

        if entry.is_null() {
            // null reads as "field absent", except for a Value field where
            // null is itself a value.
            if super::is_json_value_field(field) {
                message.set(field.name(), Value::Message(well_known::json_to_value(entry)));
            }
            continue;
        }

        let value = field_from_json(field, entry)?;
        message.set(field.name(), value);
    }

    Ok(message)
}

fn field_from_json(field: &FieldDescriptor, json: &serde_json::Value) -> Result<Value, JsonError> {
    match field.cardinality() {
        Cardinality::Singular => scalar_from_json(field, field.proto_type(), json),
        Cardinality::Repeated => {
            let items = json.as_array().ok_or_else(|| {
                JsonError::parse(format!("expected an array for field `{}`", field.name()))
            })?;
            let values = items
                .iter()
                .map(|item| scalar_from_json(field, field.proto_type(), item))
                .collect::<Result<Vec<_>, JsonError>>()?;
            Ok(Value::Repeated(values))
        }
        Cardinality::Map => {
            let object = json.as_object().ok_or_else(|| {
                JsonError::parse(format!("expected an object for field `{}`", field.name()))
            })?;
            let key_type = field.map_key().expect("validated map field has a key type");
            let value_type = field
                .map_value()
                .expect("validated map field has a value type");
            let mut entries = BTreeMap::new();
            for (key, value) in object {
                entries.insert(
                    map_key_from_str(key_type, key)?,
                    scalar_from_json(field, value_type, value)?,
                );
            }
            Ok(Value::Map(entries))
        }
    }
}

fn scalar_from_json(
    field: &FieldDescriptor,
    proto_type: ProtoType,
    json: &serde_json::Value,
) -> Result<Value, JsonError> {
    match proto_type {
        ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 => {
            let value = json_to_i64(json)?;
            i32::try_from(value)
                .map(Value::Int32)
                .map_err(|_| JsonError::value(format!("{} out of range for a 32-bit integer", value)))
        }
        ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64 => {
            json_to_i64(json).map(Value::Int64)
        }
        ProtoType::Uint32 | ProtoType::Fixed32 => {
            let value = json_to_u64(json)?;
            u32::try_from(value)
                .map(Value::Uint32)
                .map_err(|_| {
                    JsonError::value(format!("{} out of range for a 32-bit unsigned integer", value))
                })
        }
        ProtoType::Uint64 | ProtoType::Fixed64 => json_to_u64(json).map(Value::Uint64),
        ProtoType::Bool => json
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| JsonError::parse("expected a boolean")),
        ProtoType::Float => {
            let value = json_to_f64(json)?;
            let narrowed = value as f32;
            if value.is_finite() && narrowed.is_infinite() {
                return Err(JsonError::value(format!("{} out of range for a float", value)));
            }
            Ok(Value::Float(narrowed))
        }
        ProtoType::Double => json_to_f64(json).map(Value::Double),
        ProtoType::String => Ok(Value::String(expect_str(json, "a string")?.to_string())),
        ProtoType::Bytes => {
            let text = expect_str(json, "a base64 string")?;
            decode_base64(text).map(|data| Value::Bytes(data.into()))
        }
        ProtoType::Enum => enum_from_json(field, json),
        ProtoType::Message => {
            let descriptor = field
                .message_descriptor()
                .expect("validated descriptor has a message type");
            Ok(Value::Message(message_from_json(descriptor, json)?))
        }
    }
}

fn enum_from_json(field: &FieldDescriptor, json: &serde_json::Value) -> Result<Value, JsonError> {
    match json {
        serde_json::Value::String(name) => field
            .enum_descriptor()
            .and_then(|descriptor| descriptor.number(name))
            .map(Value::Enum)
            .ok_or_else(|| JsonError::value(format!("unknown enum value name {:?}", name))),
        serde_json::Value::Number(_) => {
            // Integers are accepted whether or not they carry a declared
            // name; unknown values are preserved.
            let value = json_to_i64(json)?;
            i32::try_from(value)
                .map(Value::Enum)
                .map_err(|_| JsonError::value(format!("{} out of range for an enum", value)))
        }
        _ => Err(JsonError::parse("expected an enum name or integer")),
    }
}

fn map_key_from_str(key_type: ProtoType, key: &str) -> Result<MapKey, JsonError> {
    let parsed = match key_type {
        ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 => {
            key.parse().map(MapKey::Int32).ok()
        }
        ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64 => {
            key.parse().map(MapKey::Int64).ok()
        }
        ProtoType::Uint32 | ProtoType::Fixed32 => key.parse().map(MapKey::Uint32).ok(),
        ProtoType::Uint64 | ProtoType::Fixed64 => key.parse().map(MapKey::Uint64).ok(),
        ProtoType::Bool => match key {
            "true" => Some(MapKey::Bool(true)),
            "false" => Some(MapKey::Bool(false)),
            _ => None,
        },
        _ => Some(MapKey::String(key.to_string())),
    };
    parsed.ok_or_else(|| JsonError::value(format!("invalid map key {:?}", key)))
}

fn expect_str<'j>(json: &'j serde_json::Value, expected: &str) -> Result<&'j str, JsonError> {
    json.as_str()
        .ok_or_else(|| JsonError::parse(format!("expected {}", expected)))
}

fn decode_base64(text: &str) -> Result<Vec<u8>, JsonError> {
    // Standard alphabet first, then the URL-safe variant, with and without
    // padding.
    BASE64_STANDARD
        .decode(text)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(text))
        .or_else(|_| BASE64_URL_SAFE.decode(text))
        .or_else(|_| BASE64_URL_SAFE_NO_PAD.decode(text))
        .map_err(|_| JsonError::value(format!("invalid base64: {:?}", text)))
}

fn json_to_i64(json: &serde_json::Value) -> Result<i64, JsonError> {
    match json {
        serde_json::Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(value)
            } else if number.as_u64().is_some() {
                Err(JsonError::value(format!(
                    "{} out of range for a 64-bit integer",
                    number
                )))
            } else {
                float_to_i64(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(text) => {
            if let Ok(value) = text.parse::<i64>() {
                Ok(value)
            } else if let Ok(value) = text.parse::<f64>() {
                float_to_i64(value)
            } else {
                Err(JsonError::value(format!("invalid integer string {:?}", text)))
            }
        }
        _ => Err(JsonError::parse("expected a number or decimal string")),
    }
}

fn float_to_i64(value: f64) -> Result<i64, JsonError> {
    if value.fract() == 0.0 && value >= -(2f64.powi(63)) && value < 2f64.powi(63) {
        Ok(value as i64)
    } else {
        Err(JsonError::value(format!(
            "{} is not a 64-bit integer",
            value
        )))
    }
}

fn json_to_u64(json: &serde_json::Value) -> Result<u64, JsonError> {
    match json {
        serde_json::Value::Number(number) => {
            if let Some(value) = number.as_u64() {
                Ok(value)
            } else if number.as_i64().is_some() {
                Err(JsonError::value(format!(
                    "{} out of range for an unsigned integer",
                    number
                )))
            } else {
                float_to_u64(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(text) => {
            if let Ok(value) = text.parse::<u64>() {
                Ok(value)
            } else if let Ok(value) = text.parse::<f64>() {
                float_to_u64(value)
            } else {
                Err(JsonError::value(format!("invalid integer string {:?}", text)))
            }
        }
        _ => Err(JsonError::parse("expected a number or decimal string")),
    }
}

fn float_to_u64(value: f64) -> Result<u64, JsonError> {
    if value.fract() == 0.0 && value >= 0.0 && value < 2f64.powi(64) {
        Ok(value as u64)
    } else {
        Err(JsonError::value(format!(
            "{} is not a 64-bit unsigned integer",
            value
        )))
    }
}

fn json_to_f64(json: &serde_json::Value) -> Result<f64, JsonError> {
    match json {
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| JsonError::value(format!("{} is not representable as a double", number))),
        serde_json::Value::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => text
                .parse()
                .map_err(|_| JsonError::value(format!("invalid number string {:?}", text))),
        },
        _ => Err(JsonError::parse("expected a number or numeric string")),
    }
}
