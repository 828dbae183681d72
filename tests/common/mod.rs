//! Shared test descriptors, built the way generated code builds them.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::OnceLock;

use proptest::collection::{btree_map, vec};
use proptest::option;
use proptest::prelude::*;

use protodyn::well_known::{self, Duration, Timestamp};
use protodyn::{
    DynamicMessage, EnumDescriptor, FieldDescriptor, MapKey, MessageDescriptor, ProtoType, Value,
};

pub static COLOR: EnumDescriptor = EnumDescriptor {
    full_name: "test.Color",
    values: &[
        ("COLOR_UNSPECIFIED", 0),
        ("COLOR_RED", 1),
        ("COLOR_GREEN", 2),
    ],
};

pub fn color() -> &'static EnumDescriptor {
    &COLOR
}

/// `Greeting { string message = 1; }`
pub fn greeting() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Greeting",
            vec![FieldDescriptor::scalar(1, "message", ProtoType::String)],
        )
        .unwrap()
    })
}

/// `Switch { oneof foo { bool on = 1; int32 count = 2; } }`
pub fn switch() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Switch",
            vec![
                FieldDescriptor::scalar(1, "on", ProtoType::Bool).in_oneof("foo"),
                FieldDescriptor::scalar(2, "count", ProtoType::Int32).in_oneof("foo"),
            ],
        )
        .unwrap()
    })
}

/// `Inner { int32 value = 1; string label = 2; }`
pub fn inner() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Inner",
            vec![
                FieldDescriptor::scalar(1, "value", ProtoType::Int32),
                FieldDescriptor::scalar(2, "label", ProtoType::String),
            ],
        )
        .unwrap()
    })
}

/// A self-referential message for recursion-limit tests.
pub fn node() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Node",
            vec![
                FieldDescriptor::message(1, "child", node),
                FieldDescriptor::scalar(2, "id", ProtoType::Int32),
            ],
        )
        .unwrap()
    })
}

/// `Numbers { repeated uint32 values = 1; }`
pub fn numbers() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Numbers",
            vec![FieldDescriptor::scalar(1, "values", ProtoType::Uint32).repeated()],
        )
        .unwrap()
    })
}

/// `Tally { map<string, int32> entries = 1; }`
pub fn tally() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Tally",
            vec![FieldDescriptor::map(
                1,
                "entries",
                ProtoType::String,
                ProtoType::Int32,
            )],
        )
        .unwrap()
    })
}

/// A kitchen-sink message covering every proto type, repeated and packed
/// variants, maps, nesting, and a oneof.
pub fn everything() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Everything",
            vec![
                FieldDescriptor::scalar(1, "int32_field", ProtoType::Int32),
                FieldDescriptor::scalar(2, "int64_field", ProtoType::Int64),
                FieldDescriptor::scalar(3, "uint32_field", ProtoType::Uint32),
                FieldDescriptor::scalar(4, "uint64_field", ProtoType::Uint64),
                FieldDescriptor::scalar(5, "sint32_field", ProtoType::Sint32),
                FieldDescriptor::scalar(6, "sint64_field", ProtoType::Sint64),
                FieldDescriptor::scalar(7, "bool_field", ProtoType::Bool),
                FieldDescriptor::scalar(8, "fixed32_field", ProtoType::Fixed32),
                FieldDescriptor::scalar(9, "fixed64_field", ProtoType::Fixed64),
                FieldDescriptor::scalar(10, "sfixed32_field", ProtoType::Sfixed32),
                FieldDescriptor::scalar(11, "sfixed64_field", ProtoType::Sfixed64),
                FieldDescriptor::scalar(12, "float_field", ProtoType::Float),
                FieldDescriptor::scalar(13, "double_field", ProtoType::Double),
                FieldDescriptor::scalar(14, "string_field", ProtoType::String),
                FieldDescriptor::scalar(15, "bytes_field", ProtoType::Bytes),
                FieldDescriptor::enumeration(16, "color", color),
                FieldDescriptor::scalar(17, "repeated_uint32", ProtoType::Uint32).repeated(),
                FieldDescriptor::scalar(18, "repeated_string", ProtoType::String).repeated(),
                FieldDescriptor::scalar(19, "unpacked_sint64", ProtoType::Sint64)
                    .repeated()
                    .unpacked(),
                FieldDescriptor::map(20, "counts", ProtoType::String, ProtoType::Int32),
                FieldDescriptor::message(21, "nested", inner),
                FieldDescriptor::message(22, "children", inner).repeated(),
                FieldDescriptor::scalar(23, "choice_name", ProtoType::String).in_oneof("choice"),
                FieldDescriptor::message(24, "choice_inner", inner).in_oneof("choice"),
                FieldDescriptor::map(25, "scores", ProtoType::Int32, ProtoType::Double),
            ],
        )
        .unwrap()
    })
}

/// A message holding one of each special-cased well-known type.
pub fn event() -> &'static MessageDescriptor {
    static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        MessageDescriptor::new(
            "test.Event",
            vec![
                FieldDescriptor::message(1, "maybe", well_known::bool_value),
                FieldDescriptor::message(2, "ts", well_known::timestamp),
                FieldDescriptor::message(3, "duration", well_known::duration),
                FieldDescriptor::message(4, "meta", well_known::r#struct),
                FieldDescriptor::message(5, "extra", well_known::value),
                FieldDescriptor::message(6, "mask", well_known::field_mask),
                FieldDescriptor::message(7, "big", well_known::int64_value),
            ],
        )
        .unwrap()
    })
}

pub fn inner_message(value: i32, label: &str) -> DynamicMessage {
    let mut message = DynamicMessage::new(inner());
    message.set("value", Value::Int32(value));
    message.set("label", label);
    message
}

fn arb_inner() -> impl Strategy<Value = DynamicMessage> {
    (any::<i32>(), ".{0,8}").prop_map(|(value, label)| inner_message(value, &label))
}

/// A random `test.Everything` instance built through the public setters.
pub fn arb_everything() -> impl Strategy<Value = DynamicMessage> {
    let scalars = (
        (
            any::<i32>(),
            any::<i64>(),
            any::<u32>(),
            any::<u64>(),
            any::<i32>(),
            any::<i64>(),
        ),
        (
            any::<bool>(),
            any::<u32>(),
            any::<u64>(),
            any::<i32>(),
            any::<i64>(),
        ),
        (any::<f32>(), any::<f64>(), ".{0,12}", vec(any::<u8>(), 0..12)),
        any::<i32>(),
    );
    let collections = (
        vec(any::<u32>(), 0..8),
        vec(".{0,8}".prop_map(String::from), 0..4),
        vec(any::<i64>(), 0..8),
        btree_map(".{0,6}".prop_map(String::from), any::<i32>(), 0..4),
        btree_map(any::<i32>(), any::<f64>(), 0..4),
    );
    let messages = (
        option::of(arb_inner()),
        vec(arb_inner(), 0..3),
        option::of(prop_oneof![
            ".{0,8}".prop_map(Choice::Name),
            arb_inner().prop_map(Choice::Inner),
        ]),
    );

    (scalars, collections, messages).prop_map(|(scalars, collections, messages)| {
        let ((i32v, i64v, u32v, u64v, s32v, s64v), (bv, f32bits, f64bits, sf32v, sf64v), (fv, dv, sv, bytes), colorv) = scalars;
        let (rep_u32, rep_string, rep_s64, counts, scores) = collections;
        let (nested, children, choice) = messages;

        let mut message = DynamicMessage::new(everything());
        message.set("int32_field", Value::Int32(i32v));
        message.set("int64_field", Value::Int64(i64v));
        message.set("uint32_field", Value::Uint32(u32v));
        message.set("uint64_field", Value::Uint64(u64v));
        message.set("sint32_field", Value::Int32(s32v));
        message.set("sint64_field", Value::Int64(s64v));
        message.set("bool_field", Value::Bool(bv));
        message.set("fixed32_field", Value::Uint32(f32bits));
        message.set("fixed64_field", Value::Uint64(f64bits));
        message.set("sfixed32_field", Value::Int32(sf32v));
        message.set("sfixed64_field", Value::Int64(sf64v));
        message.set("float_field", Value::Float(fv));
        message.set("double_field", Value::Double(dv));
        message.set("string_field", sv);
        message.set("bytes_field", Value::Bytes(bytes.into()));
        message.set("color", Value::Enum(colorv));
        message.set(
            "repeated_uint32",
            Value::Repeated(rep_u32.into_iter().map(Value::Uint32).collect()),
        );
        message.set(
            "repeated_string",
            Value::Repeated(rep_string.into_iter().map(Value::String).collect()),
        );
        message.set(
            "unpacked_sint64",
            Value::Repeated(rep_s64.into_iter().map(Value::Int64).collect()),
        );
        message.set(
            "counts",
            Value::Map(
                counts
                    .into_iter()
                    .map(|(key, value)| (MapKey::String(key), Value::Int32(value)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        );
        message.set(
            "scores",
            Value::Map(
                scores
                    .into_iter()
                    .map(|(key, value)| (MapKey::Int32(key), Value::Double(value)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        );
        if let Some(nested) = nested {
            message.set("nested", nested);
        }
        if !children.is_empty() {
            message.set(
                "children",
                Value::Repeated(children.into_iter().map(Value::Message).collect()),
            );
        }
        match choice {
            Some(Choice::Name(name)) => message.set("choice_name", name),
            Some(Choice::Inner(inner)) => message.set("choice_inner", inner),
            None => {}
        }
        message
    })
}

#[derive(Debug, Clone)]
enum Choice {
    Name(String),
    Inner(DynamicMessage),
}

/// A random `test.Event` instance. Timestamps and durations are generated
/// pre-normalized, as the textual forms are canonical.
pub fn arb_event() -> impl Strategy<Value = DynamicMessage> {
    let arb_timestamp = (
        -62_135_596_800i64..253_402_300_800,
        0i32..1_000_000_000,
    )
        .prop_map(|(seconds, nanos)| Timestamp { seconds, nanos });
    let arb_duration = (-315_576_000_000i64..=315_576_000_000, 0i32..1_000_000_000).prop_map(
        |(seconds, nanos)| {
            let mut duration = Duration {
                seconds,
                nanos: if seconds < 0 { -nanos } else { nanos },
            };
            duration.normalize();
            duration
        },
    );

    (
        option::of(any::<bool>()),
        option::of(arb_timestamp),
        option::of(arb_duration),
        option::of(any::<i64>()),
    )
        .prop_map(|(maybe, ts, duration, big)| {
            let mut message = DynamicMessage::new(event());
            if let Some(maybe) = maybe {
                let mut wrapper = DynamicMessage::new(well_known::bool_value());
                wrapper.set("value", maybe);
                message.set("maybe", wrapper);
            }
            if let Some(ts) = ts {
                message.set("ts", ts.to_message());
            }
            if let Some(duration) = duration {
                message.set("duration", duration.to_message());
            }
            if let Some(big) = big {
                let mut wrapper = DynamicMessage::new(well_known::int64_value());
                wrapper.set("value", Value::Int64(big));
                message.set("big", wrapper);
            }
            message
        })
}
