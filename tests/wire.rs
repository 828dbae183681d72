//! Wire-format behavior of the dynamic codec.

mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use common::{everything, greeting, inner_message, node, numbers, switch, tally};
use protodyn::encoding::{encode_key, encode_varint, WireType};
use protodyn::{DecodeErrorKind, DynamicMessage, MapKey, Value};

#[test]
fn greeting_wire_format() {
    let mut message = DynamicMessage::new(greeting());
    message.set("message", "Hey!");

    let bytes = message.encode_to_vec();
    assert_eq!(bytes, [0x0A, 0x04, 0x48, 0x65, 0x79, 0x21]);

    let decoded = DynamicMessage::parse(greeting(), &bytes[..]).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn oneof_wire_format_and_exclusivity() {
    let mut message = DynamicMessage::new(switch());
    message.set("on", true);
    assert_eq!(message.encode_to_vec(), [0x08, 0x01]);
    assert_eq!(
        message.which_oneof("foo"),
        Some(("on", &Value::Bool(true)))
    );

    message.set("count", Value::Int32(57));
    assert_eq!(message.encode_to_vec(), [0x10, 0x39]);
    assert_eq!(
        message.which_oneof("foo"),
        Some(("count", &Value::Int32(57)))
    );
    // The displaced member reads as its zero value.
    assert_eq!(message.get_or_default("on"), Value::Bool(false));
    assert!(!message.has("on"));
}

#[test]
fn oneof_member_at_default_still_emits() {
    let mut message = DynamicMessage::new(switch());
    message.set("count", Value::Int32(0));

    // Set-ness must survive the wire even though the value is the default.
    let bytes = message.encode_to_vec();
    assert_eq!(bytes, [0x10, 0x00]);

    let decoded = DynamicMessage::parse(switch(), &bytes[..]).unwrap();
    assert_eq!(decoded.which_oneof("foo"), Some(("count", &Value::Int32(0))));
    assert_eq!(decoded, message);
}

#[test]
fn oneof_last_wins_across_members() {
    // on = true, then count = 57.
    let bytes = [0x08, 0x01, 0x10, 0x39];
    let message = DynamicMessage::parse(switch(), &bytes[..]).unwrap();
    assert_eq!(
        message.which_oneof("foo"),
        Some(("count", &Value::Int32(57)))
    );
    assert_eq!(message.get_or_default("on"), Value::Bool(false));
}

#[test]
fn packed_and_unpacked_forms_parse_alike() {
    let mut message = DynamicMessage::new(numbers());
    message.set(
        "values",
        Value::Repeated(vec![
            Value::Uint32(1),
            Value::Uint32(300),
            Value::Uint32(128),
        ]),
    );

    let packed = message.encode_to_vec();
    assert_eq!(packed, [0x0A, 0x04, 0x01, 0xAC, 0x02, 0x80, 0x01]);

    let unpacked = [0x08, 0x01, 0x08, 0xAC, 0x02, 0x08, 0x80, 0x01];
    assert_eq!(DynamicMessage::parse(numbers(), &packed[..]).unwrap(), message);
    assert_eq!(
        DynamicMessage::parse(numbers(), &unpacked[..]).unwrap(),
        message
    );

    // Interleaved runs concatenate.
    let mixed = [0x0A, 0x01, 0x01, 0x08, 0xAC, 0x02, 0x0A, 0x01, 0x80, 0x01];
    let mut expected = DynamicMessage::new(numbers());
    expected.set(
        "values",
        Value::Repeated(vec![
            Value::Uint32(1),
            Value::Uint32(300),
            Value::Uint32(128),
        ]),
    );
    assert_eq!(
        DynamicMessage::parse(numbers(), &mixed[..]).unwrap(),
        expected
    );
}

#[test]
fn map_wire_format() {
    let mut message = DynamicMessage::new(tally());
    let mut entries = BTreeMap::new();
    entries.insert(MapKey::from("a"), Value::Int32(1));
    entries.insert(MapKey::from("b"), Value::Int32(2));
    message.set("entries", Value::Map(entries));

    let bytes = message.encode_to_vec();
    assert_eq!(
        bytes,
        [
            0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01, // {"a": 1}
            0x0A, 0x05, 0x0A, 0x01, b'b', 0x10, 0x02, // {"b": 2}
        ]
    );
    assert_eq!(DynamicMessage::parse(tally(), &bytes[..]).unwrap(), message);

    // Entry order on the wire is immaterial.
    let reversed = [
        0x0A, 0x05, 0x0A, 0x01, b'b', 0x10, 0x02, 0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01,
    ];
    assert_eq!(
        DynamicMessage::parse(tally(), &reversed[..]).unwrap(),
        message
    );

    // A duplicated key takes the last value; absent key and value fields
    // default to zero.
    let duplicates = [
        0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x07, 0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x09,
        0x0A, 0x00, // {"": 0}
    ];
    let parsed = DynamicMessage::parse(tally(), &duplicates[..]).unwrap();
    let Some(Value::Map(parsed_entries)) = parsed.get("entries") else {
        panic!("map field missing");
    };
    assert_eq!(parsed_entries.get(&MapKey::from("a")), Some(&Value::Int32(9)));
    assert_eq!(parsed_entries.get(&MapKey::from("")), Some(&Value::Int32(0)));
}

#[test]
fn unknown_fields_are_preserved_verbatim() {
    // name = "x" plus unknown field 99 carrying varint 42.
    let mut bytes = Vec::new();
    encode_key(1, WireType::LengthDelimited, &mut bytes);
    encode_varint(1, &mut bytes);
    bytes.push(b'x');
    let known_len = bytes.len();
    encode_key(99, WireType::Varint, &mut bytes);
    encode_varint(42, &mut bytes);

    let message = DynamicMessage::parse(greeting(), &bytes[..]).unwrap();
    assert_eq!(message.get_or_default("message"), Value::String("x".to_string()));
    assert_eq!(message.unknown_fields().len(), 1);

    let reencoded = message.encode_to_vec();
    assert_eq!(reencoded, bytes);
    assert_eq!(&reencoded[known_len..], &bytes[known_len..]);
}

#[test]
fn unknown_fields_of_every_wire_type_roundtrip() {
    let mut bytes = Vec::new();
    encode_key(50, WireType::Varint, &mut bytes);
    encode_varint(300, &mut bytes);
    encode_key(51, WireType::SixtyFourBit, &mut bytes);
    bytes.extend_from_slice(&7u64.to_le_bytes());
    encode_key(52, WireType::LengthDelimited, &mut bytes);
    encode_varint(3, &mut bytes);
    bytes.extend_from_slice(b"abc");
    encode_key(53, WireType::ThirtyTwoBit, &mut bytes);
    bytes.extend_from_slice(&9u32.to_le_bytes());

    let message = DynamicMessage::parse(greeting(), &bytes[..]).unwrap();
    assert_eq!(message.unknown_fields().len(), 4);
    assert_eq!(message.encode_to_vec(), bytes);
}

#[test]
fn singular_message_occurrences_merge() {
    // nested = Inner{value: 3} ++ nested = Inner{label: "x"} merges into
    // Inner{value: 3, label: "x"}.
    let mut first = DynamicMessage::new(everything());
    first.set("nested", inner_message(3, ""));
    let mut second = DynamicMessage::new(everything());
    second.set("nested", inner_message(0, "x"));

    let mut bytes = first.encode_to_vec();
    bytes.extend_from_slice(&second.encode_to_vec());

    let merged = DynamicMessage::parse(everything(), &bytes[..]).unwrap();
    let mut expected = DynamicMessage::new(everything());
    expected.set("nested", inner_message(3, "x"));
    assert_eq!(merged, expected);
}

#[test]
fn merge_appends_repeated_and_overwrites_scalars() {
    let mut first = DynamicMessage::new(everything());
    first.set("int32_field", Value::Int32(5));
    first.set(
        "repeated_string",
        Value::Repeated(vec![Value::String("a".to_string())]),
    );

    let mut second = DynamicMessage::new(everything());
    second.set("int32_field", Value::Int32(9));
    second.set(
        "repeated_string",
        Value::Repeated(vec![Value::String("b".to_string())]),
    );

    let mut bytes = first.encode_to_vec();
    bytes.extend_from_slice(&second.encode_to_vec());
    let merged = DynamicMessage::parse(everything(), &bytes[..]).unwrap();

    assert_eq!(merged.get_or_default("int32_field"), Value::Int32(9));
    assert_eq!(
        merged.get_or_default("repeated_string"),
        Value::Repeated(vec![
            Value::String("a".to_string()),
            Value::String("b".to_string()),
        ])
    );
}

#[test]
fn oneof_message_member_replaces_other_member() {
    let mut first = DynamicMessage::new(everything());
    first.set("choice_name", "gone");
    let mut second = DynamicMessage::new(everything());
    second.set("choice_inner", inner_message(1, "kept"));

    let mut bytes = first.encode_to_vec();
    bytes.extend_from_slice(&second.encode_to_vec());
    let merged = DynamicMessage::parse(everything(), &bytes[..]).unwrap();

    assert_eq!(
        merged.which_oneof("choice").map(|(name, _)| name),
        Some("choice_inner")
    );
    assert_eq!(merged.get_or_default("choice_name"), Value::String(String::new()));
}

#[test]
fn fresh_instance_serializes_empty() {
    assert!(DynamicMessage::new(everything()).encode_to_vec().is_empty());
}

fn nested_node_bytes(depth: usize) -> Vec<u8> {
    // id = 1 at the innermost level, wrapped `depth` times in child = {...}.
    let mut payload = vec![0x10, 0x01];
    for _ in 0..depth {
        let mut outer = Vec::new();
        encode_key(1, WireType::LengthDelimited, &mut outer);
        encode_varint(payload.len() as u64, &mut outer);
        outer.extend_from_slice(&payload);
        payload = outer;
    }
    payload
}

#[test]
fn recursion_limit() {
    let shallow = nested_node_bytes(99);
    assert!(DynamicMessage::parse(node(), &shallow[..]).is_ok());

    let deep = nested_node_bytes(101);
    let err = DynamicMessage::parse(node(), &deep[..]).unwrap_err();
    assert_eq!(*err.kind(), DecodeErrorKind::RecursionLimit);

    // The bound is configurable per call.
    let medium = nested_node_bytes(50);
    assert!(DynamicMessage::parse_with_limit(node(), &medium[..], 60).is_ok());
    let err = DynamicMessage::parse_with_limit(node(), &medium[..], 40).unwrap_err();
    assert_eq!(*err.kind(), DecodeErrorKind::RecursionLimit);
}

#[test]
fn group_wire_types_are_rejected() {
    // Field 5, wire type 3 (start group).
    let bytes = [0x2B];
    let err = DynamicMessage::parse(greeting(), &bytes[..]).unwrap_err();
    assert_eq!(*err.kind(), DecodeErrorKind::UnsupportedWireType(3));
}

#[test]
fn truncated_packed_run() {
    let bytes = [0x0A, 0x04, 0x01, 0xAC];
    let err = DynamicMessage::parse(numbers(), &bytes[..]).unwrap_err();
    assert_eq!(*err.kind(), DecodeErrorKind::Truncated);
}

#[test]
fn parse_failure_discards_instance() {
    // The API returns an error, not a partially filled message.
    let bytes = [0x0A, 0x01, b'x', 0x08];
    assert!(DynamicMessage::parse(greeting(), &bytes[..]).is_err());
}

proptest! {
    #[test]
    fn roundtrip_wire(message in common::arb_everything()) {
        let bytes = message.encode_to_vec();
        prop_assert_eq!(bytes.len(), message.encoded_len());

        let decoded = DynamicMessage::parse(everything(), &bytes[..])
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert_eq!(&decoded, &message);

        // Serialization is idempotent across a parse.
        prop_assert_eq!(decoded.encode_to_vec(), bytes);
    }

    #[test]
    fn roundtrip_wire_events(message in common::arb_event()) {
        let bytes = message.encode_to_vec();
        prop_assert_eq!(bytes.len(), message.encoded_len());

        let decoded = DynamicMessage::parse(common::event(), &bytes[..])
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert_eq!(&decoded, &message);
    }

    #[test]
    fn packed_and_unpacked_agree(values in proptest::collection::vec(any::<u32>(), 0..16)) {
        let mut packed = Vec::new();
        if !values.is_empty() {
            encode_key(1, WireType::LengthDelimited, &mut packed);
            let len: usize = values
                .iter()
                .map(|&value| protodyn::encoding::encoded_len_varint(u64::from(value)))
                .sum();
            encode_varint(len as u64, &mut packed);
            for &value in &values {
                encode_varint(u64::from(value), &mut packed);
            }
        }

        let mut unpacked = Vec::new();
        for &value in &values {
            encode_key(1, WireType::Varint, &mut unpacked);
            encode_varint(u64::from(value), &mut unpacked);
        }

        let from_packed = DynamicMessage::parse(numbers(), &packed[..])
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        let from_unpacked = DynamicMessage::parse(numbers(), &unpacked[..])
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert_eq!(from_packed, from_unpacked);
    }

    #[test]
    fn unknown_payload_survives_reserialization(
        tag in 60u32..200,
        payload in proptest::collection::vec(any::<u8>(), 0..24),
    ) {
        let mut bytes = Vec::new();
        encode_key(1, WireType::LengthDelimited, &mut bytes);
        encode_varint(1, &mut bytes);
        bytes.push(b'x');
        encode_key(tag, WireType::LengthDelimited, &mut bytes);
        encode_varint(payload.len() as u64, &mut bytes);
        bytes.extend_from_slice(&payload);

        let message = DynamicMessage::parse(greeting(), &bytes[..])
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert_eq!(message.encode_to_vec(), bytes);
    }

    #[test]
    fn last_scalar_occurrence_wins(first in any::<i32>(), second in any::<i32>()) {
        let mut bytes = Vec::new();
        // int32_field twice in a row.
        encode_key(1, WireType::Varint, &mut bytes);
        encode_varint(first as u64, &mut bytes);
        encode_key(1, WireType::Varint, &mut bytes);
        encode_varint(second as u64, &mut bytes);

        let message = DynamicMessage::parse(everything(), &bytes[..])
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert_eq!(message.get_or_default("int32_field"), Value::Int32(second));
    }
}
