//! The dynamic message instance and its wire codec.

use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::descriptor::{Cardinality, FieldDescriptor, MessageDescriptor, ProtoType};
use crate::encoding::{
    self, check_wire_type, decode_varint, encode_key, encode_varint, encoded_len_varint,
    wire_type::WireType, DecodeContext,
};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError};
use crate::unknown::UnknownFieldSet;
use crate::value::{MapKey, Value};

/// A message instance described by a [`MessageDescriptor`].
///
/// Instances are born at their per-field defaults. Storage is canonical:
/// a singular scalar field outside a oneof is present iff its value differs
/// from the default, so instance equality coincides with proto3 value
/// equality. Oneof members and sub-messages keep explicit presence.
///
/// Equality compares the descriptor, the field values, and the unknown-field
/// bytes; whether an instance came from a parse does not participate.
#[derive(Clone)]
pub struct DynamicMessage {
    descriptor: &'static MessageDescriptor,
    fields: BTreeMap<u32, Value>,
    unknown: UnknownFieldSet,
    from_wire: bool,
}

impl DynamicMessage {
    /// Creates an instance with every field at its default value.
    pub fn new(descriptor: &'static MessageDescriptor) -> DynamicMessage {
        DynamicMessage {
            descriptor,
            fields: BTreeMap::new(),
            unknown: UnknownFieldSet::default(),
            from_wire: false,
        }
    }

    pub fn descriptor(&self) -> &'static MessageDescriptor {
        self.descriptor
    }

    /// Whether this instance was produced by a parse (wire or JSON) rather
    /// than constructed locally. Distinguishes "sub-message transmitted but
    /// empty" from "sub-message never assigned".
    pub fn is_from_wire(&self) -> bool {
        self.from_wire
    }

    pub(crate) fn mark_from_wire(&mut self) {
        self.from_wire = true;
    }

    /// The unknown fields captured by the last parse.
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    fn field_or_panic(&self, name: &str) -> &'static FieldDescriptor {
        let descriptor = self.descriptor;
        match descriptor.field_by_name(name) {
            Some(field) => field,
            None => panic!("{} has no field named `{}`", descriptor.full_name(), name),
        }
    }

    /// Whether the field is explicitly present.
    ///
    /// For singular scalars outside a oneof this means "holds a non-default
    /// value"; proto3 does not track scalar presence beyond that.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a field of this message.
    pub fn has(&self, name: &str) -> bool {
        let field = self.field_or_panic(name);
        self.fields.contains_key(&field.number())
    }

    /// The field's value, if explicitly present.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a field of this message.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let field = self.field_or_panic(name);
        self.fields.get(&field.number())
    }

    /// The field's value, or its default when absent. Absent sub-message
    /// fields read as an empty instance.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a field of this message.
    pub fn get_or_default(&self, name: &str) -> Value {
        let field = self.field_or_panic(name);
        self.fields
            .get(&field.number())
            .cloned()
            .unwrap_or_else(|| Value::default_of(field))
    }

    /// Assigns a field.
    ///
    /// Assigning a oneof member clears the other members of its group.
    /// Assigning a non-oneof scalar its default value clears the field.
    /// Assignment replaces; it never merges.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a field of this message, or if the value is
    /// of the wrong kind for the field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let field = self.field_or_panic(name);
        let value = value.into();
        assert!(
            value.is_valid_for(field),
            "value of the wrong kind for {}.{}",
            self.descriptor.full_name(),
            field.name(),
        );

        if let Some(group) = field.oneof() {
            self.clear_oneof_siblings(group, field.number());
            self.fields.insert(field.number(), value);
        } else if value.is_default(field) {
            self.fields.remove(&field.number());
        } else {
            self.fields.insert(field.number(), value);
        }
    }

    /// Resets a field to its default (for a oneof member: unsets the group
    /// if the member was active).
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a field of this message.
    pub fn clear_field(&mut self, name: &str) {
        let field = self.field_or_panic(name);
        self.fields.remove(&field.number());
    }

    /// The active member of a oneof group, with its value, or `None` when
    /// the group is unset.
    pub fn which_oneof<'m>(&'m self, group: &str) -> Option<(&'static str, &'m Value)> {
        self.descriptor
            .oneof_members(group)
            .find_map(|field| self.fields.get(&field.number()).map(|value| (field.name(), value)))
    }

    /// Resets every field to its default and drops unknown fields.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.unknown.clear();
        self.from_wire = false;
    }

    fn clear_oneof_siblings(&mut self, group: &str, keep: u32) {
        let siblings: Vec<u32> = self
            .descriptor
            .oneof_members(group)
            .map(FieldDescriptor::number)
            .filter(|&number| number != keep)
            .collect();
        for number in siblings {
            self.fields.remove(&number);
        }
    }

    // === Wire encoding ===

    /// Returns the encoded length of the message without a length delimiter.
    pub fn encoded_len(&self) -> usize {
        let known: usize = self
            .descriptor
            .fields()
            .iter()
            .filter_map(|field| {
                self.fields
                    .get(&field.number())
                    .map(|value| field_encoded_len(field, value))
            })
            .sum();
        known + self.unknown.encoded_len()
    }

    /// Encodes the message to a buffer.
    ///
    /// An error will be returned if the buffer does not have sufficient capacity.
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        let required = self.encoded_len();
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::new(required, remaining));
        }

        self.encode_raw(buf);
        Ok(())
    }

    /// Encodes the message to a newly allocated buffer.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_raw(&mut buf);
        buf
    }

    pub(crate) fn encode_raw(&self, buf: &mut impl BufMut) {
        // Known fields in declaration order, then unknown bytes in arrival
        // order.
        for field in self.descriptor.fields() {
            if let Some(value) = self.fields.get(&field.number()) {
                encode_field(field, value, buf);
            }
        }
        self.unknown.encode(buf);
    }

    // === Wire decoding ===

    /// Decodes an instance from a buffer. The entire buffer is consumed.
    pub fn parse(
        descriptor: &'static MessageDescriptor,
        buf: impl Buf,
    ) -> Result<DynamicMessage, DecodeError> {
        let mut message = DynamicMessage::new(descriptor);
        let mut buf = buf;
        message.merge_with_context(&mut buf, DecodeContext::default())?;
        Ok(message)
    }

    /// Like [`parse`](Self::parse), with a caller-chosen recursion bound in
    /// place of the default of 100.
    pub fn parse_with_limit(
        descriptor: &'static MessageDescriptor,
        buf: impl Buf,
        limit: u32,
    ) -> Result<DynamicMessage, DecodeError> {
        let mut message = DynamicMessage::new(descriptor);
        let mut buf = buf;
        message.merge_with_context(&mut buf, DecodeContext::with_limit(limit))?;
        Ok(message)
    }

    /// Decodes from a buffer and merges into `self`: scalars are
    /// overwritten, repeated fields and maps are appended to, sub-messages
    /// are merged recursively. The entire buffer is consumed.
    pub fn merge(&mut self, buf: impl Buf) -> Result<(), DecodeError> {
        let mut buf = buf;
        self.merge_with_context(&mut buf, DecodeContext::default())
    }

    fn merge_with_context(
        &mut self,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        while buf.has_remaining() {
            let (tag, wire_type) = encoding::decode_key(buf)?;
            self.merge_field(tag, wire_type, buf, ctx.clone())?;
        }
        self.from_wire = true;
        Ok(())
    }

    /// Merges a length-delimited message payload into `self`.
    fn merge_delimited(
        &mut self,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        ctx.limit_reached()?;
        let len = encoding::decode_length_delimiter(buf)?;
        let limit = buf.remaining() - len;

        while buf.remaining() > limit {
            let (tag, wire_type) = encoding::decode_key(buf)?;
            self.merge_field(tag, wire_type, buf, ctx.enter_recursion())?;
        }

        if buf.remaining() != limit {
            return Err(DecodeErrorKind::DelimitedLengthExceeded.into());
        }
        self.from_wire = true;
        Ok(())
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        let descriptor = self.descriptor;
        let Some(field) = descriptor.field(tag) else {
            return self.unknown.capture(tag, wire_type, buf);
        };

        match field.cardinality() {
            Cardinality::Singular => self.merge_singular(field, wire_type, buf, ctx),
            Cardinality::Repeated => self.merge_repeated(field, wire_type, buf, ctx),
            Cardinality::Map => self.merge_map_entry(field, wire_type, buf, ctx),
        }
    }

    fn merge_singular(
        &mut self,
        field: &'static FieldDescriptor,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        // Any arriving oneof member evicts its siblings before it is stored.
        if let Some(group) = field.oneof() {
            self.clear_oneof_siblings(group, field.number());
        }

        if field.proto_type() == ProtoType::Message {
            check_wire_type(WireType::LengthDelimited, wire_type)?;
            // A repeated occurrence of the same singular (or active-oneof)
            // sub-message field merges into the prior payload.
            if !matches!(self.fields.get(&field.number()), Some(Value::Message(_))) {
                self.fields.insert(
                    field.number(),
                    Value::Message(DynamicMessage::new(nested_descriptor(field))),
                );
            }
            let Some(Value::Message(message)) = self.fields.get_mut(&field.number()) else {
                unreachable!()
            };
            message.merge_delimited(buf, ctx)
        } else {
            check_wire_type(field.proto_type().wire_type(), wire_type)?;
            let value = decode_scalar_payload(field.proto_type(), buf)?;
            // Last occurrence wins. Storage stays canonical: a non-oneof
            // scalar decoded at its default clears any earlier occurrence.
            if field.oneof().is_some() || !value.is_default(field) {
                self.fields.insert(field.number(), value);
            } else {
                self.fields.remove(&field.number());
            }
            Ok(())
        }
    }

    fn merge_repeated(
        &mut self,
        field: &'static FieldDescriptor,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        let proto_type = field.proto_type();

        if proto_type == ProtoType::Message {
            check_wire_type(WireType::LengthDelimited, wire_type)?;
            let mut element = DynamicMessage::new(nested_descriptor(field));
            element.merge_delimited(buf, ctx)?;
            self.repeated_values(field).push(Value::Message(element));
            return Ok(());
        }

        if proto_type.is_packable() && wire_type == WireType::LengthDelimited {
            // Packed run; accepted regardless of the descriptor's packed flag.
            let len = encoding::decode_length_delimiter(buf)?;
            let limit = buf.remaining() - len;
            let mut decoded = Vec::new();
            while buf.remaining() > limit {
                decoded.push(decode_scalar_payload(proto_type, buf)?);
            }
            if buf.remaining() != limit {
                return Err(DecodeErrorKind::DelimitedLengthExceeded.into());
            }
            if !decoded.is_empty() {
                self.repeated_values(field).append(&mut decoded);
            }
            Ok(())
        } else {
            check_wire_type(proto_type.wire_type(), wire_type)?;
            let value = decode_scalar_payload(proto_type, buf)?;
            self.repeated_values(field).push(value);
            Ok(())
        }
    }

    fn merge_map_entry(
        &mut self,
        field: &'static FieldDescriptor,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        check_wire_type(WireType::LengthDelimited, wire_type)?;
        ctx.limit_reached()?;

        let key_type = field.map_key().expect("validated map field has a key type");
        let value_type = field
            .map_value()
            .expect("validated map field has a value type");

        // Key and value default to the zero of their type when absent from
        // the entry.
        let mut key = MapKey::default_of(key_type);
        let mut value = match value_type {
            ProtoType::Message => Value::Message(DynamicMessage::new(nested_descriptor(field))),
            _ => Value::default_of_type(field, value_type),
        };

        let len = encoding::decode_length_delimiter(buf)?;
        let limit = buf.remaining() - len;
        let entry_ctx = ctx.enter_recursion();

        while buf.remaining() > limit {
            let (tag, entry_wire_type) = encoding::decode_key(buf)?;
            match tag {
                1 => {
                    check_wire_type(key_type.wire_type(), entry_wire_type)?;
                    key = decode_map_key(key_type, buf)?;
                }
                2 => {
                    if value_type == ProtoType::Message {
                        check_wire_type(WireType::LengthDelimited, entry_wire_type)?;
                        if let Value::Message(message) = &mut value {
                            message.merge_delimited(buf, entry_ctx.clone())?;
                        }
                    } else {
                        check_wire_type(value_type.wire_type(), entry_wire_type)?;
                        value = decode_scalar_payload(value_type, buf)?;
                    }
                }
                _ => encoding::skip_field(entry_wire_type, buf)?,
            }
        }

        if buf.remaining() != limit {
            return Err(DecodeErrorKind::DelimitedLengthExceeded.into());
        }

        let entry = self
            .fields
            .entry(field.number())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if let Value::Map(entries) = entry {
            entries.insert(key, value);
        }
        Ok(())
    }

    fn repeated_values(&mut self, field: &FieldDescriptor) -> &mut Vec<Value> {
        let entry = self
            .fields
            .entry(field.number())
            .or_insert_with(|| Value::Repeated(Vec::new()));
        match entry {
            Value::Repeated(values) => values,
            _ => unreachable!("repeated field stored as a non-repeated value"),
        }
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &DynamicMessage) -> bool {
        std::ptr::eq(self.descriptor, other.descriptor)
            && self.fields == other.fields
            && self.unknown == other.unknown
    }
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.descriptor.full_name());
        for field in self.descriptor.fields() {
            if let Some(value) = self.fields.get(&field.number()) {
                debug.field(field.name(), value);
            }
        }
        if !self.unknown.is_empty() {
            debug.field("unknown", &self.unknown);
        }
        debug.finish()
    }
}

fn nested_descriptor(field: &FieldDescriptor) -> &'static MessageDescriptor {
    field
        .message_descriptor()
        .expect("validated descriptor has a message type")
}

// === Field encoding ===

fn encode_field(field: &FieldDescriptor, value: &Value, buf: &mut impl BufMut) {
    match (field.cardinality(), value) {
        (Cardinality::Singular, value) => {
            encode_single(field.proto_type(), field.number(), value, buf);
        }
        (Cardinality::Repeated, Value::Repeated(values)) => {
            if values.is_empty() {
                return;
            }
            let proto_type = field.proto_type();
            if field.packed() {
                encode_key(field.number(), WireType::LengthDelimited, buf);
                let len: usize = values
                    .iter()
                    .map(|value| scalar_payload_len(proto_type, value))
                    .sum();
                encode_varint(len as u64, buf);
                for value in values {
                    encode_scalar_payload(proto_type, value, buf);
                }
            } else {
                for value in values {
                    encode_single(proto_type, field.number(), value, buf);
                }
            }
        }
        (Cardinality::Map, Value::Map(entries)) => {
            let key_type = field.map_key().expect("validated map field has a key type");
            let value_type = field
                .map_value()
                .expect("validated map field has a value type");
            for (key, value) in entries {
                // Entries desugar to a two-field message {key=1, value=2};
                // default keys and values are elided within the entry.
                let skip_key = key.is_default();
                let skip_value = value.is_default(field);
                let len = (if skip_key {
                    0
                } else {
                    single_len(key_type, 1, &map_key_value(key))
                }) + (if skip_value {
                    0
                } else {
                    single_len(value_type, 2, value)
                });

                encode_key(field.number(), WireType::LengthDelimited, buf);
                encode_varint(len as u64, buf);
                if !skip_key {
                    encode_single(key_type, 1, &map_key_value(key), buf);
                }
                if !skip_value {
                    encode_single(value_type, 2, value, buf);
                }
            }
        }
        _ => unreachable!("field values are kind-checked on assignment"),
    }
}

fn field_encoded_len(field: &FieldDescriptor, value: &Value) -> usize {
    match (field.cardinality(), value) {
        (Cardinality::Singular, value) => single_len(field.proto_type(), field.number(), value),
        (Cardinality::Repeated, Value::Repeated(values)) => {
            if values.is_empty() {
                return 0;
            }
            let proto_type = field.proto_type();
            if field.packed() {
                let len: usize = values
                    .iter()
                    .map(|value| scalar_payload_len(proto_type, value))
                    .sum();
                encoding::key_len(field.number()) + encoded_len_varint(len as u64) + len
            } else {
                values
                    .iter()
                    .map(|value| single_len(proto_type, field.number(), value))
                    .sum()
            }
        }
        (Cardinality::Map, Value::Map(entries)) => {
            let key_type = field.map_key().expect("validated map field has a key type");
            let value_type = field
                .map_value()
                .expect("validated map field has a value type");
            entries
                .iter()
                .map(|(key, value)| {
                    let len = (if key.is_default() {
                        0
                    } else {
                        single_len(key_type, 1, &map_key_value(key))
                    }) + (if value.is_default(field) {
                        0
                    } else {
                        single_len(value_type, 2, value)
                    });
                    encoding::key_len(field.number()) + encoded_len_varint(len as u64) + len
                })
                .sum()
        }
        _ => unreachable!("field values are kind-checked on assignment"),
    }
}

/// Encodes one key-prefixed value of any proto type.
fn encode_single(proto_type: ProtoType, tag: u32, value: &Value, buf: &mut impl BufMut) {
    match (proto_type, value) {
        (ProtoType::String, Value::String(value)) => {
            encode_key(tag, WireType::LengthDelimited, buf);
            encode_varint(value.len() as u64, buf);
            buf.put_slice(value.as_bytes());
        }
        (ProtoType::Bytes, Value::Bytes(value)) => {
            encode_key(tag, WireType::LengthDelimited, buf);
            encode_varint(value.len() as u64, buf);
            buf.put_slice(value);
        }
        (ProtoType::Message, Value::Message(message)) => {
            encode_key(tag, WireType::LengthDelimited, buf);
            encode_varint(message.encoded_len() as u64, buf);
            message.encode_raw(buf);
        }
        _ => {
            encode_key(tag, proto_type.wire_type(), buf);
            encode_scalar_payload(proto_type, value, buf);
        }
    }
}

fn single_len(proto_type: ProtoType, tag: u32, value: &Value) -> usize {
    encoding::key_len(tag)
        + match (proto_type, value) {
            (ProtoType::String, Value::String(value)) => {
                encoded_len_varint(value.len() as u64) + value.len()
            }
            (ProtoType::Bytes, Value::Bytes(value)) => {
                encoded_len_varint(value.len() as u64) + value.len()
            }
            (ProtoType::Message, Value::Message(message)) => {
                let len = message.encoded_len();
                encoded_len_varint(len as u64) + len
            }
            _ => scalar_payload_len(proto_type, value),
        }
}

/// Encodes the bare payload of a packable scalar.
fn encode_scalar_payload(proto_type: ProtoType, value: &Value, buf: &mut impl BufMut) {
    match (proto_type, value) {
        (ProtoType::Int32, Value::Int32(value)) => encode_varint(*value as u64, buf),
        (ProtoType::Int64, Value::Int64(value)) => encode_varint(*value as u64, buf),
        (ProtoType::Uint32, Value::Uint32(value)) => encode_varint(u64::from(*value), buf),
        (ProtoType::Uint64, Value::Uint64(value)) => encode_varint(*value, buf),
        (ProtoType::Sint32, Value::Int32(value)) => {
            encode_varint(u64::from(encoding::encode_zigzag32(*value)), buf)
        }
        (ProtoType::Sint64, Value::Int64(value)) => {
            encode_varint(encoding::encode_zigzag64(*value), buf)
        }
        (ProtoType::Bool, Value::Bool(value)) => encode_varint(u64::from(*value), buf),
        (ProtoType::Enum, Value::Enum(value)) => encode_varint(*value as u64, buf),
        (ProtoType::Fixed32, Value::Uint32(value)) => buf.put_u32_le(*value),
        (ProtoType::Fixed64, Value::Uint64(value)) => buf.put_u64_le(*value),
        (ProtoType::Sfixed32, Value::Int32(value)) => buf.put_i32_le(*value),
        (ProtoType::Sfixed64, Value::Int64(value)) => buf.put_i64_le(*value),
        (ProtoType::Float, Value::Float(value)) => buf.put_f32_le(*value),
        (ProtoType::Double, Value::Double(value)) => buf.put_f64_le(*value),
        _ => unreachable!("field values are kind-checked on assignment"),
    }
}

fn scalar_payload_len(proto_type: ProtoType, value: &Value) -> usize {
    match (proto_type, value) {
        (ProtoType::Int32, Value::Int32(value)) => encoded_len_varint(*value as u64),
        (ProtoType::Int64, Value::Int64(value)) => encoded_len_varint(*value as u64),
        (ProtoType::Uint32, Value::Uint32(value)) => encoded_len_varint(u64::from(*value)),
        (ProtoType::Uint64, Value::Uint64(value)) => encoded_len_varint(*value),
        (ProtoType::Sint32, Value::Int32(value)) => {
            encoded_len_varint(u64::from(encoding::encode_zigzag32(*value)))
        }
        (ProtoType::Sint64, Value::Int64(value)) => {
            encoded_len_varint(encoding::encode_zigzag64(*value))
        }
        (ProtoType::Bool, Value::Bool(_)) => 1,
        (ProtoType::Enum, Value::Enum(value)) => encoded_len_varint(*value as u64),
        (ProtoType::Fixed32 | ProtoType::Sfixed32 | ProtoType::Float, _) => 4,
        (ProtoType::Fixed64 | ProtoType::Sfixed64 | ProtoType::Double, _) => 8,
        _ => unreachable!("field values are kind-checked on assignment"),
    }
}

fn map_key_value(key: &MapKey) -> Value {
    match key {
        MapKey::Int32(value) => Value::Int32(*value),
        MapKey::Int64(value) => Value::Int64(*value),
        MapKey::Uint32(value) => Value::Uint32(*value),
        MapKey::Uint64(value) => Value::Uint64(*value),
        MapKey::Bool(value) => Value::Bool(*value),
        MapKey::String(value) => Value::String(value.clone()),
    }
}

// === Field decoding ===

/// Decodes the bare payload of a non-message value.
fn decode_scalar_payload(proto_type: ProtoType, buf: &mut impl Buf) -> Result<Value, DecodeError> {
    fn require(buf: &impl Buf, width: usize) -> Result<(), DecodeError> {
        if buf.remaining() < width {
            Err(DecodeErrorKind::Truncated.into())
        } else {
            Ok(())
        }
    }

    let value = match proto_type {
        ProtoType::Int32 => Value::Int32(decode_varint(buf)? as i32),
        ProtoType::Int64 => Value::Int64(decode_varint(buf)? as i64),
        ProtoType::Uint32 => Value::Uint32(decode_varint(buf)? as u32),
        ProtoType::Uint64 => Value::Uint64(decode_varint(buf)?),
        ProtoType::Sint32 => Value::Int32(encoding::decode_zigzag32(decode_varint(buf)? as u32)),
        ProtoType::Sint64 => Value::Int64(encoding::decode_zigzag64(decode_varint(buf)?)),
        ProtoType::Bool => Value::Bool(decode_varint(buf)? != 0),
        ProtoType::Enum => Value::Enum(decode_varint(buf)? as i32),
        ProtoType::Fixed32 => {
            require(buf, 4)?;
            Value::Uint32(buf.get_u32_le())
        }
        ProtoType::Fixed64 => {
            require(buf, 8)?;
            Value::Uint64(buf.get_u64_le())
        }
        ProtoType::Sfixed32 => {
            require(buf, 4)?;
            Value::Int32(buf.get_i32_le())
        }
        ProtoType::Sfixed64 => {
            require(buf, 8)?;
            Value::Int64(buf.get_i64_le())
        }
        ProtoType::Float => {
            require(buf, 4)?;
            Value::Float(buf.get_f32_le())
        }
        ProtoType::Double => {
            require(buf, 8)?;
            Value::Double(buf.get_f64_le())
        }
        ProtoType::String => {
            let len = encoding::decode_length_delimiter(buf)?;
            let data = buf.copy_to_bytes(len);
            let text = std::str::from_utf8(&data)
                .map_err(|_| DecodeError::from(DecodeErrorKind::InvalidUtf8))?;
            Value::String(text.to_string())
        }
        ProtoType::Bytes => {
            let len = encoding::decode_length_delimiter(buf)?;
            Value::Bytes(buf.copy_to_bytes(len))
        }
        ProtoType::Message => unreachable!("message payloads are merged by the caller"),
    };
    Ok(value)
}

fn decode_map_key(key_type: ProtoType, buf: &mut impl Buf) -> Result<MapKey, DecodeError> {
    let key = match decode_scalar_payload(key_type, buf)? {
        Value::Int32(value) => MapKey::Int32(value),
        Value::Int64(value) => MapKey::Int64(value),
        Value::Uint32(value) => MapKey::Uint32(value),
        Value::Uint64(value) => MapKey::Uint64(value),
        Value::Bool(value) => MapKey::Bool(value),
        Value::String(value) => MapKey::String(value),
        _ => unreachable!("map key types are validated when the descriptor is built"),
    };
    Ok(key)
}

#[cfg(test)]
mod test {
    use std::sync::OnceLock;

    use super::*;
    use crate::descriptor::FieldDescriptor;

    fn greeting() -> &'static MessageDescriptor {
        static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            MessageDescriptor::new(
                "test.Greeting",
                vec![FieldDescriptor::scalar(1, "message", ProtoType::String)],
            )
            .unwrap()
        })
    }

    #[test]
    fn greeting_roundtrip() {
        let mut message = DynamicMessage::new(greeting());
        message.set("message", "Hey!");

        let bytes = message.encode_to_vec();
        assert_eq!(bytes, [0x0A, 0x04, 0x48, 0x65, 0x79, 0x21]);
        assert_eq!(bytes.len(), message.encoded_len());

        let decoded = DynamicMessage::parse(greeting(), &bytes[..]).unwrap();
        assert_eq!(decoded, message);
        assert!(decoded.is_from_wire());
        assert!(!message.is_from_wire());
    }

    #[test]
    fn fresh_instance_encodes_empty() {
        let message = DynamicMessage::new(greeting());
        assert_eq!(message.encoded_len(), 0);
        assert!(message.encode_to_vec().is_empty());
    }

    #[test]
    fn default_scalar_assignment_is_elided() {
        let mut message = DynamicMessage::new(greeting());
        message.set("message", "");
        assert!(!message.has("message"));
        assert_eq!(message.get_or_default("message"), Value::String(String::new()));
        assert!(message.encode_to_vec().is_empty());
    }

    #[test]
    fn encode_checks_capacity() {
        let mut message = DynamicMessage::new(greeting());
        message.set("message", "Hey!");

        let mut tiny = [0u8; 2];
        let err = message.encode(&mut &mut tiny[..]).unwrap_err();
        assert_eq!(err.required_capacity(), 6);
        assert_eq!(err.remaining(), 2);
    }

    #[test]
    fn last_occurrence_wins() {
        // message = "a", then message = "b".
        let bytes = [0x0A, 0x01, b'a', 0x0A, 0x01, b'b'];
        let message = DynamicMessage::parse(greeting(), &bytes[..]).unwrap();
        assert_eq!(message.get_or_default("message"), Value::String("b".to_string()));
    }

    #[test]
    fn invalid_utf8_string() {
        let bytes = [0x0A, 0x02, 0x80, 0x80];
        let err = DynamicMessage::parse(greeting(), &bytes[..]).unwrap_err();
        assert_eq!(*err.kind(), DecodeErrorKind::InvalidUtf8);
    }

    #[test]
    fn wrong_wire_type_for_known_field() {
        // Field 1 declared string, encoded as varint.
        let bytes = [0x08, 0x01];
        let err = DynamicMessage::parse(greeting(), &bytes[..]).unwrap_err();
        assert!(matches!(
            err.kind(),
            DecodeErrorKind::UnexpectedWireType { .. }
        ));
    }

    #[test]
    fn truncated_length_delimited_field() {
        let bytes = [0x0A, 0x0A, b'x'];
        let err = DynamicMessage::parse(greeting(), &bytes[..]).unwrap_err();
        assert_eq!(*err.kind(), DecodeErrorKind::Truncated);
    }
}
