//! The static, per-type description of a message that drives the codec.
//!
//! Generated message types build one [`MessageDescriptor`] per type, usually
//! inside a `OnceLock`, and hand it to every [`DynamicMessage`](crate::DynamicMessage)
//! they construct. Descriptors are immutable once built and may be shared
//! freely between threads.

use std::collections::HashMap;

use heck::ToLowerCamelCase;

use crate::encoding::wire_type::WireType;
use crate::encoding::MAX_TAG;
use crate::error::DescriptorError;

/// A reference to a message descriptor, late-bound so recursive message
/// graphs can be described from once-initialized statics.
pub type MessageRef = fn() -> &'static MessageDescriptor;

/// A reference to an enum descriptor.
pub type EnumRef = fn() -> &'static EnumDescriptor;

/// The declared protobuf type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtoType {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Bool,
    Enum,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    String,
    Bytes,
    Message,
}

impl ProtoType {
    /// The wire type a singular field of this type is encoded with.
    pub fn wire_type(self) -> WireType {
        match self {
            ProtoType::Int32
            | ProtoType::Int64
            | ProtoType::Uint32
            | ProtoType::Uint64
            | ProtoType::Sint32
            | ProtoType::Sint64
            | ProtoType::Bool
            | ProtoType::Enum => WireType::Varint,
            ProtoType::Fixed64 | ProtoType::Sfixed64 | ProtoType::Double => WireType::SixtyFourBit,
            ProtoType::Fixed32 | ProtoType::Sfixed32 | ProtoType::Float => WireType::ThirtyTwoBit,
            ProtoType::String | ProtoType::Bytes | ProtoType::Message => {
                WireType::LengthDelimited
            }
        }
    }

    /// Whether a repeated field of this type may use the packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, ProtoType::String | ProtoType::Bytes | ProtoType::Message)
    }

    fn is_valid_map_key(self) -> bool {
        matches!(
            self,
            ProtoType::Int32
                | ProtoType::Int64
                | ProtoType::Uint32
                | ProtoType::Uint64
                | ProtoType::Sint32
                | ProtoType::Sint64
                | ProtoType::Fixed32
                | ProtoType::Fixed64
                | ProtoType::Sfixed32
                | ProtoType::Sfixed64
                | ProtoType::Bool
                | ProtoType::String
        )
    }
}

/// How many values a field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
    Map,
}

/// The description of a single message field.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    number: u32,
    name: &'static str,
    json_name: String,
    proto_type: ProtoType,
    cardinality: Cardinality,
    packed: bool,
    oneof: Option<&'static str>,
    message: Option<MessageRef>,
    enumeration: Option<EnumRef>,
    map_key: Option<ProtoType>,
    map_value: Option<ProtoType>,
}

impl FieldDescriptor {
    fn new(number: u32, name: &'static str, proto_type: ProtoType) -> FieldDescriptor {
        FieldDescriptor {
            number,
            name,
            json_name: name.to_lower_camel_case(),
            proto_type,
            cardinality: Cardinality::Singular,
            packed: proto_type.is_packable(),
            oneof: None,
            message: None,
            enumeration: None,
            map_key: None,
            map_value: None,
        }
    }

    /// A singular scalar field. Use [`repeated`](Self::repeated) to turn it
    /// into a repeated field.
    pub fn scalar(number: u32, name: &'static str, proto_type: ProtoType) -> FieldDescriptor {
        FieldDescriptor::new(number, name, proto_type)
    }

    /// A singular sub-message field.
    pub fn message(number: u32, name: &'static str, message: MessageRef) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(number, name, ProtoType::Message);
        field.message = Some(message);
        field
    }

    /// A singular enum field.
    pub fn enumeration(number: u32, name: &'static str, enumeration: EnumRef) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(number, name, ProtoType::Enum);
        field.enumeration = Some(enumeration);
        field
    }

    /// A map field. Message- or enum-valued maps additionally need
    /// [`message_type`](Self::message_type) or [`enum_type`](Self::enum_type).
    pub fn map(
        number: u32,
        name: &'static str,
        map_key: ProtoType,
        map_value: ProtoType,
    ) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(number, name, map_value);
        field.cardinality = Cardinality::Map;
        field.map_key = Some(map_key);
        field.map_value = Some(map_value);
        field
    }

    /// Marks the field repeated.
    pub fn repeated(mut self) -> FieldDescriptor {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Opts a repeated scalar field out of the packed encoding on emit.
    /// Decoding accepts both encodings regardless.
    pub fn unpacked(mut self) -> FieldDescriptor {
        self.packed = false;
        self
    }

    /// Places the field in a oneof group.
    pub fn in_oneof(mut self, group: &'static str) -> FieldDescriptor {
        self.oneof = Some(group);
        self
    }

    /// Sets the message descriptor for a message-valued map field.
    pub fn message_type(mut self, message: MessageRef) -> FieldDescriptor {
        self.message = Some(message);
        self
    }

    /// Sets the enum descriptor for an enum-valued map field.
    pub fn enum_type(mut self, enumeration: EnumRef) -> FieldDescriptor {
        self.enumeration = Some(enumeration);
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// The name as declared in the schema.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The canonical JSON (lowerCamelCase) name.
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn proto_type(&self) -> ProtoType {
        self.proto_type
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Map
    }

    /// Whether a repeated field of packable type is emitted packed.
    pub fn packed(&self) -> bool {
        self.packed && self.proto_type.is_packable()
    }

    /// The oneof group this field belongs to, if any.
    pub fn oneof(&self) -> Option<&'static str> {
        self.oneof
    }

    /// The descriptor of the sub-message type (the value type, for maps).
    pub fn message_descriptor(&self) -> Option<&'static MessageDescriptor> {
        self.message.map(|message| message())
    }

    /// The descriptor of the enum type (the value type, for maps).
    pub fn enum_descriptor(&self) -> Option<&'static EnumDescriptor> {
        self.enumeration.map(|enumeration| enumeration())
    }

    /// The declared key type of a map field.
    pub fn map_key(&self) -> Option<ProtoType> {
        self.map_key
    }

    /// The declared value type of a map field.
    pub fn map_value(&self) -> Option<ProtoType> {
        self.map_value
    }
}

/// The description of a message type: its full name and its fields in
/// declaration order, with constant-time lookup by number and by name.
#[derive(Debug)]
pub struct MessageDescriptor {
    full_name: &'static str,
    fields: Vec<FieldDescriptor>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    oneofs: Vec<&'static str>,
}

impl MessageDescriptor {
    /// Builds and validates a descriptor from field records.
    pub fn new(
        full_name: &'static str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<MessageDescriptor, DescriptorError> {
        let mut by_number = HashMap::with_capacity(fields.len());
        let mut by_name = HashMap::with_capacity(fields.len() * 2);
        let mut oneofs = Vec::new();

        for (index, field) in fields.iter().enumerate() {
            if field.number == 0 || field.number > MAX_TAG {
                return Err(DescriptorError::InvalidFieldNumber(field.number));
            }
            if (19000..=19999).contains(&field.number) {
                return Err(DescriptorError::ReservedFieldNumber(field.number));
            }
            if by_number.insert(field.number, index).is_some() {
                return Err(DescriptorError::DuplicateFieldNumber(field.number));
            }

            // Parsing accepts both the declared and the JSON name, so both
            // must be claimable.
            if by_name.insert(field.name.to_string(), index).is_some() {
                return Err(DescriptorError::DuplicateFieldName(field.name.to_string()));
            }
            if field.json_name != field.name {
                if let Some(other) = by_name.insert(field.json_name.clone(), index) {
                    if other != index {
                        return Err(DescriptorError::DuplicateFieldName(field.json_name.clone()));
                    }
                }
            }

            match field.cardinality {
                Cardinality::Map => {
                    let map_key = field
                        .map_key
                        .ok_or(DescriptorError::InvalidFieldNumber(field.number))?;
                    if !map_key.is_valid_map_key() {
                        return Err(DescriptorError::InvalidMapKeyType(map_key));
                    }
                    match field.map_value {
                        Some(ProtoType::Message) if field.message.is_none() => {
                            return Err(DescriptorError::MissingMessageType(field.number));
                        }
                        Some(ProtoType::Enum) if field.enumeration.is_none() => {
                            return Err(DescriptorError::MissingEnumType(field.number));
                        }
                        Some(_) => {}
                        None => return Err(DescriptorError::InvalidFieldNumber(field.number)),
                    }
                }
                Cardinality::Singular | Cardinality::Repeated => {
                    if field.proto_type == ProtoType::Message && field.message.is_none() {
                        return Err(DescriptorError::MissingMessageType(field.number));
                    }
                    if field.proto_type == ProtoType::Enum && field.enumeration.is_none() {
                        return Err(DescriptorError::MissingEnumType(field.number));
                    }
                }
            }

            if let Some(group) = field.oneof {
                if field.cardinality != Cardinality::Singular {
                    return Err(DescriptorError::OneofNotSingular(field.number));
                }
                if !oneofs.contains(&group) {
                    oneofs.push(group);
                }
            }
        }

        Ok(MessageDescriptor {
            full_name,
            fields,
            by_number,
            by_name,
            oneofs,
        })
    }

    /// The fully qualified message name, e.g. `google.protobuf.Timestamp`.
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks a field up by number.
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&index| &self.fields[index])
    }

    /// Looks a field up by its declared or JSON name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    /// The oneof group names declared in this message.
    pub fn oneofs(&self) -> &[&'static str] {
        &self.oneofs
    }

    pub(crate) fn oneof_members<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.oneof.is_some_and(|g| g == group))
    }
}

/// The description of an enum type.
///
/// Enum value sets are open: integers without a declared name are accepted
/// and preserved by both codecs.
#[derive(Clone, Debug)]
pub struct EnumDescriptor {
    pub full_name: &'static str,
    pub values: &'static [(&'static str, i32)],
}

impl EnumDescriptor {
    /// The declared name for a value, if any.
    pub fn name(&self, number: i32) -> Option<&'static str> {
        self.values
            .iter()
            .find(|&&(_, value)| value == number)
            .map(|&(name, _)| name)
    }

    /// The declared number for a name, if any.
    pub fn number(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|&&(value_name, _)| value_name == name)
            .map(|&(_, number)| number)
    }

    /// The first declared value, used as the field default.
    pub fn default_number(&self) -> i32 {
        self.values.first().map_or(0, |&(_, number)| number)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn declaration_order_and_lookup() {
        let descriptor = MessageDescriptor::new(
            "test.Order",
            vec![
                FieldDescriptor::scalar(3, "first_field", ProtoType::String),
                FieldDescriptor::scalar(1, "second_field", ProtoType::Int32),
            ],
        )
        .unwrap();

        let names: Vec<_> = descriptor.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["first_field", "second_field"]);
        assert_eq!(descriptor.field(3).unwrap().name(), "first_field");
        assert_eq!(descriptor.field_by_name("second_field").unwrap().number(), 1);
        assert_eq!(descriptor.field_by_name("secondField").unwrap().number(), 1);
        assert!(descriptor.field(2).is_none());
    }

    #[test]
    fn json_name_is_lower_camel() {
        let field = FieldDescriptor::scalar(1, "some_field_name", ProtoType::Bool);
        assert_eq!(field.json_name(), "someFieldName");
    }

    #[test]
    fn reserved_numbers_rejected() {
        for number in [19000, 19500, 19999] {
            let err = MessageDescriptor::new(
                "test.Reserved",
                vec![FieldDescriptor::scalar(number, "field", ProtoType::Int32)],
            )
            .unwrap_err();
            assert_eq!(err, DescriptorError::ReservedFieldNumber(number));
        }

        assert!(MessageDescriptor::new(
            "test.Boundary",
            vec![
                FieldDescriptor::scalar(18999, "low", ProtoType::Int32),
                FieldDescriptor::scalar(20000, "high", ProtoType::Int32),
            ],
        )
        .is_ok());
    }

    #[test]
    fn duplicate_numbers_rejected() {
        let err = MessageDescriptor::new(
            "test.Duplicate",
            vec![
                FieldDescriptor::scalar(1, "a", ProtoType::Int32),
                FieldDescriptor::scalar(1, "b", ProtoType::Int32),
            ],
        )
        .unwrap_err();
        assert_eq!(err, DescriptorError::DuplicateFieldNumber(1));
    }

    #[test]
    fn zero_field_number_rejected() {
        let err = MessageDescriptor::new(
            "test.Zero",
            vec![FieldDescriptor::scalar(0, "zero", ProtoType::Int32)],
        )
        .unwrap_err();
        assert_eq!(err, DescriptorError::InvalidFieldNumber(0));
    }

    #[test]
    fn map_key_types_restricted() {
        for key in [ProtoType::Float, ProtoType::Double, ProtoType::Bytes] {
            let err = MessageDescriptor::new(
                "test.BadMap",
                vec![FieldDescriptor::map(1, "entries", key, ProtoType::Int32)],
            )
            .unwrap_err();
            assert_eq!(err, DescriptorError::InvalidMapKeyType(key));
        }

        assert!(MessageDescriptor::new(
            "test.GoodMap",
            vec![FieldDescriptor::map(1, "entries", ProtoType::String, ProtoType::Int32)],
        )
        .is_ok());
    }

    #[test]
    fn oneof_members_must_be_singular() {
        let err = MessageDescriptor::new(
            "test.BadOneof",
            vec![FieldDescriptor::scalar(1, "values", ProtoType::Int32)
                .repeated()
                .in_oneof("choice")],
        )
        .unwrap_err();
        assert_eq!(err, DescriptorError::OneofNotSingular(1));
    }

    #[test]
    fn enum_lookup() {
        const COLOR: EnumDescriptor = EnumDescriptor {
            full_name: "test.Color",
            values: &[("COLOR_RED", 0), ("COLOR_GREEN", 1), ("COLOR_BLUE", 2)],
        };

        assert_eq!(COLOR.name(1), Some("COLOR_GREEN"));
        assert_eq!(COLOR.name(7), None);
        assert_eq!(COLOR.number("COLOR_BLUE"), Some(2));
        assert_eq!(COLOR.number("COLOR_MAUVE"), None);
        assert_eq!(COLOR.default_number(), 0);
    }
}
