//! Preservation of fields a descriptor does not declare.

use bytes::{Buf, BufMut, Bytes};

use crate::encoding::{self, wire_type::WireType};
use crate::error::{DecodeError, DecodeErrorKind};

/// The unknown fields of a parsed message, in arrival order.
///
/// Unknown fields are not errors: they are captured during parsing and
/// re-emitted verbatim after the known fields, so that a message can be
/// round-tripped through a descriptor that predates its schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnknownFieldSet {
    fields: Vec<(u32, UnknownValue)>,
}

/// The payload of a single unknown field.
#[derive(Clone, Debug, PartialEq)]
pub enum UnknownValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(Bytes),
}

impl UnknownFieldSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// The captured fields, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownValue)> {
        self.fields.iter().map(|(tag, value)| (*tag, value))
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }

    /// Decodes one field payload from the buffer and appends it to the set.
    pub(crate) fn capture(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
    ) -> Result<(), DecodeError> {
        let value = match wire_type {
            WireType::Varint => UnknownValue::Varint(encoding::decode_varint(buf)?),
            WireType::ThirtyTwoBit => {
                if buf.remaining() < 4 {
                    return Err(DecodeErrorKind::Truncated.into());
                }
                UnknownValue::Fixed32(buf.get_u32_le())
            }
            WireType::SixtyFourBit => {
                if buf.remaining() < 8 {
                    return Err(DecodeErrorKind::Truncated.into());
                }
                UnknownValue::Fixed64(buf.get_u64_le())
            }
            WireType::LengthDelimited => {
                let len = encoding::decode_length_delimiter(buf)?;
                UnknownValue::LengthDelimited(buf.copy_to_bytes(len))
            }
        };

        self.fields.push((tag, value));
        Ok(())
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        for (tag, value) in self.iter() {
            match value {
                UnknownValue::Varint(value) => {
                    encoding::encode_key(tag, WireType::Varint, buf);
                    encoding::encode_varint(*value, buf);
                }
                UnknownValue::Fixed32(value) => {
                    encoding::encode_key(tag, WireType::ThirtyTwoBit, buf);
                    buf.put_u32_le(*value);
                }
                UnknownValue::Fixed64(value) => {
                    encoding::encode_key(tag, WireType::SixtyFourBit, buf);
                    buf.put_u64_le(*value);
                }
                UnknownValue::LengthDelimited(value) => {
                    encoding::encode_key(tag, WireType::LengthDelimited, buf);
                    encoding::encode_varint(value.len() as u64, buf);
                    buf.put_slice(value);
                }
            }
        }
    }

    pub(crate) fn encoded_len(&self) -> usize {
        self.iter()
            .map(|(tag, value)| {
                encoding::key_len(tag)
                    + match value {
                        UnknownValue::Varint(value) => encoding::encoded_len_varint(*value),
                        UnknownValue::Fixed32(_) => 4,
                        UnknownValue::Fixed64(_) => 8,
                        UnknownValue::LengthDelimited(value) => {
                            encoding::encoded_len_varint(value.len() as u64) + value.len()
                        }
                    }
            })
            .sum()
    }
}
