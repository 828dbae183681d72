use bytes::{Buf, BufMut};

use crate::error::{DecodeError, DecodeErrorKind};

/// Writes `value` to `buf` as a base-128 varint: seven bits per byte,
/// least-significant group first, with the high bit set on every byte but
/// the last. The buffer must have at least ten bytes of remaining space.
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8(0x80 | (value as u8 & 0x7F));
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// The number of bytes [`encode_varint`] writes for `value`, between 1 and
/// 10 inclusive: one byte per started seven-bit group.
#[inline]
pub fn encoded_len_varint(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Reads a base-128 varint from the front of `buf`.
///
/// A run is at most ten bytes; the tenth byte may only contribute the
/// topmost bit of the `u64`, so anything else there is either an overflow
/// or an overlong run, and both are malformed. A buffer that ends while the
/// continuation bit is still set is truncated instead.
#[inline]
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        if !buf.has_remaining() {
            return Err(DecodeErrorKind::Truncated.into());
        }
        let byte = buf.get_u8();
        if shift == 63 && byte > 0x01 {
            return Err(DecodeErrorKind::InvalidVarint.into());
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(DecodeErrorKind::InvalidVarint.into());
        }
    }
}
