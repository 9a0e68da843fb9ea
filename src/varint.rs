// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QUIC variable-length integer encoding (RFC 9000 section 16).
//!
//! Values are encoded on 1, 2, 4, or 8 bytes depending on magnitude; the two
//! most significant bits of the first byte select the length.

use core::{convert::TryFrom, fmt, ops::Deref};
use s2n_codec::{DecoderBuffer, DecoderBufferMut, DecoderError, Encoder, EncoderValue};

/// The largest value representable by a QUIC variable-length integer.
pub const MAX_VARINT_VALUE: u64 = 4_611_686_018_427_387_903;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarIntError;

impl fmt::Display for VarIntError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "value exceeds the maximum representable varint (2^62 - 1)")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VarIntError {}

/// A non-negative integer in the range `0..=2^62-1`, encoded on the wire in
/// 1, 2, 4, or 8 bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
    pub const ZERO: VarInt = VarInt(0);
    pub const MAX: VarInt = VarInt(MAX_VARINT_VALUE);

    /// Creates a `VarInt` from a `u64`, returning an error if it exceeds
    /// [`MAX_VARINT_VALUE`].
    #[inline]
    pub const fn new(value: u64) -> Result<Self, VarIntError> {
        if value <= MAX_VARINT_VALUE {
            Ok(VarInt(value))
        } else {
            Err(VarIntError)
        }
    }

    /// Creates a `VarInt` from a `u64`, clamping to [`MAX_VARINT_VALUE`].
    #[inline]
    pub const fn new_saturating(value: u64) -> Self {
        if value <= MAX_VARINT_VALUE {
            VarInt(value)
        } else {
            VarInt(MAX_VARINT_VALUE)
        }
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The number of bytes this value would occupy on the wire.
    #[inline]
    pub const fn encoding_size(self) -> usize {
        encoding_size(self.0)
    }

    #[inline]
    pub fn checked_add(self, other: VarInt) -> Option<VarInt> {
        self.0.checked_add(other.0).and_then(|v| VarInt::new(v).ok())
    }

    #[inline]
    pub fn checked_sub(self, other: VarInt) -> Option<VarInt> {
        self.0.checked_sub(other.0).map(VarInt)
    }

    #[inline]
    pub fn saturating_add(self, other: VarInt) -> VarInt {
        VarInt::new_saturating(self.0.saturating_add(other.0))
    }
}

#[inline]
const fn encoding_size(value: u64) -> usize {
    if value <= 63 {
        1
    } else if value <= 16_383 {
        2
    } else if value <= 1_073_741_823 {
        4
    } else {
        8
    }
}

impl Deref for VarInt {
    type Target = u64;

    #[inline]
    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

macro_rules! try_from_int {
    ($ty:ty) => {
        impl TryFrom<$ty> for VarInt {
            type Error = VarIntError;

            #[inline]
            fn try_from(value: $ty) -> Result<Self, Self::Error> {
                VarInt::new(value as u64)
            }
        }
    };
}

try_from_int!(u8);
try_from_int!(u16);
try_from_int!(u32);
try_from_int!(u64);
try_from_int!(usize);

impl From<u8> for VarInt {
    #[inline]
    fn from(value: u8) -> Self {
        VarInt(value as u64)
    }
}

impl From<u16> for VarInt {
    #[inline]
    fn from(value: u16) -> Self {
        VarInt(value as u64)
    }
}

impl From<VarInt> for u64 {
    #[inline]
    fn from(value: VarInt) -> Self {
        value.0
    }
}

impl TryFrom<VarInt> for usize {
    type Error = core::num::TryFromIntError;

    #[inline]
    fn try_from(value: VarInt) -> Result<Self, Self::Error> {
        usize::try_from(value.0)
    }
}

fn decode_from_tag(first: u8, rest: &[u8]) -> Option<(u64, usize)> {
    let len = 1usize << (first >> 6);
    if rest.len() + 1 < len {
        return None;
    }
    let mut value = (first & 0x3f) as u64;
    for &byte in &rest[..len - 1] {
        value = (value << 8) | byte as u64;
    }
    Some((value, len))
}

impl EncoderValue for VarInt {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let value = self.0;
        let len = self.encoding_size();
        let prefix = match len {
            1 => 0b00,
            2 => 0b01,
            4 => 0b10,
            _ => 0b11,
        } as u64;
        let encoded = (value | (prefix << (len * 8 - 2))) as u64;
        buffer.write_sized(len, |slice| {
            let bytes = encoded.to_be_bytes();
            slice.copy_from_slice(&bytes[8 - len..]);
        });
    }
}

impl<'a> s2n_codec::DecoderValue<'a> for VarInt {
    fn decode(buffer: DecoderBuffer<'a>) -> Result<(Self, DecoderBuffer<'a>), DecoderError> {
        let first = buffer.peek_byte(0)?;
        let len = 1usize << (first >> 6);
        let (slice, buffer) = buffer.decode_slice(len)?;
        let bytes = slice.into_less_safe_slice();
        let (value, consumed) =
            decode_from_tag(bytes[0], &bytes[1..]).ok_or(DecoderError::UnexpectedEnd)?;
        debug_assert_eq!(consumed, len);
        Ok((VarInt(value), buffer))
    }
}

impl<'a> s2n_codec::DecoderValueMut<'a> for VarInt {
    fn decode_mut(
        buffer: DecoderBufferMut<'a>,
    ) -> Result<(Self, DecoderBufferMut<'a>), DecoderError> {
        let first = buffer.peek_byte(0)?;
        let len = 1usize << (first >> 6);
        let (slice, buffer) = buffer.decode_slice(len)?;
        let bytes = slice.into_less_safe_slice();
        let (value, consumed) =
            decode_from_tag(bytes[0], &bytes[1..]).ok_or(DecoderError::UnexpectedEnd)?;
        debug_assert_eq!(consumed, len);
        Ok((VarInt(value), buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_size_matches_rfc_table() {
        assert_eq!(VarInt::new(0).unwrap().encoding_size(), 1);
        assert_eq!(VarInt::new(63).unwrap().encoding_size(), 1);
        assert_eq!(VarInt::new(64).unwrap().encoding_size(), 2);
        assert_eq!(VarInt::new(16_383).unwrap().encoding_size(), 2);
        assert_eq!(VarInt::new(16_384).unwrap().encoding_size(), 4);
        assert_eq!(VarInt::new(1_073_741_823).unwrap().encoding_size(), 4);
        assert_eq!(VarInt::new(1_073_741_824).unwrap().encoding_size(), 8);
    }

    #[test]
    fn rejects_values_above_max() {
        assert!(VarInt::new(MAX_VARINT_VALUE + 1).is_err());
        assert!(VarInt::new(MAX_VARINT_VALUE).is_ok());
    }

    #[test]
    fn round_trips_through_wire_encoding() {
        let mut buf = [0u8; 8];
        for value in [0u64, 1, 63, 64, 16_383, 16_384, 1_073_741_823, 1_073_741_824, MAX_VARINT_VALUE] {
            let v = VarInt::new(value).unwrap();
            let len = v.encoding_size();
            let mut encoder = s2n_codec::EncoderBuffer::new(&mut buf[..len]);
            encoder.encode(&v);
            let decoded = DecoderBuffer::new(&buf[..len]);
            let (out, remaining): (VarInt, _) = decoded.decode().unwrap();
            assert_eq!(out, v);
            assert!(remaining.is_empty());
        }
    }
}
