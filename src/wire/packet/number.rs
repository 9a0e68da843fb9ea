// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet numbers and packet-number spaces (spec.md §3 "PacketNumber",
//! "PacketNumberSpace").

use crate::varint::VarInt;
use core::cmp::Ordering;

/// One of the three independent packet-number spaces (spec.md §3). Each
/// owns its own ACK state, largest-sent-packet, RTT samples, and loss
/// recovery (spec.md §4.2, §4.3).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PacketNumberSpace {
    #[default]
    Initial = 0,
    Handshake = 1,
    Application = 2,
}

impl PacketNumberSpace {
    pub const ALL: [PacketNumberSpace; 3] = [
        PacketNumberSpace::Initial,
        PacketNumberSpace::Handshake,
        PacketNumberSpace::Application,
    ];

    #[inline]
    pub fn is_initial(self) -> bool {
        matches!(self, Self::Initial)
    }

    #[inline]
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Handshake)
    }

    #[inline]
    pub fn is_application(self) -> bool {
        matches!(self, Self::Application)
    }

    #[inline]
    pub const fn new_packet_number(self, value: VarInt) -> PacketNumber {
        PacketNumber {
            space: self,
            value,
        }
    }

    /// Asserts the two spaces match; a cross-space comparison or ACK is a
    /// core bug (spec.md I1/P1), never a peer-triggerable condition.
    #[inline(always)]
    pub(crate) fn assert_eq(self, other: Self) {
        debug_assert_eq!(
            self, other,
            "packet numbers must never be compared across packet-number spaces"
        );
    }
}

/// The cryptographic epoch a packet or key belongs to (spec.md §3
/// "EncryptionLevel"). `ZeroRtt` and `OneRtt` both map to the Application
/// packet-number space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    ZeroRtt,
    OneRtt,
}

impl EncryptionLevel {
    #[inline]
    pub const fn packet_number_space(self) -> PacketNumberSpace {
        match self {
            EncryptionLevel::Initial => PacketNumberSpace::Initial,
            EncryptionLevel::Handshake => PacketNumberSpace::Handshake,
            EncryptionLevel::ZeroRtt | EncryptionLevel::OneRtt => PacketNumberSpace::Application,
        }
    }

    /// Ordering used to coalesce packets into a single datagram: Initial,
    /// Handshake, 1-RTT (spec.md §4.5 "Coalescing").
    #[inline]
    pub const fn coalescing_order(self) -> u8 {
        match self {
            EncryptionLevel::Initial => 0,
            EncryptionLevel::Handshake => 1,
            EncryptionLevel::ZeroRtt => 2,
            EncryptionLevel::OneRtt => 3,
        }
    }
}

/// A packet number within a specific [`PacketNumberSpace`]. Comparisons
/// across spaces are a logic error (spec.md §3).
#[derive(Copy, Clone, Debug)]
pub struct PacketNumber {
    space: PacketNumberSpace,
    value: VarInt,
}

impl PacketNumber {
    #[inline]
    pub const fn from_varint(value: VarInt, space: PacketNumberSpace) -> Self {
        Self { space, value }
    }

    #[inline]
    pub const fn space(self) -> PacketNumberSpace {
        self.space
    }

    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.value
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.value.as_u64()
    }

    #[inline]
    pub fn next(self) -> Self {
        Self {
            space: self.space,
            value: VarInt::new_saturating(self.value.as_u64() + 1),
        }
    }

    /// The smallest number of bytes needed to encode this packet number's
    /// truncated form given the largest acknowledged packet number (RFC
    /// 9000 Appendix A).
    pub fn truncate(self, largest_acked: Option<PacketNumber>) -> PacketNumberLen {
        self.space.assert_eq(largest_acked.map(|p| p.space).unwrap_or(self.space));
        let num_unacked = match largest_acked {
            Some(largest) => self.value.as_u64().saturating_sub(largest.value.as_u64()),
            None => self.value.as_u64() + 1,
        };
        let bits = 64 - (num_unacked * 4).max(1).leading_zeros();
        let len = ((bits as usize + 7) / 8).clamp(1, 4);
        PacketNumberLen::new(len as u8)
    }

    /// Reconstructs a full packet number from its truncated wire form,
    /// given the largest packet number received so far in this space (RFC
    /// 9000 Appendix A "Sample Packet Number Decoding Algorithm").
    pub fn expand(
        space: PacketNumberSpace,
        largest_pn: Option<PacketNumber>,
        truncated: u64,
        len: PacketNumberLen,
    ) -> PacketNumber {
        let pn_nbits = len.num_bits();
        let expected = largest_pn.map(|p| p.value.as_u64() + 1).unwrap_or(0);
        let pn_win = 1u64 << pn_nbits;
        let pn_hwin = pn_win / 2;
        let pn_mask = pn_win.wrapping_sub(1);

        let candidate = (expected & !pn_mask) | truncated;
        let value = if candidate + pn_hwin <= expected && candidate < (1u64 << 62) - pn_win {
            candidate + pn_win
        } else if candidate > expected + pn_hwin && candidate >= pn_win {
            candidate - pn_win
        } else {
            candidate
        };

        space.new_packet_number(VarInt::new_saturating(value))
    }
}

impl PartialEq for PacketNumber {
    fn eq(&self, other: &Self) -> bool {
        self.space.assert_eq(other.space);
        self.value == other.value
    }
}
impl Eq for PacketNumber {}

impl PartialOrd for PacketNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PacketNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.space.assert_eq(other.space);
        self.value.cmp(&other.value)
    }
}

/// The wire encoding length (in bytes, 1-4) of a truncated packet number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PacketNumberLen(u8);

impl PacketNumberLen {
    #[inline]
    pub fn new(bytes: u8) -> Self {
        debug_assert!((1..=4).contains(&bytes));
        Self(bytes.clamp(1, 4))
    }

    /// Decodes the 2-bit length field from a short/long header's low bits.
    #[inline]
    pub fn from_packet_tag(tag: u8) -> Self {
        Self((tag & 0x3) + 1)
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn num_bits(self) -> u32 {
        self.0 as u32 * 8
    }

    #[inline]
    pub fn tag_bits(self) -> u8 {
        self.0 - 1
    }

    pub fn encode_truncated(self, pn: PacketNumber) -> heapless_bytes4::Bytes4 {
        let full = pn.as_u64();
        let len = self.bytes();
        let mut out = [0u8; 4];
        let be = full.to_be_bytes();
        out[4 - len..].copy_from_slice(&be[8 - len..]);
        heapless_bytes4::Bytes4 { bytes: out, len }
    }
}

/// A tiny fixed-capacity byte buffer, avoiding an allocation for the (at
/// most 4-byte) truncated packet number written into a header.
pub mod heapless_bytes4 {
    #[derive(Copy, Clone, Debug)]
    pub struct Bytes4 {
        pub(super) bytes: [u8; 4],
        pub(super) len: usize,
    }

    impl Bytes4 {
        #[inline]
        pub fn as_slice(&self) -> &[u8] {
            &self.bytes[4 - self.len..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(space: PacketNumberSpace, v: u64) -> PacketNumber {
        space.new_packet_number(VarInt::new_saturating(v))
    }

    #[test]
    fn truncate_and_expand_round_trip() {
        let space = PacketNumberSpace::Application;
        let largest_acked = pn(space, 0);
        for value in [0u64, 1, 127, 1000, 100_000] {
            let full = pn(space, value);
            let len = full.truncate(Some(largest_acked));
            let truncated_bytes = len.encode_truncated(full);
            let mut truncated_val = 0u64;
            for &b in truncated_bytes.as_slice() {
                truncated_val = (truncated_val << 8) | b as u64;
            }
            let expanded = PacketNumber::expand(space, Some(largest_acked), truncated_val, len);
            assert_eq!(expanded, full, "failed to round trip {value}");
        }
    }

    #[test]
    #[should_panic]
    fn cross_space_comparison_panics_in_debug() {
        let a = pn(PacketNumberSpace::Initial, 1);
        let b = pn(PacketNumberSpace::Handshake, 1);
        let _ = a == b;
    }
}
