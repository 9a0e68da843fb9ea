// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! ACK and ACK_ECN frames (RFC 9000 §19.3; spec.md §4.3 "Ack Manager").

use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};
use smallvec::SmallVec;

/// An inclusive range of acknowledged packet numbers, as reconstructed
/// from a frame's gap/length encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AckRange {
    pub smallest: u64,
    pub largest: u64,
}

/// Explicit Congestion Notification counters (RFC 9000 §19.3.2).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0: VarInt,
    pub ect1: VarInt,
    pub ce: VarInt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    pub largest_acked: u64,
    pub ack_delay: VarInt,
    /// Ranges in descending order of packet number, as sent on the wire.
    pub ack_ranges: SmallVec<[AckRange; 4]>,
    pub ecn_counts: Option<EcnCounts>,
}

impl Ack {
    pub fn decode(with_ecn: bool, buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (largest_acked, buffer) = buffer.decode::<VarInt>()?;
        let (ack_delay, buffer) = buffer.decode::<VarInt>()?;
        let (range_count, buffer) = buffer.decode::<VarInt>()?;
        let (first_range, buffer) = buffer.decode::<VarInt>()?;

        let mut ack_ranges = SmallVec::new();
        let mut largest = largest_acked.as_u64();
        let smallest = largest
            .checked_sub(first_range.as_u64())
            .ok_or(DecoderError::InvariantViolation("ack range underflows largest acked"))?;
        ack_ranges.push(AckRange { smallest, largest });
        let mut next_largest = smallest;

        let mut buffer = buffer;
        for _ in 0..range_count.as_u64() {
            let (gap, next) = buffer.decode::<VarInt>()?;
            let (len, next) = next.decode::<VarInt>()?;
            buffer = next;

            largest = next_largest
                .checked_sub(gap.as_u64())
                .and_then(|v| v.checked_sub(2))
                .ok_or(DecoderError::InvariantViolation("ack gap underflows"))?;
            let smallest = largest
                .checked_sub(len.as_u64())
                .ok_or(DecoderError::InvariantViolation("ack range length underflows"))?;
            ack_ranges.push(AckRange { smallest, largest });
            next_largest = smallest;
        }

        let (ecn_counts, buffer) = if with_ecn {
            let (ect0, buffer) = buffer.decode::<VarInt>()?;
            let (ect1, buffer) = buffer.decode::<VarInt>()?;
            let (ce, buffer) = buffer.decode::<VarInt>()?;
            (Some(EcnCounts { ect0, ect1, ce }), buffer)
        } else {
            (None, buffer)
        };

        Ok((
            Self {
                largest_acked: largest_acked.as_u64(),
                ack_delay,
                ack_ranges,
                ecn_counts,
            },
            buffer,
        ))
    }
}

impl EncoderValue for Ack {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let tag = if self.ecn_counts.is_some() {
            super::tag::ACK_ECN
        } else {
            super::tag::ACK
        };
        buffer.encode(&VarInt::new_saturating(tag));
        buffer.encode(&VarInt::new_saturating(self.largest_acked));
        buffer.encode(&self.ack_delay);
        buffer.encode(&VarInt::new_saturating((self.ack_ranges.len() - 1) as u64));

        let first = &self.ack_ranges[0];
        buffer.encode(&VarInt::new_saturating(first.largest - first.smallest));

        let mut prev_smallest = first.smallest;
        for range in &self.ack_ranges[1..] {
            let gap = prev_smallest - range.largest - 2;
            let len = range.largest - range.smallest;
            buffer.encode(&VarInt::new_saturating(gap));
            buffer.encode(&VarInt::new_saturating(len));
            prev_smallest = range.smallest;
        }

        if let Some(ecn) = &self.ecn_counts {
            buffer.encode(&ecn.ect0);
            buffer.encode(&ecn.ect1);
            buffer.encode(&ecn.ce);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s2n_codec::{EncoderBuffer, DecoderBufferMut};

    #[test]
    fn single_range_round_trips() {
        let ack = Ack {
            largest_acked: 100,
            ack_delay: VarInt::new_saturating(42),
            ack_ranges: SmallVec::from_slice(&[AckRange { smallest: 90, largest: 100 }]),
            ecn_counts: None,
        };
        let mut bytes = vec![0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&ack);
        let len = encoder.len();

        let buffer = DecoderBufferMut::new(&mut bytes[..len]);
        let (tag, buffer) = buffer.decode::<VarInt>().unwrap();
        assert_eq!(tag.as_u64(), super::super::tag::ACK);
        let (decoded, _) = Ack::decode(false, buffer).unwrap();
        assert_eq!(decoded, ack);
    }

    #[test]
    fn multi_range_round_trips() {
        let ack = Ack {
            largest_acked: 100,
            ack_delay: VarInt::new_saturating(0),
            ack_ranges: SmallVec::from_slice(&[
                AckRange { smallest: 98, largest: 100 },
                AckRange { smallest: 50, largest: 60 },
            ]),
            ecn_counts: Some(EcnCounts {
                ect0: VarInt::new_saturating(1),
                ect1: VarInt::new_saturating(0),
                ce: VarInt::new_saturating(0),
            }),
        };
        let mut bytes = vec![0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&ack);
        let len = encoder.len();

        let buffer = DecoderBufferMut::new(&mut bytes[..len]);
        let (tag, buffer) = buffer.decode::<VarInt>().unwrap();
        assert_eq!(tag.as_u64(), super::super::tag::ACK_ECN);
        let (decoded, _) = Ack::decode(true, buffer).unwrap();
        assert_eq!(decoded, ack);
    }
}
