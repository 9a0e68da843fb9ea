// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Long header packets (RFC 9000 §17.2): Initial, 0-RTT, Handshake,
//! Retry. Only the public header is parsed here -- the packet number and
//! payload remain header-protected/encrypted until a
//! [`crate::capability::Decrypter`] removes protection (spec.md §4.4).

use crate::connection::id::PeerId;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

pub(crate) const PACKET_TYPE_MASK: u8 = 0x30;
const PACKET_TYPE_OFFSET: u8 = 4;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Initial = 0x0,
    ZeroRtt = 0x1,
    Handshake = 0x2,
    Retry = 0x3,
}

impl PacketType {
    pub const fn into_bits(self) -> u8 {
        ((self as u8) << PACKET_TYPE_OFFSET) & PACKET_TYPE_MASK
    }

    pub fn from_bits(bits: u8) -> Self {
        match (bits & PACKET_TYPE_MASK) >> PACKET_TYPE_OFFSET {
            0x0 => PacketType::Initial,
            0x1 => PacketType::ZeroRtt,
            0x2 => PacketType::Handshake,
            _ => PacketType::Retry,
        }
    }
}

/// The long header's public (non-protected) fields, plus the
/// still-protected remainder of the packet: the low 4 type-specific bits
/// of the first byte, the truncated packet number, and the payload.
#[derive(Debug)]
pub struct LongHeader<'a> {
    pub packet_type: PacketType,
    pub first_byte: u8,
    pub version: u32,
    pub destination_connection_id: PeerId,
    pub source_connection_id: PeerId,
    /// Present only on Initial packets (RFC 9000 §17.2.2).
    pub token: Option<&'a [u8]>,
    /// The retry integrity tag, present only on Retry packets (RFC 9000
    /// §17.2.5).
    pub retry_tag: Option<&'a [u8]>,
    /// Length of the still-protected packet-number + payload region, as
    /// declared on the wire (absent for Retry, which has no length
    /// field).
    pub remaining: &'a mut [u8],
}

impl<'a> LongHeader<'a> {
    /// Decodes everything up to (but not including) the protected
    /// packet-number field. `first_byte` must already have been peeked by
    /// the caller to route to this function.
    pub fn decode(first_byte: u8, buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let packet_type = PacketType::from_bits(first_byte);

        let (version, buffer) = buffer.decode::<u32>()?;

        let (dcid_len, buffer) = buffer.decode::<u8>()?;
        let (destination_connection_id, buffer) =
            PeerId::decode_with_len(dcid_len as usize, buffer)?;

        let (scid_len, buffer) = buffer.decode::<u8>()?;
        let (source_connection_id, buffer) = PeerId::decode_with_len(scid_len as usize, buffer)?;

        let (token, buffer) = if packet_type == PacketType::Initial {
            let (token, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            (Some(token.into_less_safe_slice() as &[u8]), buffer)
        } else {
            (None, buffer)
        };

        if packet_type == PacketType::Retry {
            let total = buffer.len();
            let tag_len = 16usize.min(total);
            let (remaining, buffer) = buffer.decode_slice(total - tag_len)?;
            let (tag, buffer) = buffer.decode_slice(tag_len)?;
            return Ok((
                Self {
                    packet_type,
                    first_byte,
                    version,
                    destination_connection_id,
                    source_connection_id,
                    token: None,
                    retry_tag: Some(tag.into_less_safe_slice() as &[u8]),
                    remaining: remaining.into_less_safe_slice(),
                },
                buffer,
            ));
        }

        let (payload_len, buffer) = buffer.decode::<VarInt>()?;
        let len = usize::try_from(payload_len).map_err(|_| DecoderError::LengthCapacityExceeded)?;
        let (remaining, buffer) = buffer.decode_slice(len)?;

        Ok((
            Self {
                packet_type,
                first_byte,
                version,
                destination_connection_id,
                source_connection_id,
                token,
                retry_tag: None,
                remaining: remaining.into_less_safe_slice(),
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for LongHeader<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.first_byte);
        buffer.encode(&self.version);
        buffer.encode(&(self.destination_connection_id.len() as u8));
        buffer.write_slice(self.destination_connection_id.as_bytes());
        buffer.encode(&(self.source_connection_id.len() as u8));
        buffer.write_slice(self.source_connection_id.as_bytes());
        if let Some(token) = self.token {
            buffer.encode(&VarInt::try_from(token.len()).unwrap_or(VarInt::MAX));
            buffer.write_slice(token);
        }
        if self.retry_tag.is_none() {
            buffer.encode(&VarInt::try_from(self.remaining.len()).unwrap_or(VarInt::MAX));
        }
        buffer.write_slice(self.remaining);
        if let Some(tag) = self.retry_tag {
            buffer.write_slice(tag);
        }
    }
}
