// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet headers (spec.md §4.1 "Packet Framer" ingress side, §4.5
//! egress side). Parsing stops at the header-protection boundary: the
//! packet number and frame payload stay opaque bytes until a
//! [`crate::capability::Decrypter`] removes protection and the AEAD
//! authenticates them.

pub mod long;
pub mod number;
pub mod short;

pub use long::{LongHeader, PacketType};
pub use number::{EncryptionLevel, PacketNumber, PacketNumberLen, PacketNumberSpace};
pub use short::ShortHeader;

use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

const HEADER_FORM_MASK: u8 = 0x80;
const FIXED_BIT_MASK: u8 = 0x40;

/// The IETF QUIC v1 version number (RFC 9000 §15).
pub const QUIC_VERSION_1: u32 = 0x0000_0001;

/// A decoded packet header: either a long header (Initial / 0-RTT /
/// Handshake / Retry) or a short header (1-RTT). Version Negotiation
/// packets are long-headers with `version == 0`, distinguished by
/// [`LongHeader::version`] rather than a separate variant (RFC 9000
/// §17.2.1) -- their "packet type" bits are unused and must not be
/// interpreted.
#[derive(Debug)]
pub enum Header<'a> {
    Long(LongHeader<'a>),
    Short(ShortHeader<'a>),
}

impl<'a> Header<'a> {
    pub fn decode(
        buffer: DecoderBufferMut<'a>,
        short_header_dcid_len: usize,
    ) -> DecoderBufferMutResult<'a, Self> {
        let first_byte = buffer.peek_byte(0)?;

        if first_byte & FIXED_BIT_MASK == 0 && first_byte & HEADER_FORM_MASK == 0 {
            return Err(DecoderError::InvariantViolation(
                "fixed bit must be set on packets without header protection applied to it",
            ));
        }

        if first_byte & HEADER_FORM_MASK != 0 {
            let (first_byte, buffer) = buffer.decode::<u8>()?;
            let (header, buffer) = LongHeader::decode(first_byte, buffer)?;
            Ok((Header::Long(header), buffer))
        } else {
            let (first_byte, buffer) = buffer.decode::<u8>()?;
            let (header, buffer) = ShortHeader::decode(first_byte, short_header_dcid_len, buffer)?;
            Ok((Header::Short(header), buffer))
        }
    }

    pub fn destination_connection_id(&self) -> &[u8] {
        match self {
            Header::Long(h) => h.destination_connection_id.as_bytes(),
            Header::Short(h) => h.destination_connection_id.as_bytes(),
        }
    }

    pub fn is_version_negotiation(&self) -> bool {
        matches!(self, Header::Long(h) if h.version == 0)
    }
}
