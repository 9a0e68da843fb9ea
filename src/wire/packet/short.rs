// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Short header (1-RTT) packets (RFC 9000 §17.3). The spin bit and key
//! phase bit live in the header-protected low bits of the first byte, so
//! they are only meaningful after a [`crate::capability::Decrypter`]
//! removes protection.

use crate::connection::id::PeerId;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

pub(crate) const SPIN_BIT_MASK: u8 = 0x20;
pub(crate) const KEY_PHASE_MASK: u8 = 0x04;

#[derive(Debug)]
pub struct ShortHeader<'a> {
    pub first_byte: u8,
    pub destination_connection_id: PeerId,
    /// The still header-protected packet number and payload/ciphertext,
    /// running to the end of the datagram (RFC 9000 §17.3.1: short
    /// header packets carry no length field).
    pub remaining: &'a mut [u8],
}

impl<'a> ShortHeader<'a> {
    /// `dcid_len` is supplied by the endpoint, which must already know
    /// the length of connection IDs it generated (RFC 9000 §17.3: the
    /// short header carries no explicit DCID length).
    pub fn decode(
        first_byte: u8,
        dcid_len: usize,
        buffer: DecoderBufferMut<'a>,
    ) -> DecoderBufferMutResult<'a, Self> {
        let (destination_connection_id, buffer) = PeerId::decode_with_len(dcid_len, buffer)?;
        let len = buffer.len();
        let (remaining, buffer) = buffer.decode_slice(len)?;
        Ok((
            Self {
                first_byte,
                destination_connection_id,
                remaining: remaining.into_less_safe_slice(),
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for ShortHeader<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.first_byte);
        buffer.write_slice(self.destination_connection_id.as_bytes());
        buffer.write_slice(self.remaining);
    }
}
