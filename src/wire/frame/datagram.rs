// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! DATAGRAM (RFC 9221); carries unreliable, unordered application data
//! outside of any stream. The core only frames/deframes this -- the
//! embedder owns datagram semantics, mirroring how stream data is
//! handled.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

const LEN_BIT: u8 = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct Datagram<'a> {
    pub data: &'a [u8],
}

impl<'a> Datagram<'a> {
    pub fn decode(tag: u8, buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (data, buffer) = if tag & LEN_BIT != 0 {
            let (slice, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            (slice.into_less_safe_slice(), buffer)
        } else {
            let len = buffer.len();
            let (slice, buffer) = buffer.decode_slice(len)?;
            (slice.into_less_safe_slice(), buffer)
        };
        Ok((Self { data }, buffer))
    }
}

impl<'a> EncoderValue for Datagram<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::DATAGRAM_START | LEN_BIT as u64));
        buffer.encode(&VarInt::try_from(self.data.len()).unwrap_or(VarInt::MAX));
        buffer.write_slice(self.data);
    }
}
