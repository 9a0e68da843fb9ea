// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! CRYPTO (RFC 9000 §19.6): carries handshake bytes in every
//! packet-number space; spec.md §4.4 routes its payload to the
//! TLS/handshake implementation via the embedder, not this crate.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct Crypto<'a> {
    pub offset: VarInt,
    pub data: &'a [u8],
}

impl<'a> Crypto<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (offset, buffer) = buffer.decode::<VarInt>()?;
        let (data, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
        Ok((
            Self {
                offset,
                data: data.into_less_safe_slice(),
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for Crypto<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::CRYPTO));
        buffer.encode(&self.offset);
        buffer.encode(&VarInt::try_from(self.data.len()).unwrap_or(VarInt::MAX));
        buffer.write_slice(self.data);
    }
}
