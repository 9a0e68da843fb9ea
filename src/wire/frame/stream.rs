// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! STREAM (RFC 9000 §19.8). Stream multiplexing/flow-control state is
//! out of core scope (spec.md §1 Non-goals); this crate only needs to
//! parse and re-serialize the frame so the embedder can route its
//! payload to whatever owns stream state.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

const OFF_BIT: u8 = 0x04;
const LEN_BIT: u8 = 0x02;
const FIN_BIT: u8 = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct Stream<'a> {
    pub stream_id: VarInt,
    pub offset: VarInt,
    pub data: &'a [u8],
    pub is_fin: bool,
}

impl<'a> Stream<'a> {
    pub fn decode(tag: u8, buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let bits = tag & 0x7;
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;

        let (offset, buffer) = if bits & OFF_BIT != 0 {
            buffer.decode::<VarInt>()?
        } else {
            (VarInt::ZERO, buffer)
        };

        let (data, buffer) = if bits & LEN_BIT != 0 {
            let (slice, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            (slice.into_less_safe_slice(), buffer)
        } else {
            let len = buffer.len();
            let (slice, buffer) = buffer.decode_slice(len)?;
            (slice.into_less_safe_slice(), buffer)
        };

        Ok((
            Self {
                stream_id,
                offset,
                data,
                is_fin: bits & FIN_BIT != 0,
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for Stream<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let mut bits = OFF_BIT | LEN_BIT;
        if self.is_fin {
            bits |= FIN_BIT;
        }
        buffer.encode(&VarInt::new_saturating(tag::STREAM_START | bits as u64));
        buffer.encode(&self.stream_id);
        buffer.encode(&self.offset);
        buffer.encode(&VarInt::try_from(self.data.len()).unwrap_or(VarInt::MAX));
        buffer.write_slice(self.data);
    }
}
