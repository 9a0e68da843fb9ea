// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! NEW_TOKEN (RFC 9000 §19.7).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct NewToken<'a> {
    pub token: &'a [u8],
}

impl<'a> NewToken<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (token, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
        Ok((
            Self {
                token: token.into_less_safe_slice(),
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for NewToken<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::NEW_TOKEN));
        buffer.encode(&VarInt::try_from(self.token.len()).unwrap_or(VarInt::MAX));
        buffer.write_slice(self.token);
    }
}
