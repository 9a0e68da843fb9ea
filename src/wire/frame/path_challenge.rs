// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! PATH_CHALLENGE (RFC 9000 §19.17); drives path validation (spec.md
//! §4.7).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathChallenge {
    pub data: [u8; 8],
}

impl PathChallenge {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (slice, buffer) = buffer.decode_slice(8)?;
        let mut data = [0u8; 8];
        data.copy_from_slice(slice.into_less_safe_slice());
        Ok((Self { data }, buffer))
    }
}

impl EncoderValue for PathChallenge {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::PATH_CHALLENGE));
        buffer.write_slice(&self.data);
    }
}
