// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! RETIRE_CONNECTION_ID (RFC 9000 §19.16).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetireConnectionId {
    pub sequence_number: VarInt,
}

impl RetireConnectionId {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
        Ok((Self { sequence_number }, buffer))
    }
}

impl EncoderValue for RetireConnectionId {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::RETIRE_CONNECTION_ID));
        buffer.encode(&self.sequence_number);
    }
}
