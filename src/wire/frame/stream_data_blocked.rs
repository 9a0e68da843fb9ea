// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! STREAM_DATA_BLOCKED (RFC 9000 §19.13).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamDataBlocked {
    pub stream_id: VarInt,
    pub stream_data_limit: VarInt,
}

impl StreamDataBlocked {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;
        let (stream_data_limit, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                stream_id,
                stream_data_limit,
            },
            buffer,
        ))
    }
}

impl EncoderValue for StreamDataBlocked {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::STREAM_DATA_BLOCKED));
        buffer.encode(&self.stream_id);
        buffer.encode(&self.stream_data_limit);
    }
}
