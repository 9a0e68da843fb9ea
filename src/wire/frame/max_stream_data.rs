// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! MAX_STREAM_DATA (RFC 9000 §19.10).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxStreamData {
    pub stream_id: VarInt,
    pub maximum_stream_data: VarInt,
}

impl MaxStreamData {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;
        let (maximum_stream_data, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                stream_id,
                maximum_stream_data,
            },
            buffer,
        ))
    }
}

impl EncoderValue for MaxStreamData {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::MAX_STREAM_DATA));
        buffer.encode(&self.stream_id);
        buffer.encode(&self.maximum_stream_data);
    }
}
