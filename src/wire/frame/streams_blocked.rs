// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! STREAMS_BLOCKED (RFC 9000 §19.14), one tag per stream directionality.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamsBlocked {
    pub is_unidirectional: bool,
    pub stream_limit: VarInt,
}

impl StreamsBlocked {
    pub fn decode(is_unidirectional: bool, buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (stream_limit, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                is_unidirectional,
                stream_limit,
            },
            buffer,
        ))
    }
}

impl EncoderValue for StreamsBlocked {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let tag = if self.is_unidirectional {
            tag::STREAMS_BLOCKED_UNI
        } else {
            tag::STREAMS_BLOCKED_BIDI
        };
        buffer.encode(&VarInt::new_saturating(tag));
        buffer.encode(&self.stream_limit);
    }
}
