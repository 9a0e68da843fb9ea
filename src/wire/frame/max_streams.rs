// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! MAX_STREAMS (RFC 9000 §19.11), one tag per stream directionality.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxStreams {
    pub is_unidirectional: bool,
    pub maximum_streams: VarInt,
}

impl MaxStreams {
    pub fn decode(is_unidirectional: bool, buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (maximum_streams, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                is_unidirectional,
                maximum_streams,
            },
            buffer,
        ))
    }
}

impl EncoderValue for MaxStreams {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let tag = if self.is_unidirectional {
            tag::MAX_STREAMS_UNI
        } else {
            tag::MAX_STREAMS_BIDI
        };
        buffer.encode(&VarInt::new_saturating(tag));
        buffer.encode(&self.maximum_streams);
    }
}
