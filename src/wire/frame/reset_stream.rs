// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! RESET_STREAM (RFC 9000 §19.4). Stream state itself is out of core
//! scope (spec.md §1 Non-goals); the frame is still parsed/serialized
//! here so transport-level processing (flow control accounting, ACK
//! bookkeeping) can see it.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResetStream {
    pub stream_id: VarInt,
    pub application_error_code: VarInt,
    pub final_size: VarInt,
}

impl ResetStream {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;
        let (application_error_code, buffer) = buffer.decode::<VarInt>()?;
        let (final_size, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                stream_id,
                application_error_code,
                final_size,
            },
            buffer,
        ))
    }
}

impl EncoderValue for ResetStream {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::RESET_STREAM));
        buffer.encode(&self.stream_id);
        buffer.encode(&self.application_error_code);
        buffer.encode(&self.final_size);
    }
}
