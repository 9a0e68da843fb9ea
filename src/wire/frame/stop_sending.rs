// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! STOP_SENDING (RFC 9000 §19.5).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StopSending {
    pub stream_id: VarInt,
    pub application_error_code: VarInt,
}

impl StopSending {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;
        let (application_error_code, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                stream_id,
                application_error_code,
            },
            buffer,
        ))
    }
}

impl EncoderValue for StopSending {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::STOP_SENDING));
        buffer.encode(&self.stream_id);
        buffer.encode(&self.application_error_code);
    }
}
