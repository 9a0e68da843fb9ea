// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! ACK_FREQUENCY, the experimental extension frame spec.md §4.3 and §6
//! call out as a non-RFC-9000 addition (draft-ietf-quic-ack-frequency).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AckFrequency {
    pub sequence_number: VarInt,
    pub ack_eliciting_threshold: VarInt,
    pub request_max_ack_delay: VarInt,
    pub reordering_threshold: VarInt,
}

impl AckFrequency {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
        let (ack_eliciting_threshold, buffer) = buffer.decode::<VarInt>()?;
        let (request_max_ack_delay, buffer) = buffer.decode::<VarInt>()?;
        let (reordering_threshold, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                sequence_number,
                ack_eliciting_threshold,
                request_max_ack_delay,
                reordering_threshold,
            },
            buffer,
        ))
    }
}

impl EncoderValue for AckFrequency {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::ACK_FREQUENCY));
        buffer.encode(&self.sequence_number);
        buffer.encode(&self.ack_eliciting_threshold);
        buffer.encode(&self.request_max_ack_delay);
        buffer.encode(&self.reordering_threshold);
    }
}
