// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! DATA_BLOCKED (RFC 9000 §19.12).

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataBlocked {
    pub data_limit: VarInt,
}

impl DataBlocked {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (data_limit, buffer) = buffer.decode::<VarInt>()?;
        Ok((Self { data_limit }, buffer))
    }
}

impl EncoderValue for DataBlocked {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::DATA_BLOCKED));
        buffer.encode(&self.data_limit);
    }
}
