// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! NEW_CONNECTION_ID (RFC 9000 §19.15); feeds the connection-id rotation
//! described in spec.md §4.6.

use super::tag;
use crate::connection::id::{PeerId, StatelessResetToken};
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct NewConnectionId<'a> {
    pub sequence_number: VarInt,
    pub retire_prior_to: VarInt,
    pub connection_id: PeerId,
    pub stateless_reset_token: StatelessResetToken,
    _marker: core::marker::PhantomData<&'a ()>,
}

impl<'a> NewConnectionId<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
        let (retire_prior_to, buffer) = buffer.decode::<VarInt>()?;
        let (len, buffer) = buffer.decode::<u8>()?;
        let (connection_id, buffer) = PeerId::decode_with_len(len as usize, buffer)?;
        let (token_bytes, buffer) = buffer.decode_slice(16)?;
        let mut token = [0u8; 16];
        token.copy_from_slice(token_bytes.into_less_safe_slice());

        if retire_prior_to.as_u64() > sequence_number.as_u64() {
            return Err(DecoderError::InvariantViolation(
                "retire_prior_to must not exceed sequence_number",
            ));
        }

        Ok((
            Self {
                sequence_number,
                retire_prior_to,
                connection_id,
                stateless_reset_token: StatelessResetToken::new(token),
                _marker: core::marker::PhantomData,
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for NewConnectionId<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::new_saturating(tag::NEW_CONNECTION_ID));
        buffer.encode(&self.sequence_number);
        buffer.encode(&self.retire_prior_to);
        buffer.encode(&(self.connection_id.len() as u8));
        buffer.write_slice(self.connection_id.as_bytes());
        buffer.write_slice(self.stateless_reset_token.as_bytes());
    }
}
