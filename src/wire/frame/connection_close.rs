// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! CONNECTION_CLOSE (RFC 9000 §19.19), in its transport and
//! application-layer variants; feeds connection termination (spec.md
//! §3 "Closing"/"Draining").

use super::tag;
use crate::transport::error::Code;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct ConnectionClose<'a> {
    pub is_application_error: bool,
    pub error_code: VarInt,
    /// The frame type that triggered the error; only meaningful (and
    /// only present on the wire) for the transport-level variant.
    pub frame_type: Option<VarInt>,
    pub reason: &'a [u8],
}

impl<'a> ConnectionClose<'a> {
    pub fn decode(is_application_error: bool, buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (error_code, buffer) = buffer.decode::<VarInt>()?;
        let (frame_type, buffer) = if is_application_error {
            (None, buffer)
        } else {
            let (frame_type, buffer) = buffer.decode::<VarInt>()?;
            (Some(frame_type), buffer)
        };
        let (reason, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
        Ok((
            Self {
                is_application_error,
                error_code,
                frame_type,
                reason: reason.into_less_safe_slice(),
            },
            buffer,
        ))
    }

    /// The transport error code this frame carries, regardless of
    /// variant (application-layer codes are opaque to this crate and
    /// reported via [`Code`] too, per spec.md §7's unified error-code
    /// representation).
    pub fn code(&self) -> Code {
        Code(self.error_code)
    }
}

impl<'a> EncoderValue for ConnectionClose<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let tag = if self.is_application_error {
            tag::CONNECTION_CLOSE_APPLICATION
        } else {
            tag::CONNECTION_CLOSE_TRANSPORT
        };
        buffer.encode(&VarInt::new_saturating(tag));
        buffer.encode(&self.error_code);
        if let Some(frame_type) = self.frame_type {
            buffer.encode(&frame_type);
        }
        buffer.encode(&VarInt::try_from(self.reason.len()).unwrap_or(VarInt::MAX));
        buffer.write_slice(self.reason);
    }
}
