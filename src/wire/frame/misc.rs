// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! PADDING, PING, and HANDSHAKE_DONE: zero-length frames carrying no
//! fields beyond their tag.

use super::tag;
use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Padding;

impl Padding {
    #[inline]
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        Ok((Padding, buffer))
    }
}

impl EncoderValue for Padding {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::from(tag::PADDING as u8));
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Ping;

impl Ping {
    #[inline]
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        Ok((Ping, buffer))
    }
}

impl EncoderValue for Ping {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::from(tag::PING as u8));
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeDone;

impl HandshakeDone {
    #[inline]
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        Ok((HandshakeDone, buffer))
    }
}

impl EncoderValue for HandshakeDone {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&VarInt::from(tag::HANDSHAKE_DONE as u8));
    }
}
