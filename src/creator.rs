// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Packet Creator: accumulates frames for one encryption level into a
//! single outgoing packet (spec.md §4.1).
//!
//! Header protection and AEAD sealing happen one layer up, in
//! [`crate::connection`], via the [`crate::capability::Encrypter`]
//! capability -- this module only serializes the frame payload and hands
//! back a [`CreatedPacket`] describing what packet number was used and
//! what the payload contains.

use crate::wire::frame::Frame;
use crate::wire::packet::number::{PacketNumber, PacketNumberSpace};
use s2n_codec::EncoderValue;

/// Minimum UDP datagram size a client must pad an address-validating
/// Initial packet up to (RFC 9000 §14.1).
pub const MIN_INITIAL_DATAGRAM_LEN: usize = 1200;

/// A flushed packet, ready for header construction and encryption by the
/// caller.
#[derive(Debug)]
pub struct CreatedPacket {
    pub packet_number: PacketNumber,
    pub payload: Vec<u8>,
    pub ack_eliciting: bool,
    pub contains_crypto: bool,
    pub is_mtu_probe: bool,
}

/// Accumulates frames into a single packet at a fixed encryption level.
/// One instance exists per encryption level that still has active keys
/// (spec.md §4.1).
#[derive(Debug)]
pub struct PacketCreator {
    space: PacketNumberSpace,
    next_packet_number: u64,
    skip_next_packet_number: bool,
    max_packet_length: usize,
    buffer: Vec<u8>,
    ack_eliciting: bool,
    contains_crypto: bool,
    mtu_probe: bool,
}

impl PacketCreator {
    pub fn new(space: PacketNumberSpace, max_packet_length: usize) -> Self {
        Self {
            space,
            next_packet_number: 0,
            skip_next_packet_number: false,
            max_packet_length,
            buffer: Vec::new(),
            ack_eliciting: false,
            contains_crypto: false,
            mtu_probe: false,
        }
    }

    pub fn space(&self) -> PacketNumberSpace {
        self.space
    }

    pub fn set_max_packet_length(&mut self, max_packet_length: usize) {
        self.max_packet_length = max_packet_length;
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether `frame` would fit in the remaining room of the current
    /// packet, given `header_len` bytes already spoken for by the packet
    /// header and AEAD tag.
    pub fn has_room_for(&self, frame: &Frame<'_>, header_len: usize) -> bool {
        self.buffer.len() + header_len + frame.encoding_size() <= self.max_packet_length
    }

    /// Appends `frame` to the packet if there is room, even after
    /// accounting for `header_len` bytes reserved for the eventual packet
    /// header and AEAD tag. Returns `false` if it doesn't fit -- the
    /// caller should flush and retry in a fresh packet (spec.md §4.1
    /// `AddControlFrame`).
    pub fn add_frame(&mut self, frame: &Frame<'_>, header_len: usize) -> bool {
        if !self.has_room_for(frame, header_len) {
            return false;
        }

        self.buffer.extend_from_slice(&frame.encode_to_vec());

        if frame.ack_elicitation().is_ack_eliciting() {
            self.ack_eliciting = true;
        }
        if matches!(frame, Frame::Crypto(_)) {
            self.contains_crypto = true;
        }
        true
    }

    /// Fills the packet with PADDING frames up to `target_len` bytes of
    /// payload. Used for the client's address-validating Initial, which
    /// must reach [`MIN_INITIAL_DATAGRAM_LEN`] once coalesced into its
    /// datagram (spec.md §4.1).
    pub fn pad_to(&mut self, target_len: usize) {
        if target_len > self.max_packet_length {
            return;
        }
        while self.buffer.len() < target_len {
            self.buffer.push(0x00);
        }
    }

    /// Whether a PTO has just fired; per spec.md §6 kPTOS, the next packet
    /// number in this space is skipped to help detect optimistic ACKs.
    pub fn on_pto_triggered(&mut self) {
        self.skip_next_packet_number = true;
    }

    /// Marks the packet currently being built as an MTU probe, so the
    /// caller can track its ack/loss outcome against [`crate::path::mtu::MtuController`]
    /// (spec.md §4.8 "MTU discovery").
    pub fn mark_mtu_probe(&mut self) {
        self.mtu_probe = true;
    }

    fn advance_packet_number(&mut self) -> PacketNumber {
        if self.skip_next_packet_number {
            self.next_packet_number += 1;
            self.skip_next_packet_number = false;
        }
        let pn = PacketNumber::from_varint(
            crate::varint::VarInt::new_saturating(self.next_packet_number),
            self.space,
        );
        self.next_packet_number += 1;
        pn
    }

    /// Serializes the batched frames and returns the packet to be header-
    /// wrapped and encrypted by the caller. Returns `None` if nothing has
    /// been added since the last flush (spec.md §4.1 `FlushCurrentPacket`).
    pub fn flush(&mut self) -> Option<CreatedPacket> {
        if self.buffer.is_empty() {
            return None;
        }

        let packet_number = self.advance_packet_number();
        let payload = core::mem::take(&mut self.buffer);
        let ack_eliciting = core::mem::take(&mut self.ack_eliciting);
        let contains_crypto = core::mem::take(&mut self.contains_crypto);
        let is_mtu_probe = core::mem::take(&mut self.mtu_probe);

        Some(CreatedPacket {
            packet_number,
            payload,
            ack_eliciting,
            contains_crypto,
            is_mtu_probe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::misc::Ping;

    #[test]
    fn flush_returns_none_when_nothing_was_added() {
        let mut creator = PacketCreator::new(PacketNumberSpace::Application, 1200);
        assert!(creator.flush().is_none());
    }

    #[test]
    fn flush_assigns_sequential_packet_numbers() {
        let mut creator = PacketCreator::new(PacketNumberSpace::Application, 1200);
        creator.add_frame(&Frame::Ping(Ping::default()), 16);
        let first = creator.flush().unwrap();
        creator.add_frame(&Frame::Ping(Ping::default()), 16);
        let second = creator.flush().unwrap();
        assert_eq!(first.packet_number.as_u64() + 1, second.packet_number.as_u64());
    }

    #[test]
    fn pto_trigger_skips_one_packet_number() {
        let mut creator = PacketCreator::new(PacketNumberSpace::Application, 1200);
        creator.add_frame(&Frame::Ping(Ping::default()), 16);
        let first = creator.flush().unwrap();
        creator.on_pto_triggered();
        creator.add_frame(&Frame::Ping(Ping::default()), 16);
        let second = creator.flush().unwrap();
        assert_eq!(second.packet_number.as_u64(), first.packet_number.as_u64() + 2);
    }

    #[test]
    fn pad_to_grows_payload_with_padding_bytes() {
        let mut creator = PacketCreator::new(PacketNumberSpace::Initial, 1200);
        creator.add_frame(&Frame::Ping(Ping::default()), 16);
        creator.pad_to(1100);
        assert_eq!(creator.len(), 1100);
    }
}
