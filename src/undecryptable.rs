// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Undecryptable Packet Buffer: holds ciphertext that arrived before
//! its matching key was installed (spec.md §4.4 step 1, §5 "bounded by
//! max_undecryptable_packets").

use crate::crypto::KeyPhase;
use crate::wire::packet::{number::PacketNumber, EncryptionLevel};
use std::net::SocketAddr;

/// A datagram buffered because it failed authentication on first receipt
/// -- either the matching key wasn't installed yet, or the previous key
/// phase has since been discarded out from under a reordered packet.
/// `packet_number`/`key_phase` are the values already recovered from the
/// header, kept so a later replay can retry decryption without
/// re-parsing it (spec.md §4.8 "Process-undecryptable").
#[derive(Debug, Clone)]
pub struct BufferedPacket {
    pub level: EncryptionLevel,
    pub remote_address: SocketAddr,
    pub packet_number: PacketNumber,
    pub key_phase: KeyPhase,
    pub datagram: Vec<u8>,
}

/// A strict FIFO of undecryptable datagrams, bounded by
/// `Config::limits.max_undecryptable_packets`. Full pushes are dropped
/// silently (spec.md treats this as normal back-pressure, not an error).
#[derive(Debug)]
pub struct UndecryptableBuffer {
    packets: Vec<BufferedPacket>,
    capacity: usize,
}

impl UndecryptableBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.packets.len() >= self.capacity
    }

    /// Buffers `packet`. Returns `false` (and drops it) if the buffer is
    /// already at capacity.
    pub fn push(&mut self, packet: BufferedPacket) -> bool {
        if self.is_full() {
            return false;
        }
        self.packets.push(packet);
        true
    }

    /// Drains every packet buffered at `level`, for replay into the
    /// ingress pipeline once the matching decrypter is installed (spec.md
    /// §4.8 "Process-undecryptable" alarm).
    pub fn drain_level(&mut self, level: EncryptionLevel) -> Vec<BufferedPacket> {
        let (matching, rest): (Vec<_>, Vec<_>) =
            self.packets.drain(..).partition(|p| p.level == level);
        self.packets = rest;
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::VarInt;
    use crate::wire::packet::number::PacketNumberSpace;

    fn addr() -> SocketAddr {
        "127.0.0.1:443".parse().unwrap()
    }

    fn pn(v: u64) -> PacketNumber {
        PacketNumberSpace::Application.new_packet_number(VarInt::new_saturating(v))
    }

    #[test]
    fn push_is_rejected_once_capacity_is_reached() {
        let mut buffer = UndecryptableBuffer::new(1);
        assert!(buffer.push(BufferedPacket {
            level: EncryptionLevel::Handshake,
            remote_address: addr(),
            packet_number: pn(1),
            key_phase: KeyPhase::Zero,
            datagram: vec![0u8; 4],
        }));
        assert!(!buffer.push(BufferedPacket {
            level: EncryptionLevel::Handshake,
            remote_address: addr(),
            packet_number: pn(2),
            key_phase: KeyPhase::Zero,
            datagram: vec![0u8; 4],
        }));
    }

    #[test]
    fn drain_level_only_removes_matching_packets() {
        let mut buffer = UndecryptableBuffer::new(8);
        buffer.push(BufferedPacket {
            level: EncryptionLevel::ZeroRtt,
            remote_address: addr(),
            packet_number: pn(1),
            key_phase: KeyPhase::Zero,
            datagram: vec![1u8],
        });
        buffer.push(BufferedPacket {
            level: EncryptionLevel::Handshake,
            remote_address: addr(),
            packet_number: pn(2),
            key_phase: KeyPhase::Zero,
            datagram: vec![2u8],
        });

        let drained = buffer.drain_level(EncryptionLevel::ZeroRtt);
        assert_eq!(drained.len(), 1);
        assert_eq!(buffer.len(), 1);
    }
}
