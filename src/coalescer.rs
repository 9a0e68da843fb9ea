// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Coalesced Packet Buffer: stages already-encrypted packets from
//! multiple encryption levels into a single UDP datagram (spec.md §4.5
//! "Coalescing").

use crate::wire::packet::EncryptionLevel;
use crate::creator::MIN_INITIAL_DATAGRAM_LEN;

/// A fully-encrypted packet (header + ciphertext + tag) waiting to be
/// coalesced, tagged with the level it was built at so the buffer can
/// order and pad correctly.
#[derive(Debug)]
struct Entry {
    level: EncryptionLevel,
    bytes: Vec<u8>,
}

/// Accumulates packets across a flush scope and emits them as one
/// datagram, in `Initial, Handshake, ZeroRtt, OneRtt` order (spec.md
/// §4.5). Dropped and rebuilt every flush scope; it is not carried across
/// datagrams.
#[derive(Debug, Default)]
pub struct CoalescedBuffer {
    entries: Vec<Entry>,
    len: usize,
}

/// Returned by [`CoalescedBuffer::push`] when a packet would not fit in
/// the remaining datagram budget; the caller should flush first and push
/// into a fresh buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WouldOverflow;

impl CoalescedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn contains_initial(&self) -> bool {
        self.entries.iter().any(|e| e.level == EncryptionLevel::Initial)
    }

    /// Stages an already-encrypted packet. Fails if it would not fit
    /// within `max_datagram_size`; the caller must flush what it has and
    /// start a new datagram.
    pub fn push(
        &mut self,
        level: EncryptionLevel,
        bytes: Vec<u8>,
        max_datagram_size: usize,
    ) -> Result<(), WouldOverflow> {
        if self.len + bytes.len() > max_datagram_size {
            return Err(WouldOverflow);
        }
        self.len += bytes.len();
        self.entries.push(Entry { level, bytes });
        Ok(())
    }

    /// Builds the datagram, ordering packets by
    /// [`EncryptionLevel::coalescing_order`] and padding to
    /// `max_datagram_size` if an Initial packet is present (spec.md §4.5:
    /// "Coalesced datagrams MUST be padded to max_packet_length if they
    /// contain an Initial"). Returns `None` if nothing was staged.
    pub fn flush(&mut self, max_datagram_size: usize) -> Option<Vec<u8>> {
        if self.entries.is_empty() {
            return None;
        }

        let mut entries = core::mem::take(&mut self.entries);
        self.len = 0;
        entries.sort_by_key(|e| e.level.coalescing_order());

        let contains_initial = entries.iter().any(|e| e.level == EncryptionLevel::Initial);
        let mut datagram = Vec::with_capacity(max_datagram_size);
        for entry in entries {
            datagram.extend_from_slice(&entry.bytes);
        }

        if contains_initial {
            let target = max_datagram_size.max(MIN_INITIAL_DATAGRAM_LEN);
            if datagram.len() < target {
                datagram.resize(target, 0x00);
            }
        }

        Some(datagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_entries_by_coalescing_order() {
        let mut buffer = CoalescedBuffer::new();
        buffer.push(EncryptionLevel::OneRtt, vec![3u8; 10], 2000).unwrap();
        buffer.push(EncryptionLevel::Initial, vec![1u8; 10], 2000).unwrap();
        let datagram = buffer.flush(2000).unwrap();
        assert_eq!(&datagram[..10], &[1u8; 10][..]);
    }

    #[test]
    fn pads_datagram_containing_initial_to_minimum_size() {
        let mut buffer = CoalescedBuffer::new();
        buffer.push(EncryptionLevel::Initial, vec![1u8; 50], 2000).unwrap();
        let datagram = buffer.flush(1500).unwrap();
        assert_eq!(datagram.len(), MIN_INITIAL_DATAGRAM_LEN);
    }

    #[test]
    fn push_rejects_packets_that_would_overflow_the_datagram() {
        let mut buffer = CoalescedBuffer::new();
        buffer.push(EncryptionLevel::Initial, vec![0u8; 1199], 1200).unwrap();
        assert_eq!(buffer.push(EncryptionLevel::OneRtt, vec![0u8; 5], 1200), Err(WouldOverflow));
    }

    #[test]
    fn flush_without_initial_does_not_pad() {
        let mut buffer = CoalescedBuffer::new();
        buffer.push(EncryptionLevel::OneRtt, vec![1u8; 30], 2000).unwrap();
        let datagram = buffer.flush(2000).unwrap();
        assert_eq!(datagram.len(), 30);
    }
}
