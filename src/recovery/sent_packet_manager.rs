// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-space table of in-flight sent packets (spec.md §4.2 "Sent Packet
//! Manager"). `Meta` is caller-chosen bookkeeping attached to every sent
//! packet (e.g. the list of frames carried, for retransmission) --
//! parameterizing over it keeps this table free of any dependency on
//! the frame types above it.

use crate::time::Timestamp;
use crate::wire::packet::PacketNumber;
use alloc::collections::BTreeMap;

/// One record in the table: everything needed to account for the packet
/// once it is acked or declared lost (spec.md §3 "SentPacket").
#[derive(Debug, Clone)]
pub struct SentPacketInfo<Meta> {
    pub time_sent: Timestamp,
    pub bytes: usize,
    pub ack_eliciting: bool,
    pub in_flight: bool,
    pub meta: Meta,
}

/// The in-flight packets for a single packet-number space, keyed by
/// packet number (spec.md invariant P4: numbers are strictly increasing
/// and form a subset of `[first_sent, largest_sent]`).
#[derive(Debug)]
pub struct SentPacketTable<Meta> {
    packets: BTreeMap<u64, SentPacketInfo<Meta>>,
    bytes_in_flight: usize,
    largest_sent_packet: Option<PacketNumber>,
}

impl<Meta> Default for SentPacketTable<Meta> {
    fn default() -> Self {
        Self {
            packets: BTreeMap::new(),
            bytes_in_flight: 0,
            largest_sent_packet: None,
        }
    }
}

impl<Meta> SentPacketTable<Meta> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_in_flight(&self) -> usize {
        self.bytes_in_flight
    }

    pub fn largest_sent_packet(&self) -> Option<PacketNumber> {
        self.largest_sent_packet
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Records a freshly sent packet (spec.md §4.2 `OnPacketSent`).
    pub fn on_packet_sent(&mut self, packet_number: PacketNumber, info: SentPacketInfo<Meta>) {
        if info.in_flight {
            self.bytes_in_flight += info.bytes;
        }
        self.largest_sent_packet = Some(
            self.largest_sent_packet
                .map(|largest| largest.max(packet_number))
                .unwrap_or(packet_number),
        );
        self.packets.insert(packet_number.as_u64(), info);
    }

    /// Removes `packet_number` (because it was acked or declared lost),
    /// returning its info if it was still tracked.
    pub fn remove(&mut self, packet_number: u64) -> Option<SentPacketInfo<Meta>> {
        let info = self.packets.remove(&packet_number)?;
        if info.in_flight {
            self.bytes_in_flight = self.bytes_in_flight.saturating_sub(info.bytes);
        }
        Some(info)
    }

    pub fn get(&self, packet_number: u64) -> Option<&SentPacketInfo<Meta>> {
        self.packets.get(&packet_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &SentPacketInfo<Meta>)> {
        self.packets.iter().map(|(pn, info)| (*pn, info))
    }

    /// Removes and returns every packet at or below `largest_acked` whose
    /// number appears in `acked`, in ascending order, for RTT/loss
    /// processing (spec.md §4.2 `OnAckFrame`).
    pub fn drain_acked(&mut self, acked: impl Iterator<Item = u64>) -> alloc::vec::Vec<(u64, SentPacketInfo<Meta>)> {
        let mut out = alloc::vec::Vec::new();
        for pn in acked {
            if let Some(info) = self.remove(pn) {
                out.push((pn, info));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::packet::PacketNumberSpace;
    use crate::varint::VarInt;

    fn pn(v: u64) -> PacketNumber {
        PacketNumberSpace::Application.new_packet_number(VarInt::new_saturating(v))
    }

    fn info(bytes: usize) -> SentPacketInfo<()> {
        SentPacketInfo {
            time_sent: Timestamp::ZERO,
            bytes,
            ack_eliciting: true,
            in_flight: true,
            meta: (),
        }
    }

    #[test]
    fn tracks_bytes_in_flight() {
        let mut table = SentPacketTable::new();
        table.on_packet_sent(pn(1), info(100));
        table.on_packet_sent(pn(2), info(200));
        assert_eq!(table.bytes_in_flight(), 300);

        table.remove(1);
        assert_eq!(table.bytes_in_flight(), 200);
    }

    #[test]
    fn largest_sent_packet_tracks_max() {
        let mut table = SentPacketTable::new();
        table.on_packet_sent(pn(5), info(10));
        table.on_packet_sent(pn(3), info(10));
        assert_eq!(table.largest_sent_packet(), Some(pn(5)));
    }
}
