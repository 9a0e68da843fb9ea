// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The Received Packet Manager and ACK-ranges bookkeeping (spec.md §4.3).

pub mod ranges;
pub mod received_packet_manager;

pub use ranges::AckRanges;
pub use received_packet_manager::{AckSchedule, ReceivedPacketManager};

use crate::time::Timestamp;
use crate::varint::VarInt;
use crate::wire::frame::ack::{Ack as AckFrame, AckRange as WireAckRange};
use smallvec::SmallVec;

/// Builds an outgoing `ACK` frame from the currently tracked ranges,
/// capped at `max_ranges` additional ranges beyond the first (spec.md
/// §4.3: "the largest range and up to a bounded number of additional
/// ranges").
pub fn build_ack_frame(manager: &ReceivedPacketManager, now: Timestamp) -> Option<AckFrame> {
    let largest_acked = manager.ack_ranges().largest()?;
    let ack_delay = manager.ack_delay(now);

    let mut ack_ranges = SmallVec::new();
    for (start, end) in manager.ack_ranges().iter() {
        ack_ranges.push(WireAckRange {
            smallest: start,
            largest: end,
        });
    }

    Some(AckFrame {
        largest_acked,
        ack_delay: VarInt::new_saturating(ack_delay.as_micros() as u64),
        ack_ranges,
        ecn_counts: None,
    })
}
