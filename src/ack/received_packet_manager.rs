// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-space received-packet tracking and ACK-scheduling policy
//! (spec.md §4.3 "Received Packet Manager and ACK policy").

use super::ranges::AckRanges;
use crate::time::Timestamp;
use core::time::Duration;

const DEFAULT_MAX_ACK_DELAY: Duration = Duration::from_millis(25);
const FIRST_DECIMATION_THRESHOLD: u32 = 10;
const SECOND_DECIMATION_THRESHOLD: u32 = 20;

/// Whether the manager wants an ACK sent now, later, or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckSchedule {
    /// Send an ACK-only (or piggy-backed) packet immediately.
    Immediate,
    /// Arm (or leave armed) the ACK alarm for this deadline.
    Delayed(Timestamp),
    None,
}

#[derive(Debug, Clone)]
pub struct ReceivedPacketManager {
    ack_ranges: AckRanges,
    largest_received_time: Option<Timestamp>,
    ack_alarm: Option<Timestamp>,
    packets_since_last_ack: u32,
    /// Threshold after which an ACK is forced regardless of delay,
    /// either the built-in decimation schedule or a peer `ACK_FREQUENCY`
    /// override (spec.md §4.3 "Exponential ack decimation").
    ack_eliciting_threshold: u32,
    max_ack_delay: Duration,
    reduced_max_ack_delay: bool,
    ack_sent_in_space: bool,
    ack_frequency_override: bool,
}

impl ReceivedPacketManager {
    pub fn new(max_ranges: usize, reduced_max_ack_delay: bool) -> Self {
        Self {
            ack_ranges: AckRanges::new(max_ranges),
            largest_received_time: None,
            ack_alarm: None,
            packets_since_last_ack: 0,
            ack_eliciting_threshold: 1,
            max_ack_delay: DEFAULT_MAX_ACK_DELAY,
            reduced_max_ack_delay,
            ack_sent_in_space: false,
            ack_frequency_override: false,
        }
    }

    pub fn ack_ranges(&self) -> &AckRanges {
        &self.ack_ranges
    }

    pub fn largest_received_time(&self) -> Option<Timestamp> {
        self.largest_received_time
    }

    pub fn ack_delay(&self, now: Timestamp) -> Duration {
        self.largest_received_time
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO)
    }

    /// Applies the peer's advertised RTT to recompute `max_ack_delay`
    /// unless an `ACK_FREQUENCY` frame has already overridden it
    /// (spec.md §4.3: "min(default 25ms, rtt/4) ... may be reduced to
    /// rtt/8 by configuration").
    pub fn on_rtt_update(&mut self, smoothed_rtt: Duration) {
        if self.ack_frequency_override {
            return;
        }
        let divisor = if self.reduced_max_ack_delay { 8 } else { 4 };
        self.max_ack_delay = DEFAULT_MAX_ACK_DELAY.min(smoothed_rtt / divisor);
    }

    /// Applies an `ACK_FREQUENCY` frame's policy (spec.md §4.3: "A peer
    /// ACK_FREQUENCY frame replaces the policy with the advertised
    /// tolerance and delay").
    pub fn on_ack_frequency(&mut self, ack_eliciting_threshold: u32, max_ack_delay: Duration) {
        self.ack_eliciting_threshold = ack_eliciting_threshold.max(1);
        self.max_ack_delay = max_ack_delay;
        self.ack_frequency_override = true;
    }

    /// Records receipt of `packet_number` and decides whether/when an
    /// ACK is owed (spec.md §4.3).
    pub fn on_packet_received(
        &mut self,
        packet_number: u64,
        now: Timestamp,
        ack_eliciting: bool,
        is_post_handshake: bool,
    ) -> AckSchedule {
        let filled_gap = self
            .ack_ranges
            .largest()
            .map(|largest| packet_number > largest + 1 || packet_number < largest)
            .unwrap_or(false);

        self.ack_ranges.insert(packet_number);
        if self
            .largest_received_time
            .map(|_| self.ack_ranges.largest() == Some(packet_number))
            .unwrap_or(true)
        {
            self.largest_received_time = Some(now);
        }

        if !ack_eliciting {
            return AckSchedule::None;
        }

        self.packets_since_last_ack += 1;
        self.update_decimation_threshold();

        let immediate = filled_gap
            || self.packets_since_last_ack >= self.ack_eliciting_threshold
            || (is_post_handshake && !self.ack_sent_in_space);

        if immediate {
            AckSchedule::Immediate
        } else {
            let deadline = now + self.max_ack_delay;
            self.ack_alarm = Some(deadline);
            AckSchedule::Delayed(deadline)
        }
    }

    fn update_decimation_threshold(&mut self) {
        if self.ack_frequency_override {
            return;
        }
        self.ack_eliciting_threshold = if self.packets_since_last_ack >= SECOND_DECIMATION_THRESHOLD {
            4
        } else if self.packets_since_last_ack >= FIRST_DECIMATION_THRESHOLD {
            2
        } else {
            1
        };
    }

    /// Called once an ACK frame has actually been sent.
    pub fn on_ack_sent(&mut self) {
        self.packets_since_last_ack = 0;
        self.ack_alarm = None;
        self.ack_sent_in_space = true;
    }

    pub fn ack_alarm(&self) -> Option<Timestamp> {
        self.ack_alarm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_post_handshake_ack_eliciting_packet_is_immediate() {
        let mut mgr = ReceivedPacketManager::new(32, false);
        let schedule = mgr.on_packet_received(1, Timestamp::ZERO, true, true);
        assert_eq!(schedule, AckSchedule::Immediate);
    }

    #[test]
    fn filling_a_gap_forces_immediate_ack() {
        let mut mgr = ReceivedPacketManager::new(32, false);
        mgr.on_packet_received(5, Timestamp::ZERO, true, false);
        mgr.on_ack_sent();
        let schedule = mgr.on_packet_received(4, Timestamp::ZERO, true, false);
        assert_eq!(schedule, AckSchedule::Immediate);
    }

    #[test]
    fn ack_frequency_override_replaces_threshold() {
        let mut mgr = ReceivedPacketManager::new(32, false);
        mgr.on_ack_frequency(5, Duration::from_millis(10));
        for pn in 0..4 {
            let schedule = mgr.on_packet_received(pn, Timestamp::ZERO, true, false);
            assert!(matches!(schedule, AckSchedule::Delayed(_)));
        }
    }
}
