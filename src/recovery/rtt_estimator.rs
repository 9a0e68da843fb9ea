// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Round-trip time estimation (RFC 9002 §5). Unlike loss detection and
//! congestion control, RTT estimation is a fixed formula rather than a
//! pluggable policy, so it is computed here rather than behind a
//! capability trait (spec.md §4.2 "Recovery Manager" wiring).

use crate::{time::Timestamp, wire::packet::PacketNumberSpace};
use core::cmp::{max, min};
use core::time::Duration;

pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(333);
pub const MIN_RTT: Duration = Duration::from_micros(1);
pub const K_GRANULARITY: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RttEstimator {
    latest_rtt: Duration,
    min_rtt: Duration,
    smoothed_rtt: Duration,
    rttvar: Duration,
    max_ack_delay: Duration,
    first_rtt_sample: Option<Timestamp>,
}

impl Default for RttEstimator {
    fn default() -> Self {
        RttEstimator::new(DEFAULT_INITIAL_RTT)
    }
}

impl RttEstimator {
    #[inline]
    pub fn new(initial_rtt: Duration) -> Self {
        Self::new_with_max_ack_delay(Duration::ZERO, initial_rtt)
    }

    #[inline]
    fn new_with_max_ack_delay(max_ack_delay: Duration, initial_rtt: Duration) -> Self {
        let initial_rtt = initial_rtt.max(MIN_RTT);
        Self {
            latest_rtt: initial_rtt,
            min_rtt: initial_rtt,
            smoothed_rtt: initial_rtt,
            rttvar: initial_rtt / 2,
            max_ack_delay,
            first_rtt_sample: None,
        }
    }

    pub fn for_new_path(&self, initial_rtt: Duration) -> Self {
        Self::new_with_max_ack_delay(self.max_ack_delay, initial_rtt)
    }

    #[inline]
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    #[inline]
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt
    }

    #[inline]
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    #[inline]
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    #[inline]
    pub fn first_rtt_sample(&self) -> Option<Timestamp> {
        self.first_rtt_sample
    }

    #[inline]
    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    #[inline]
    fn rttvar_4x(&self) -> Duration {
        self.rttvar.saturating_mul(4)
    }

    /// The probe-timeout period for `space`, given the current backoff
    /// multiplier (RFC 9002 §6.2.1).
    pub fn pto_period(&self, pto_backoff: u32, space: PacketNumberSpace) -> Duration {
        let mut pto_period = self.smoothed_rtt.as_micros() as u64;
        pto_period += max(self.rttvar_4x().as_micros() as u64, K_GRANULARITY.as_micros() as u64);
        if space.is_application() {
            pto_period += self.max_ack_delay.as_micros() as u64;
        }
        pto_period *= pto_backoff as u64;
        Duration::from_micros(pto_period)
    }

    pub fn on_max_ack_delay(&mut self, max_ack_delay: Duration) {
        self.max_ack_delay = max_ack_delay;
    }

    /// Folds one new RTT sample into the estimate (RFC 9002 §5.2/§5.3).
    pub fn update_rtt(
        &mut self,
        mut ack_delay: Duration,
        rtt_sample: Duration,
        timestamp: Timestamp,
        is_handshake_confirmed: bool,
        space: PacketNumberSpace,
    ) {
        self.latest_rtt = rtt_sample.max(MIN_RTT);

        if self.first_rtt_sample.is_none() {
            self.first_rtt_sample = Some(timestamp);
            self.min_rtt = self.latest_rtt;
            self.smoothed_rtt = self.latest_rtt;
            self.rttvar = self.latest_rtt / 2;
            return;
        }

        self.min_rtt = min(self.min_rtt, self.latest_rtt);

        if space.is_initial() {
            ack_delay = Duration::ZERO;
        }
        if is_handshake_confirmed {
            ack_delay = min(ack_delay, self.max_ack_delay);
        }

        let mut adjusted_rtt = self.latest_rtt;
        if self.min_rtt + ack_delay < self.latest_rtt {
            adjusted_rtt -= ack_delay;
        }

        let rttvar_sample = if self.smoothed_rtt > adjusted_rtt {
            self.smoothed_rtt - adjusted_rtt
        } else {
            adjusted_rtt - self.smoothed_rtt
        };
        self.rttvar = (self.rttvar * 3 + rttvar_sample) / 4;
        self.smoothed_rtt = (self.smoothed_rtt * 7 + adjusted_rtt) / 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_smoothed_and_var() {
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        rtt.update_rtt(
            Duration::ZERO,
            Duration::from_millis(50),
            Timestamp::ZERO,
            true,
            PacketNumberSpace::Application,
        );
        assert_eq!(rtt.latest_rtt(), Duration::from_millis(50));
        assert_eq!(rtt.smoothed_rtt(), Duration::from_millis(50));
        assert_eq!(rtt.rttvar(), Duration::from_millis(25));
    }

    #[test]
    fn min_rtt_tracks_lowest_sample() {
        let mut rtt = RttEstimator::new(Duration::from_millis(100));
        rtt.update_rtt(Duration::ZERO, Duration::from_millis(50), Timestamp::ZERO, true, PacketNumberSpace::Application);
        rtt.update_rtt(Duration::ZERO, Duration::from_millis(20), Timestamp::ZERO, true, PacketNumberSpace::Application);
        assert_eq!(rtt.min_rtt(), Duration::from_millis(20));
    }
}
