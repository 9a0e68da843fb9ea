// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Idle-timeout tracking and the path-degrading/blackhole escalation
//! (spec.md §4.8 "Idle" and "Blackhole detector" rows).

use crate::time::Timestamp;
use core::time::Duration;

/// Tracks the idle timeout (spec.md §4.8: "Any packet sent AND received"
/// rearms it; firing closes the connection).
#[derive(Debug, Clone)]
pub struct IdleDetector {
    timeout: Duration,
    last_activity: Timestamp,
    ignore_small_sends: bool,
}

impl IdleDetector {
    pub fn new(timeout: Duration, ignore_small_sends: bool) -> Self {
        Self {
            timeout,
            last_activity: Timestamp::ZERO,
            ignore_small_sends,
        }
    }

    /// Rearms the timer from a packet sent or received at `now`. `bytes` is
    /// the size of a send so `ignore_small_sends_for_idle_timeout` (spec.md
    /// §6 kFIDT) can be honored; receives should pass `usize::MAX`.
    pub fn on_activity(&mut self, now: Timestamp, bytes: usize) {
        const SMALL_SEND_THRESHOLD: usize = 16;
        if self.ignore_small_sends && bytes < SMALL_SEND_THRESHOLD {
            return;
        }
        self.last_activity = now;
    }

    pub fn deadline(&self) -> Timestamp {
        self.last_activity + self.timeout
    }

    /// Lowers the idle timeout to the smaller of the locally configured
    /// value and the peer's advertised `max_idle_timeout` (RFC 9000
    /// §10.1: "the minimum of the two values"). A zero `peer_timeout`
    /// means the peer didn't advertise one and is ignored.
    pub fn apply_peer_max_idle_timeout(&mut self, peer_timeout: Duration) {
        if peer_timeout.is_zero() {
            return;
        }
        self.timeout = self.timeout.min(peer_timeout);
    }

    pub fn has_expired(&self, now: Timestamp) -> bool {
        now >= self.deadline()
    }
}

/// The three-stage escalation run by the blackhole detector (spec.md §4.8:
/// "Fire in order: path-degrading callback, blackhole close, path-MTU
/// reduction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackholeStage {
    PathDegrading,
    Close,
    MtuReduction,
}

/// Escalates through [`BlackholeStage`]s as consecutive PTOs accumulate
/// without forward progress. `client_only` mirrors spec.md §6 kCBHD: on a
/// server with that flag set, the detector never escalates.
#[derive(Debug, Clone)]
pub struct BlackholeDetector {
    path_degrading_timeout: Duration,
    blackhole_timeout: Duration,
    started_at: Option<Timestamp>,
    stage: Option<BlackholeStage>,
    enabled: bool,
}

impl BlackholeDetector {
    pub fn new(path_degrading_timeout: Duration, blackhole_timeout: Duration, enabled: bool) -> Self {
        Self {
            path_degrading_timeout,
            blackhole_timeout,
            started_at: None,
            stage: None,
            enabled,
        }
    }

    /// Called when a PTO fires with no prior unacknowledged probe; starts
    /// (or continues) the degrading clock.
    pub fn on_pto_fired(&mut self, now: Timestamp) {
        if !self.enabled {
            return;
        }
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Called when a packet is newly acknowledged; forward progress clears
    /// the escalation.
    pub fn on_packet_acked(&mut self) {
        self.started_at = None;
        self.stage = None;
    }

    /// Advances and returns the next stage to fire, if `now` has crossed
    /// its threshold and it hasn't already been delivered.
    pub fn poll(&mut self, now: Timestamp) -> Option<BlackholeStage> {
        if !self.enabled {
            return None;
        }
        let started_at = self.started_at?;
        let elapsed = now.saturating_duration_since(started_at);

        let next_stage = match self.stage {
            None if elapsed >= self.path_degrading_timeout => Some(BlackholeStage::PathDegrading),
            Some(BlackholeStage::PathDegrading) if elapsed >= self.blackhole_timeout => {
                Some(BlackholeStage::Close)
            }
            Some(BlackholeStage::Close) => Some(BlackholeStage::MtuReduction),
            _ => None,
        };

        if let Some(stage) = next_stage {
            self.stage = Some(stage);
        }
        next_stage
    }

    /// When the detector should next be polled, or `None` if it hasn't
    /// started or has already escalated through every stage.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        let started_at = self.started_at?;
        let threshold = match self.stage {
            None => self.path_degrading_timeout,
            Some(BlackholeStage::PathDegrading) => self.blackhole_timeout,
            Some(BlackholeStage::Close) => self.blackhole_timeout,
            Some(BlackholeStage::MtuReduction) => return None,
        };
        Some(started_at + threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_detector_fires_after_timeout_without_activity() {
        let mut detector = IdleDetector::new(Duration::from_secs(30), false);
        detector.on_activity(Timestamp::ZERO, usize::MAX);
        assert!(!detector.has_expired(Timestamp::ZERO + Duration::from_secs(29)));
        assert!(detector.has_expired(Timestamp::ZERO + Duration::from_secs(31)));
    }

    #[test]
    fn idle_detector_ignores_small_sends_when_configured() {
        let mut detector = IdleDetector::new(Duration::from_secs(30), true);
        detector.on_activity(Timestamp::ZERO, usize::MAX);
        detector.on_activity(Timestamp::ZERO + Duration::from_secs(20), 4);
        assert!(detector.has_expired(Timestamp::ZERO + Duration::from_secs(31)));
    }

    #[test]
    fn blackhole_detector_escalates_through_stages() {
        let mut detector = BlackholeDetector::new(Duration::from_secs(4), Duration::from_secs(8), true);
        let start = Timestamp::ZERO;
        detector.on_pto_fired(start);
        assert_eq!(detector.poll(start + Duration::from_secs(1)), None);
        assert_eq!(
            detector.poll(start + Duration::from_secs(5)),
            Some(BlackholeStage::PathDegrading)
        );
        assert_eq!(
            detector.poll(start + Duration::from_secs(13)),
            Some(BlackholeStage::Close)
        );
        assert_eq!(detector.poll(start + Duration::from_secs(14)), Some(BlackholeStage::MtuReduction));
    }

    #[test]
    fn forward_progress_resets_escalation() {
        let mut detector = BlackholeDetector::new(Duration::from_secs(4), Duration::from_secs(8), true);
        detector.on_pto_fired(Timestamp::ZERO);
        detector.on_packet_acked();
        assert_eq!(detector.poll(Timestamp::ZERO + Duration::from_secs(10)), None);
    }

    #[test]
    fn disabled_detector_never_escalates() {
        let mut detector = BlackholeDetector::new(Duration::from_secs(4), Duration::from_secs(8), false);
        detector.on_pto_fired(Timestamp::ZERO);
        assert_eq!(detector.poll(Timestamp::ZERO + Duration::from_secs(100)), None);
    }
}
