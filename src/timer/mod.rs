// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The connection's named alarms (spec.md §4.8 "Alarm set and firing
//! semantics").
//!
//! Each alarm is just a deadline; firing semantics (what to do when one
//! elapses) live in [`crate::connection`]. This module only tracks "when is
//! the next deadline across all alarms" so the embedder knows when to call
//! back in without busy-polling.

use crate::time::Timestamp;

/// Identifies one of the alarms named in spec.md §4.8. `DiscardKeys` and
/// `ProcessUndecryptable` are edge-triggered by key installation rather than
/// armed on a deadline, but are included here so callers have one enum to
/// match on when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerId {
    Ack,
    Pto,
    Idle,
    Handshake,
    Ping,
    Send,
    MtuDiscovery,
    DiscardPreviousKeys,
    ProcessUndecryptable,
    BlackholeDetector,
}

const ALL: [TimerId; 10] = [
    TimerId::Ack,
    TimerId::Pto,
    TimerId::Idle,
    TimerId::Handshake,
    TimerId::Ping,
    TimerId::Send,
    TimerId::MtuDiscovery,
    TimerId::DiscardPreviousKeys,
    TimerId::ProcessUndecryptable,
    TimerId::BlackholeDetector,
];

/// A single alarm: either disarmed or armed for a deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Alarm(Option<Timestamp>);

impl Alarm {
    fn set(&mut self, deadline: Timestamp) {
        self.0 = Some(deadline);
    }

    fn cancel(&mut self) {
        self.0 = None;
    }

    fn is_armed(&self) -> bool {
        self.0.is_some()
    }

    fn has_expired(&self, now: Timestamp) -> bool {
        self.0.map_or(false, |deadline| now >= deadline)
    }
}

/// The full set of alarms a connection owns. The connection calls
/// [`TimerSet::set`]/[`TimerSet::cancel`] as its state changes and
/// [`TimerSet::next_expiration`] to learn when it must next be polled.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    ack: Alarm,
    pto: Alarm,
    idle: Alarm,
    handshake: Alarm,
    ping: Alarm,
    send: Alarm,
    mtu_discovery: Alarm,
    discard_previous_keys: Alarm,
    process_undecryptable: Alarm,
    blackhole_detector: Alarm,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn alarm(&self, id: TimerId) -> &Alarm {
        match id {
            TimerId::Ack => &self.ack,
            TimerId::Pto => &self.pto,
            TimerId::Idle => &self.idle,
            TimerId::Handshake => &self.handshake,
            TimerId::Ping => &self.ping,
            TimerId::Send => &self.send,
            TimerId::MtuDiscovery => &self.mtu_discovery,
            TimerId::DiscardPreviousKeys => &self.discard_previous_keys,
            TimerId::ProcessUndecryptable => &self.process_undecryptable,
            TimerId::BlackholeDetector => &self.blackhole_detector,
        }
    }

    fn alarm_mut(&mut self, id: TimerId) -> &mut Alarm {
        match id {
            TimerId::Ack => &mut self.ack,
            TimerId::Pto => &mut self.pto,
            TimerId::Idle => &mut self.idle,
            TimerId::Handshake => &mut self.handshake,
            TimerId::Ping => &mut self.ping,
            TimerId::Send => &mut self.send,
            TimerId::MtuDiscovery => &mut self.mtu_discovery,
            TimerId::DiscardPreviousKeys => &mut self.discard_previous_keys,
            TimerId::ProcessUndecryptable => &mut self.process_undecryptable,
            TimerId::BlackholeDetector => &mut self.blackhole_detector,
        }
    }

    pub fn set(&mut self, id: TimerId, deadline: Timestamp) {
        self.alarm_mut(id).set(deadline);
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.alarm_mut(id).cancel();
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.alarm(id).is_armed()
    }

    pub fn deadline(&self, id: TimerId) -> Option<Timestamp> {
        self.alarm(id).0
    }

    /// The earliest deadline across all armed alarms, i.e. when the
    /// embedder must next call back into the connection.
    pub fn next_expiration(&self) -> Option<Timestamp> {
        ALL.iter().filter_map(|&id| self.alarm(id).0).min()
    }

    /// Every alarm that has reached its deadline as of `now`, in the fixed
    /// `TimerId` declaration order. The caller is responsible for canceling
    /// or rearming each one as its firing semantics dictate.
    pub fn expired(&self, now: Timestamp) -> impl Iterator<Item = TimerId> + '_ {
        ALL.iter().copied().filter(move |&id| self.alarm(id).has_expired(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn next_expiration_picks_earliest_armed_alarm() {
        let mut timers = TimerSet::new();
        timers.set(TimerId::Idle, Timestamp::ZERO + Duration::from_secs(30));
        timers.set(TimerId::Pto, Timestamp::ZERO + Duration::from_millis(300));
        assert_eq!(
            timers.next_expiration(),
            Some(Timestamp::ZERO + Duration::from_millis(300))
        );
    }

    #[test]
    fn cancel_removes_alarm_from_consideration() {
        let mut timers = TimerSet::new();
        timers.set(TimerId::Ack, Timestamp::ZERO + Duration::from_millis(25));
        timers.cancel(TimerId::Ack);
        assert_eq!(timers.next_expiration(), None);
    }

    #[test]
    fn expired_lists_only_alarms_past_their_deadline() {
        let mut timers = TimerSet::new();
        timers.set(TimerId::Ack, Timestamp::ZERO + Duration::from_millis(10));
        timers.set(TimerId::Idle, Timestamp::ZERO + Duration::from_secs(30));
        let now = Timestamp::ZERO + Duration::from_millis(20);
        let fired: Vec<_> = timers.expired(now).collect();
        assert_eq!(fired, vec![TimerId::Ack]);
    }
}
