// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Path MTU discovery (spec.md §4.8 "MTU discovery timer"): probes with
//! progressively larger packets, backing off on loss or a
//! `TooBig` write error.

const MIN_MTU: u16 = 1200;
const MAX_MTU: u16 = 1452;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Searching,
    SearchComplete,
}

#[derive(Debug)]
pub struct MtuController {
    state: State,
    confirmed_mtu: u16,
    probe_mtu: u16,
    attempts: u8,
    max_attempts: u8,
}

impl MtuController {
    pub fn new() -> Self {
        Self {
            state: State::Searching,
            confirmed_mtu: MIN_MTU,
            probe_mtu: MIN_MTU,
            attempts: 0,
            max_attempts: 4,
        }
    }

    pub fn with_max_attempts(max_attempts: u8) -> Self {
        Self {
            max_attempts,
            ..Self::new()
        }
    }

    pub fn confirmed_mtu(&self) -> u16 {
        self.confirmed_mtu
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.state, State::Searching)
    }

    /// The size of the next probe to send, or `None` if discovery has
    /// concluded.
    pub fn next_probe_size(&mut self) -> Option<u16> {
        if self.state == State::SearchComplete {
            return None;
        }
        if self.attempts >= self.max_attempts {
            self.state = State::SearchComplete;
            return None;
        }
        let midpoint = self.confirmed_mtu + (MAX_MTU - self.confirmed_mtu) / 2;
        self.probe_mtu = midpoint.max(self.confirmed_mtu + 1).min(MAX_MTU);
        Some(self.probe_mtu)
    }

    pub fn on_probe_acked(&mut self) {
        self.confirmed_mtu = self.probe_mtu;
        self.attempts = 0;
        if self.confirmed_mtu >= MAX_MTU {
            self.state = State::SearchComplete;
        }
    }

    /// A probe was lost or rejected with `TooBig`; back off and retry
    /// fewer times before giving up.
    pub fn on_probe_failed(&mut self) {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            self.state = State::SearchComplete;
        }
    }
}

impl Default for MtuController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_towards_max_mtu_on_repeated_success() {
        let mut mtu = MtuController::new();
        for _ in 0..10 {
            if let Some(probe) = mtu.next_probe_size() {
                mtu.on_probe_acked();
                let _ = probe;
            }
        }
        assert_eq!(mtu.confirmed_mtu(), MAX_MTU);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut mtu = MtuController::with_max_attempts(2);
        mtu.next_probe_size();
        mtu.on_probe_failed();
        mtu.next_probe_size();
        mtu.on_probe_failed();
        assert!(mtu.next_probe_size().is_none());
    }
}
