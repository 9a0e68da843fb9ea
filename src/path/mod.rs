// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-path state, anti-amplification accounting, and migration tracking
//! (spec.md §4.6 "Anti-amplification and path state").

pub mod mtu;
pub mod validator;

pub use mtu::MtuController;
pub use validator::{PathValidationResult, PathValidator};

use crate::recovery::RttEstimator;
use std::net::SocketAddr;

/// The kind of address change observed between two packets on a
/// connection (spec.md §4.6 migration state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationType {
    NoChange,
    PortChange,
    Ipv4ToIpv6Change,
    Ipv6ToIpv4Change,
    /// Both the IP and port changed in a way not covered by the simpler
    /// cases above.
    Other,
}

impl MigrationType {
    pub fn classify(previous: SocketAddr, current: SocketAddr) -> Self {
        if previous == current {
            return MigrationType::NoChange;
        }
        if previous.ip() == current.ip() {
            return MigrationType::PortChange;
        }
        match (previous.ip(), current.ip()) {
            (std::net::IpAddr::V4(_), std::net::IpAddr::V6(_)) => MigrationType::Ipv4ToIpv6Change,
            (std::net::IpAddr::V6(_), std::net::IpAddr::V4(_)) => MigrationType::Ipv6ToIpv4Change,
            _ => MigrationType::Other,
        }
    }

    pub fn is_change(self) -> bool {
        !matches!(self, MigrationType::NoChange)
    }
}

/// One network path a connection is, or could be, sending on (spec.md
/// §3 "PathState"). A connection tracks at most two: the default
/// (currently active) path and one alternative path undergoing
/// validation during migration.
#[derive(Debug)]
pub struct PathState {
    pub self_addr: SocketAddr,
    pub peer_addr: SocketAddr,
    pub rtt: RttEstimator,
    pub validated: bool,
    bytes_sent_for_validation: usize,
    bytes_received_for_validation: usize,
    anti_amplification_factor: u8,
    pub mtu: MtuController,
    /// The peer address last confirmed reachable by a successful path
    /// validation. A failed validation of a newer address reverts
    /// `peer_addr` back to this one (spec.md §4.6).
    last_validated_peer_addr: SocketAddr,
}

impl PathState {
    pub fn new(
        self_addr: SocketAddr,
        peer_addr: SocketAddr,
        anti_amplification_factor: u8,
        mtu_discovery_max_attempts: u8,
    ) -> Self {
        Self {
            self_addr,
            peer_addr,
            rtt: RttEstimator::default(),
            validated: false,
            bytes_sent_for_validation: 0,
            bytes_received_for_validation: 0,
            anti_amplification_factor,
            mtu: MtuController::with_max_attempts(mtu_discovery_max_attempts),
            last_validated_peer_addr: peer_addr,
        }
    }

    /// Whether `bytes` more may be sent without exceeding the
    /// anti-amplification limit (spec.md I4, §4.6).
    pub fn can_send(&self, bytes: usize) -> bool {
        if self.validated {
            return true;
        }
        let limit = self.bytes_received_for_validation * self.anti_amplification_factor as usize;
        self.bytes_sent_for_validation + bytes <= limit
    }

    pub fn on_bytes_sent(&mut self, bytes: usize) {
        if !self.validated {
            self.bytes_sent_for_validation += bytes;
        }
    }

    pub fn on_bytes_received(&mut self, bytes: usize) {
        if !self.validated {
            self.bytes_received_for_validation += bytes;
        }
    }

    pub fn mark_validated(&mut self) {
        self.validated = true;
        self.last_validated_peer_addr = self.peer_addr;
    }

    /// Reverts `peer_addr` to the last address a validation actually
    /// succeeded for, undoing the optimistic update applied when the
    /// address change was first observed (spec.md §4.6).
    pub fn revert_to_last_validated(&mut self) {
        self.peer_addr = self.last_validated_peer_addr;
    }

    pub fn last_validated_peer_addr(&self) -> SocketAddr {
        self.last_validated_peer_addr
    }

    /// Sending budget remaining under anti-amplification, or `None` if
    /// the path is already validated (unbounded).
    pub fn amplification_budget(&self) -> Option<usize> {
        if self.validated {
            return None;
        }
        let limit = self.bytes_received_for_validation * self.anti_amplification_factor as usize;
        Some(limit.saturating_sub(self.bytes_sent_for_validation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, port: u16) -> SocketAddr {
        format!("{ip}:{port}").parse().unwrap()
    }

    #[test]
    fn classifies_port_change() {
        let a = addr("127.0.0.1", 1000);
        let b = addr("127.0.0.1", 2000);
        assert_eq!(MigrationType::classify(a, b), MigrationType::PortChange);
    }

    #[test]
    fn unvalidated_path_is_amplification_limited() {
        let mut path = PathState::new(addr("127.0.0.1", 1), addr("127.0.0.1", 2), 3, 4);
        path.on_bytes_received(100);
        assert!(path.can_send(300));
        assert!(!path.can_send(301));
    }

    #[test]
    fn validated_path_has_no_limit() {
        let mut path = PathState::new(addr("127.0.0.1", 1), addr("127.0.0.1", 2), 3, 4);
        path.mark_validated();
        assert!(path.can_send(1_000_000));
    }

    #[test]
    fn failed_validation_reverts_to_last_validated_address() {
        let mut path = PathState::new(addr("127.0.0.1", 1), addr("127.0.0.1", 2), 3, 4);
        path.mark_validated();
        path.peer_addr = addr("127.0.0.1", 3);
        path.revert_to_last_validated();
        assert_eq!(path.peer_addr, addr("127.0.0.1", 2));
    }
}
