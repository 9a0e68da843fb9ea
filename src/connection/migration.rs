// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Server-side migration state machine (spec.md §4.6 "Migration state
//! machine"). Client connections never run this; the client only updates
//! `peer_address` directly (spec.md §4.4 step 7).

use crate::path::{MigrationType, PathState};
use crate::stats::Stats;
use std::net::SocketAddr;

/// The server's view of which path is current and whether it has moved
/// away from `NO_CHANGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    NoChange,
    Migrating(MigrationType),
}

/// Runs the server-side reaction to an observed peer-address change:
/// swap congestion controller, reset RTT, notify the visitor, and kick
/// off reverse path validation (spec.md §4.6).
#[derive(Debug)]
pub struct MigrationHandler {
    state: MigrationState,
}

impl Default for MigrationHandler {
    fn default() -> Self {
        Self {
            state: MigrationState::NoChange,
        }
    }
}

/// What the connection must do in response to an observed address change,
/// decided by [`MigrationHandler::on_address_change`] and carried out by
/// the caller (which owns the send-algorithm instance, the validator, and
/// the visitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationAction {
    pub migration_type: MigrationType,
    pub replace_send_algorithm: bool,
    pub reset_rtt: bool,
    pub start_reverse_validation: bool,
    pub throttle_to_anti_amplification: bool,
}

impl MigrationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Classifies an address change observed on a server and decides the
    /// reaction (spec.md §4.6/§4.4 step 7). Does not mutate `path` itself;
    /// the caller applies the action using whatever it owns (send
    /// algorithm, validator, stats).
    pub fn on_address_change(
        &mut self,
        previous: SocketAddr,
        current: SocketAddr,
        stats: &mut Stats,
    ) -> Option<MigrationAction> {
        let migration_type = MigrationType::classify(previous, current);
        if !migration_type.is_change() {
            self.state = MigrationState::NoChange;
            return None;
        }

        self.state = MigrationState::Migrating(migration_type);
        stats.num_peer_migration_while_validating_default_path += 1;

        let is_ip_change = !matches!(migration_type, MigrationType::PortChange);
        Some(MigrationAction {
            migration_type,
            replace_send_algorithm: is_ip_change,
            reset_rtt: is_ip_change,
            start_reverse_validation: true,
            throttle_to_anti_amplification: is_ip_change,
        })
    }

    /// Called when the Path Validator confirms the new path is reachable;
    /// restores `NO_CHANGE` and updates stats (spec.md §4.6: "Success
    /// restores NO_CHANGE and increments num_validated_peer_migration").
    pub fn on_validation_succeeded(&mut self, path: &mut PathState, stats: &mut Stats) {
        path.mark_validated();
        self.state = MigrationState::NoChange;
        stats.num_validated_peer_migration += 1;
    }

    /// Called when validation fails (max retries or overall deadline);
    /// the caller is responsible for reverting to the previously
    /// validated path (spec.md §4.6).
    pub fn on_validation_failed(&mut self) {
        self.state = MigrationState::NoChange;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, port: u16) -> SocketAddr {
        format!("{ip}:{port}").parse().unwrap()
    }

    #[test]
    fn port_only_change_does_not_replace_send_algorithm() {
        let mut handler = MigrationHandler::new();
        let mut stats = Stats::new();
        let action = handler
            .on_address_change(addr("127.0.0.1", 1), addr("127.0.0.1", 2), &mut stats)
            .unwrap();
        assert!(!action.replace_send_algorithm);
        assert!(action.start_reverse_validation);
    }

    #[test]
    fn ip_family_change_replaces_send_algorithm_and_throttles() {
        let mut handler = MigrationHandler::new();
        let mut stats = Stats::new();
        let action = handler
            .on_address_change(addr("127.0.0.1", 1), addr("::1", 1), &mut stats)
            .unwrap();
        assert!(action.replace_send_algorithm);
        assert!(action.throttle_to_anti_amplification);
    }

    #[test]
    fn no_change_returns_none_and_resets_state() {
        let mut handler = MigrationHandler::new();
        let mut stats = Stats::new();
        let addr1 = addr("127.0.0.1", 1);
        assert!(handler.on_address_change(addr1, addr1, &mut stats).is_none());
        assert_eq!(handler.state(), MigrationState::NoChange);
    }
}
