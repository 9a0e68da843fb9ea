// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Numeric counters exposed by the connection core for diagnostics
//! (spec.md §6 "Stats exposed").

/// Plain counters, incremented directly by the owning subsystem. No
/// histogram/percentile machinery lives here; that belongs to whatever
/// consumes these numbers (e.g. a metrics provider layered on top).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_processed: u64,
    pub packets_discarded: u64,
    pub bytes_sent: u64,
    pub bytes_retransmitted: u64,

    pub rto_count: u64,
    pub pto_count: u64,
    pub tlp_count: u64,
    pub crypto_retransmit_count: u64,

    pub num_connectivity_probing_received: u64,
    pub num_peer_migration_while_validating_default_path: u64,
    pub num_validated_peer_migration: u64,
    pub num_peer_migration_to_proactively_validated_address: u64,
    pub num_reverse_path_validation_upon_migration: u64,

    pub num_failed_authentication_packets_received: u64,
    pub key_update_count: u64,
    pub retry_packet_processed: u64,
    pub first_decrypted_packet: Option<crate::time::Timestamp>,
    pub max_packet_size: u16,
    pub num_tls_server_zero_rtt_packets_received_after_discarding_decrypter: u64,

    pub blocked_frames_sent: u64,
    pub blocked_frames_received: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn on_packet_sent(&mut self, bytes: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    #[inline]
    pub fn on_packet_received(&mut self) {
        self.packets_received += 1;
    }

    #[inline]
    pub fn on_packet_processed(&mut self) {
        self.packets_processed += 1;
    }

    #[inline]
    pub fn on_packet_discarded(&mut self) {
        self.packets_discarded += 1;
    }
}
