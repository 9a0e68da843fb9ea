// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Connection configuration, snapshotted at construction time.
//!
//! Per spec.md §9 ("Global flags toggling runtime behaviour"), no
//! process-wide mutable state survives into the core: every tunable and
//! every one of the closed-set options from spec.md §6 is captured once in
//! a [`Config`] value at connection-construction time (and again whenever
//! the embedder calls [`Connection::set_config`](crate::connection::Connection::set_config)).

use core::time::Duration;

/// The closed set of behavioral options from spec.md §6. Each flag is
/// independent; combinations are the embedder's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// k5RTO: close the connection after 5 consecutive retransmission
    /// timeouts.
    pub close_on_five_rtos: bool,
    /// k6PTO / k7PTO / k8PTO: alternate PTO-count close thresholds. `None`
    /// uses the implementation default.
    pub max_consecutive_ptos: Option<u32>,
    /// k1PTO / k2PTO: number of packets a single PTO sends.
    pub packets_per_pto: u8,
    /// kPTOS: skip one packet number immediately after a PTO trigger.
    pub skip_packet_number_on_pto: bool,
    /// kTLPR: reduce the first TLP delay to 0.5 * srtt (legacy Q-crypto
    /// versions only; spec.md §9 Open Questions).
    pub reduced_first_tlp_delay: bool,
    /// kMTUH: use a higher MTU discovery target on the server.
    pub high_mtu_discovery_target: bool,
    /// k3AFF / k10AF: anti-amplification factor.
    pub anti_amplification_factor: u8,
    /// kEACK: ensure an ACK-eliciting packet is sent periodically even
    /// absent new application data.
    pub ensure_ack_eliciting: bool,
    /// kACKD: enable ack decimation.
    pub ack_decimation: bool,
    /// kAKDU: allow unlimited ack aggregation under decimation.
    pub ack_decimation_unlimited_aggregation: bool,
    /// kAFF2: send an ACK_FREQUENCY frame as soon as the handshake
    /// completes.
    pub send_ack_frequency_at_handshake_confirmed: bool,
    /// kNPCO: disable pacing offload.
    pub disable_pacing_offload: bool,
    /// kSRWP: server sends a retransmittable PING to keep a NAT binding
    /// alive even with nothing else to send.
    pub server_retransmittable_on_wire_ping: bool,
    /// kCBHD: only the client runs blackhole detection.
    pub client_only_blackhole_detection: bool,
    /// kFIDT: ignore small sends for the purposes of extending the idle
    /// timeout deadline.
    pub ignore_small_sends_for_idle_timeout: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            close_on_five_rtos: false,
            max_consecutive_ptos: None,
            packets_per_pto: 1,
            skip_packet_number_on_pto: false,
            reduced_first_tlp_delay: false,
            high_mtu_discovery_target: false,
            anti_amplification_factor: 3,
            ensure_ack_eliciting: false,
            ack_decimation: false,
            ack_decimation_unlimited_aggregation: false,
            send_ack_frequency_at_handshake_confirmed: false,
            disable_pacing_offload: false,
            server_retransmittable_on_wire_ping: false,
            client_only_blackhole_detection: false,
            ignore_small_sends_for_idle_timeout: false,
        }
    }
}

/// Timer/alarm tunables (spec.md §4.8, §6 "Alarm granularity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub alarm_granularity: Duration,
    pub initial_rtt: Duration,
    pub max_ack_delay: Duration,
    /// kAKD: reduce max_ack_delay to rtt/8 instead of rtt/4.
    pub reduced_max_ack_delay: bool,
    pub idle_timeout: Duration,
    pub handshake_timeout: Duration,
    pub ping_timeout: Duration,
    pub path_degrading_timeout: Duration,
    pub blackhole_timeout: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            alarm_granularity: Duration::from_millis(1),
            initial_rtt: Duration::from_millis(333),
            max_ack_delay: Duration::from_millis(25),
            reduced_max_ack_delay: false,
            idle_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(15),
            path_degrading_timeout: Duration::from_secs(4),
            blackhole_timeout: Duration::from_secs(8),
        }
    }
}

/// Resource limits (spec.md §5 "Shared resources").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub max_undecryptable_packets: usize,
    pub max_tracked_packets: usize,
    /// Bound on additional ACK ranges carried in one ACK frame, oldest
    /// trimmed first (spec.md §4.3).
    pub max_ack_ranges: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_undecryptable_packets: 32,
            max_tracked_packets: 10_000,
            max_ack_ranges: 32,
        }
    }
}

/// The full connection configuration, snapshotted once per
/// construction/`set_config` call (spec.md §9 re-architecture note on
/// "global flags").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub options: ConnectionOptions,
    pub timers: TimerConfig,
    pub limits: ResourceLimits,
    /// kMaxRetryTimes for path validation (spec.md §4.7): fixed at 3 per
    /// RFC guidance but retained as a field so tests can shrink it.
    pub path_validation_max_retries: u8,
    /// Number of MTU discovery attempts before giving up (`kMtuDiscoveryAttempts`).
    pub mtu_discovery_max_attempts: u8,
}

impl Config {
    pub fn new() -> Self {
        Self {
            path_validation_max_retries: 3,
            mtu_discovery_max_attempts: 4,
            ..Default::default()
        }
    }
}
