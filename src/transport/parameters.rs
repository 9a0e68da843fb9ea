// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Peer transport parameters the core consumes (spec.md §6). Negotiation
//! and wire encoding of the transport-parameters TLS extension is TLS's
//! job; the core only reacts to the decoded values once the Visitor
//! reports them via [`crate::connection::Connection::on_transport_parameters`].

use crate::{connection::id::PeerId, varint::VarInt};
use core::time::Duration;

/// The subset of peer transport parameters that influence the core's
/// runtime behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTransportParameters {
    pub initial_max_data: VarInt,
    pub initial_max_stream_data_bidi_local: VarInt,
    pub initial_max_stream_data_bidi_remote: VarInt,
    pub initial_max_stream_data_uni: VarInt,
    pub initial_max_streams_bidi: VarInt,
    pub initial_max_streams_uni: VarInt,
    pub max_idle_timeout: Option<Duration>,
    /// aka `max_packet_size`; only ever lowers the local send limit, never
    /// raises it (spec.md §6).
    pub max_udp_payload_size: VarInt,
    pub ack_delay_exponent: u8,
    pub max_ack_delay: Duration,
    pub disable_active_migration: bool,
    pub active_connection_id_limit: VarInt,
    pub initial_source_connection_id: Option<PeerId>,
    pub original_destination_connection_id: Option<PeerId>,
    pub retry_source_connection_id: Option<PeerId>,
    pub stateless_reset_token: Option<[u8; 16]>,
    /// IETF `min_ack_delay` extension.
    pub min_ack_delay: Option<Duration>,
    pub max_datagram_frame_size: Option<VarInt>,
    pub key_update_not_yet_supported: bool,
}

impl Default for PeerTransportParameters {
    fn default() -> Self {
        Self {
            initial_max_data: VarInt::ZERO,
            initial_max_stream_data_bidi_local: VarInt::ZERO,
            initial_max_stream_data_bidi_remote: VarInt::ZERO,
            initial_max_stream_data_uni: VarInt::ZERO,
            initial_max_streams_bidi: VarInt::ZERO,
            initial_max_streams_uni: VarInt::ZERO,
            max_idle_timeout: None,
            max_udp_payload_size: VarInt::new_saturating(65527),
            ack_delay_exponent: 3,
            max_ack_delay: Duration::from_millis(25),
            disable_active_migration: false,
            active_connection_id_limit: VarInt::new_saturating(2),
            initial_source_connection_id: None,
            original_destination_connection_id: None,
            retry_source_connection_id: None,
            stateless_reset_token: None,
            min_ack_delay: None,
            max_datagram_frame_size: None,
            key_update_not_yet_supported: false,
        }
    }
}

impl PeerTransportParameters {
    /// Whether the peer has announced support for 1-RTT key update
    /// (spec.md I5).
    #[inline]
    pub fn supports_key_update(&self) -> bool {
        !self.key_update_not_yet_supported
    }

    /// Effective ack_delay_exponent, decoding an ACK frame's `ack_delay`
    /// field value into a `Duration`.
    #[inline]
    pub fn decode_ack_delay(&self, delay: VarInt) -> Duration {
        let scale = 1u64 << self.ack_delay_exponent;
        Duration::from_micros(delay.as_u64().saturating_mul(scale))
    }
}
