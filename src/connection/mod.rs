// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection state machine (spec.md §3 "Lifecycle", §4.4
//! ingress, §4.5 egress).
//!
//! [`Connection`] owns every piece built up elsewhere in this crate --
//! the per-space [`PacketCreator`]/[`SentPacketTable`]/
//! [`ReceivedPacketManager`] triples, the [`PathState`]/[`PathValidator`]/
//! [`MigrationHandler`], the [`TimerSet`] and detectors, the
//! [`UndecryptableBuffer`] and [`CoalescedBuffer`] -- and drives them all
//! from a fixed set of capabilities supplied by the embedder (spec.md
//! §4.9, [`crate::capability`]). It never touches a socket or a clock
//! directly.

pub mod close;
pub mod id;
pub mod migration;

pub use close::{CloseBehavior, ConnectionError};
pub use migration::{MigrationHandler, MigrationState};

use crate::ack::{build_ack_frame, AckSchedule, ReceivedPacketManager};
use crate::capability::{
    CloseSource, Clock, Decrypter, DataProducer, Encrypter, LossDetection, PacketWriter, Random,
    SendAlgorithm, Visitor, WriteError,
};
use crate::config::Config;
use crate::coalescer::CoalescedBuffer;
use crate::creator::{CreatedPacket, PacketCreator};
use crate::crypto::{KeyPhase, KeySet, KeyUpdateEvent};
use crate::detector::{BlackholeDetector, BlackholeStage, IdleDetector};
use crate::log::{debug, trace, warn};
use crate::path::{PathState, PathValidationResult, PathValidator};
use crate::recovery::{PtoState, SentPacketInfo, SentPacketTable};
use crate::stats::Stats;
use crate::time::Timestamp;
use crate::timer::{TimerId, TimerSet};
use crate::transport;
use crate::transport::parameters::PeerTransportParameters;
use crate::undecryptable::{BufferedPacket, UndecryptableBuffer};
use crate::varint::VarInt;
use crate::wire::frame::{
    ack::Ack, connection_close::ConnectionClose, misc::{HandshakeDone, Ping}, path_challenge::PathChallenge,
    path_response::PathResponse, Frame,
};
use crate::wire::packet::long::{LongHeader, PacketType};
use crate::wire::packet::short::{ShortHeader, KEY_PHASE_MASK};
use crate::wire::packet::{EncryptionLevel, Header, PacketNumber, PacketNumberLen, PacketNumberSpace, QUIC_VERSION_1};
use core::time::Duration;
use s2n_codec::{DecoderBufferMut, EncoderValue};
use std::net::SocketAddr;

/// Bookkeeping attached to every sent packet, enough to decide whether
/// it's worth retransmitting on loss (spec.md §4.2 "SentPacket"). This
/// crate doesn't own the stream layer, so the retransmittable payload
/// itself isn't kept -- only what kind of thing was lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentPacketMeta {
    pub contains_crypto: bool,
    pub is_mtu_probe: bool,
}

type Meta = SentPacketMeta;

/// spec.md §3 "Lifecycle": `Handshaking -> Connected -> (Closing |
/// Draining) -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Connected,
    Closing,
    Draining,
    Closed,
}

struct SpaceState {
    creator: PacketCreator,
    sent_packets: SentPacketTable<Meta>,
    received: ReceivedPacketManager,
    pto: PtoState,
    keys_discarded: bool,
}

impl SpaceState {
    fn new(space: PacketNumberSpace, max_packet_length: usize, max_ack_ranges: usize, reduced_max_ack_delay: bool) -> Self {
        Self {
            creator: PacketCreator::new(space, max_packet_length),
            sent_packets: SentPacketTable::new(),
            received: ReceivedPacketManager::new(max_ack_ranges, reduced_max_ack_delay),
            pto: PtoState::default(),
            keys_discarded: false,
        }
    }
}

/// The full connection core. Generic over every external capability
/// (spec.md §4.9); a single instance of each is shared across all three
/// packet-number spaces, dispatching internally by
/// [`EncryptionLevel`]/[`KeyPhase`].
pub struct Connection<Clk, Rng, Cc, Loss, Enc, Dec, Wtr, Dp, Vis>
where
    Clk: Clock,
    Rng: Random,
    Cc: SendAlgorithm,
    Loss: LossDetection<Meta>,
    Enc: Encrypter,
    Dec: Decrypter,
    Wtr: PacketWriter,
    Dp: DataProducer,
    Vis: Visitor,
{
    config: Config,
    is_server: bool,
    state: ConnectionState,

    clock: Clk,
    random: Rng,
    send_algorithm: Cc,
    loss_detection: Loss,
    encrypter: Enc,
    decrypter: Dec,
    writer: Wtr,
    #[allow(dead_code)]
    data_producer: Dp,
    visitor: Vis,

    initial: SpaceState,
    handshake: SpaceState,
    application: SpaceState,

    path: PathState,
    migration: MigrationHandler,
    path_validator: PathValidator,

    keys: KeySet,
    timers: TimerSet,
    idle: IdleDetector,
    blackhole: BlackholeDetector,

    undecryptable: UndecryptableBuffer,
    coalesced: CoalescedBuffer,

    stats: Stats,
    close_error: Option<transport::Error>,
    queued_close: Option<ConnectionError>,

    disable_active_migration: bool,

    /// This endpoint's own connection id, presented to the peer as the
    /// long header's source connection id (spec.md §3 "ConnectionId").
    /// Fixed for the life of the connection -- `NEW_CONNECTION_ID`
    /// issuance and rotation are out of this crate's scope (SPEC_FULL.md
    /// §9).
    local_cid: id::LocalId,
    /// The destination connection id used to address outgoing packets to
    /// the peer. Starts as the peer's advertised source connection id and
    /// is updated once, in place, by a Retry (spec.md §8 S3).
    peer_cid: id::PeerId,
    /// Set once a Retry has been accepted, so a second Retry is ignored
    /// (RFC 9000 §17.2.5: a client MUST NOT act on more than one Retry).
    retry_received: bool,
    /// The token carried by an accepted Retry, attached to every
    /// subsequent Initial packet the client sends (RFC 9000 §8.1).
    retry_token: Option<Vec<u8>>,
    /// A server discards its 0-RTT decrypter after the first successful
    /// 1-RTT decrypt (spec.md §4.8 "Discard-0-RTT-keys"). `ZeroRtt` and
    /// `OneRtt` share one packet-number space's [`SpaceState`], so this is
    /// tracked separately rather than as another `keys_discarded` flag.
    zero_rtt_keys_discarded: bool,
    /// The peer's stateless reset token from its transport parameters, if
    /// advertised (spec.md §6, RFC 9000 §10.3).
    peer_stateless_reset_token: Option<id::StatelessResetToken>,
}

impl<Clk, Rng, Cc, Loss, Enc, Dec, Wtr, Dp, Vis> Connection<Clk, Rng, Cc, Loss, Enc, Dec, Wtr, Dp, Vis>
where
    Clk: Clock,
    Rng: Random,
    Cc: SendAlgorithm,
    Loss: LossDetection<Meta>,
    Enc: Encrypter,
    Dec: Decrypter,
    Wtr: PacketWriter,
    Dp: DataProducer,
    Vis: Visitor,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        is_server: bool,
        self_addr: SocketAddr,
        peer_addr: SocketAddr,
        local_cid: id::LocalId,
        peer_cid: id::PeerId,
        clock: Clk,
        random: Rng,
        send_algorithm: Cc,
        loss_detection: Loss,
        encrypter: Enc,
        decrypter: Dec,
        writer: Wtr,
        data_producer: Dp,
        visitor: Vis,
    ) -> Self {
        let max_packet_length = writer.max_packet_size() as usize;
        let max_ack_ranges = config.limits.max_ack_ranges;
        let reduced = config.timers.reduced_max_ack_delay;
        let now = clock.now();

        let mut connection = Self {
            is_server,
            state: ConnectionState::Handshaking,
            clock,
            random,
            send_algorithm,
            loss_detection,
            encrypter,
            decrypter,
            writer,
            data_producer,
            visitor,
            initial: SpaceState::new(PacketNumberSpace::Initial, max_packet_length, max_ack_ranges, reduced),
            handshake: SpaceState::new(PacketNumberSpace::Handshake, max_packet_length, max_ack_ranges, reduced),
            application: SpaceState::new(PacketNumberSpace::Application, max_packet_length, max_ack_ranges, reduced),
            path: PathState::new(
                self_addr,
                peer_addr,
                config.options.anti_amplification_factor,
                config.mtu_discovery_max_attempts,
            ),
            migration: MigrationHandler::new(),
            path_validator: PathValidator::new(),
            keys: KeySet::new(),
            timers: TimerSet::new(),
            idle: IdleDetector::new(config.timers.idle_timeout, config.options.ignore_small_sends_for_idle_timeout),
            blackhole: BlackholeDetector::new(
                config.timers.path_degrading_timeout,
                config.timers.blackhole_timeout,
                !(is_server && config.options.client_only_blackhole_detection),
            ),
            undecryptable: UndecryptableBuffer::new(config.limits.max_undecryptable_packets),
            coalesced: CoalescedBuffer::new(),
            stats: Stats::new(),
            close_error: None,
            queued_close: None,
            disable_active_migration: false,
            local_cid,
            peer_cid,
            retry_received: false,
            retry_token: None,
            zero_rtt_keys_discarded: false,
            peer_stateless_reset_token: None,
            config,
        };

        connection.timers.set(TimerId::Handshake, now + config.timers.handshake_timeout);
        connection.timers.set(TimerId::Idle, connection.idle.deadline());
        connection
    }

    /// Applies the peer's decoded transport parameters once the
    /// handshake has produced them (spec.md §6; SPEC_FULL.md §2). Lowers
    /// the idle timeout to the lesser of the two advertised values,
    /// clamps the per-space packet length to the peer's
    /// `max_udp_payload_size`, and records `disable_active_migration` so
    /// a later peer address change is treated as a protocol violation
    /// instead of a migration (RFC 9000 §9).
    pub fn on_transport_parameters(&mut self, params: &PeerTransportParameters) {
        if let Some(max_idle_timeout) = params.max_idle_timeout {
            self.idle.apply_peer_max_idle_timeout(max_idle_timeout);
        }

        let clamped = (self.writer.max_packet_size() as u64).min(params.max_udp_payload_size.as_u64()) as usize;
        self.initial.creator.set_max_packet_length(clamped);
        self.handshake.creator.set_max_packet_length(clamped);
        self.application.creator.set_max_packet_length(clamped);

        self.path.rtt.on_max_ack_delay(params.max_ack_delay);
        self.disable_active_migration = params.disable_active_migration;
        self.peer_stateless_reset_token = params.stateless_reset_token.map(id::StatelessResetToken::new);
    }

    /// Replaces the live configuration (spec.md §9: no global mutable
    /// config survives into the core, so every tunable is snapshotted
    /// here instead of read from a process-wide source). Per-space
    /// packet length and ack-range bookkeeping already constructed keep
    /// running under their original settings; only future packets are
    /// affected.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_handshake_confirmed(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    fn space_mut(&mut self, space: PacketNumberSpace) -> &mut SpaceState {
        match space {
            PacketNumberSpace::Initial => &mut self.initial,
            PacketNumberSpace::Handshake => &mut self.handshake,
            PacketNumberSpace::Application => &mut self.application,
        }
    }

    fn space(&self, space: PacketNumberSpace) -> &SpaceState {
        match space {
            PacketNumberSpace::Initial => &self.initial,
            PacketNumberSpace::Handshake => &self.handshake,
            PacketNumberSpace::Application => &self.application,
        }
    }

    // ---------------------------------------------------------------
    // Ingress (spec.md §4.4)
    // ---------------------------------------------------------------

    /// Processes one received UDP datagram, which may contain several
    /// coalesced QUIC packets.
    pub fn on_datagram_received(&mut self, datagram: &mut [u8], remote: SocketAddr) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }

        let now = self.clock.now();
        trace!(bytes = datagram.len(), peer = %remote, "datagram received");
        self.path.on_bytes_received(datagram.len());

        let mut cursor = DecoderBufferMut::new(datagram);
        while !cursor.is_empty() {
            let dcid_len = crate::connection::id::MAX_LEN;
            let (header, rest) = match Header::decode(cursor, dcid_len) {
                Ok(pair) => pair,
                Err(_) => break,
            };

            if header.is_version_negotiation() {
                cursor = rest;
                break;
            }

            let level = match &header {
                Header::Long(h) => match h.packet_type {
                    crate::wire::packet::PacketType::Initial => EncryptionLevel::Initial,
                    crate::wire::packet::PacketType::Handshake => EncryptionLevel::Handshake,
                    crate::wire::packet::PacketType::ZeroRtt => EncryptionLevel::ZeroRtt,
                    crate::wire::packet::PacketType::Retry => {
                        self.stats.retry_packet_processed += 1;
                        self.handle_retry(h);
                        cursor = rest;
                        continue;
                    }
                },
                Header::Short(_) => EncryptionLevel::OneRtt,
            };

            self.handle_packet(now, header, level, remote)?;
            cursor = rest;
        }

        self.idle.on_activity(now, usize::MAX);
        Ok(())
    }

    /// Handles a client-received Retry (spec.md §8 S3). Verifies the
    /// integrity tag, updates the destination connection id and stored
    /// token, and discards the abandoned Initial-space sent-packet
    /// bookkeeping -- the crypto layer is told via
    /// [`crate::capability::Visitor::on_retry_received`] so it can
    /// re-queue its CRYPTO data at the new connection id. Ignored on a
    /// server (servers never receive Retry) and after the first accepted
    /// Retry (RFC 9000 §17.2.5: a client MUST NOT act on more than one).
    fn handle_retry(&mut self, header: &LongHeader<'_>) {
        if self.is_server || self.retry_received {
            return;
        }
        let Some(tag) = header.retry_tag else {
            return;
        };
        let original_dcid = self.peer_cid;
        if !self
            .decrypter
            .verify_retry_integrity_tag(original_dcid.as_bytes(), header.remaining, tag)
        {
            return;
        }

        self.retry_received = true;
        self.peer_cid = header.source_connection_id;
        self.retry_token = Some(header.remaining.to_vec());
        self.initial.sent_packets = SentPacketTable::new();
        self.initial.pto = PtoState::default();
        debug!(new_scid = ?header.source_connection_id, "retry accepted, updating destination connection id");
        self.visitor.on_retry_received(header.remaining);
    }

    fn handle_packet(
        &mut self,
        now: Timestamp,
        header: Header<'_>,
        level: EncryptionLevel,
        remote: SocketAddr,
    ) -> Result<(), ConnectionError> {
        let space = level.packet_number_space();
        if self.space(space).keys_discarded {
            self.stats.on_packet_discarded();
            return Ok(());
        }
        if level == EncryptionLevel::ZeroRtt && self.zero_rtt_keys_discarded {
            self.stats.num_tls_server_zero_rtt_packets_received_after_discarding_decrypter += 1;
            self.stats.on_packet_discarded();
            return Ok(());
        }

        let (is_short, first_byte, body): (bool, u8, &mut [u8]) = match header {
            Header::Long(h) => (false, h.first_byte, h.remaining),
            Header::Short(h) => (true, h.first_byte, h.remaining),
        };

        if body.is_empty() {
            return Ok(());
        }

        let pn_len = PacketNumberLen::from_packet_tag(first_byte);
        if body.len() < pn_len.bytes() {
            return Ok(());
        }
        let mut truncated = 0u64;
        for &b in &body[..pn_len.bytes()] {
            truncated = (truncated << 8) | b as u64;
        }
        let largest_received = self.space(space).received.ack_ranges().largest();
        let largest_pn = largest_received.map(|pn| space.new_packet_number(VarInt::new_saturating(pn)));
        let packet_number = PacketNumber::expand(space, largest_pn, truncated, pn_len);

        if let Some(largest) = largest_received {
            if self.space(space).received.ack_ranges().contains(packet_number.as_u64()) && packet_number.as_u64() <= largest {
                self.stats.on_packet_discarded();
                return Ok(());
            }
        }

        let payload = &mut body[pn_len.bytes()..];
        let key_phase = KeyPhase::from_bit(is_short && first_byte & crate::wire::packet::short::KEY_PHASE_MASK != 0);

        if self
            .decrypter
            .decrypt(level, key_phase, packet_number, &[], payload)
            .is_err()
        {
            self.stats.num_failed_authentication_packets_received += 1;

            // RFC 9000 §10.3: a short-header packet that fails to
            // authenticate may be a stateless reset -- check the trailing
            // 16 bytes of the whole datagram before buffering it.
            if is_short {
                if let Some(token) = self.peer_stateless_reset_token {
                    if body.len() >= 16 && token.matches(&body[body.len() - 16..]) {
                        debug!("stateless reset token matched, closing");
                        return self.close_now(transport::Error::public_reset(), CloseBehavior::Silent);
                    }
                }
            }

            debug!(?space, ?level, packet_number = packet_number.as_u64(), "packet failed authentication, buffering");
            let buffered = BufferedPacket {
                level,
                remote_address: remote,
                packet_number,
                key_phase,
                datagram: payload.to_vec(),
            };
            if self.undecryptable.push(buffered) {
                self.timers.set(TimerId::ProcessUndecryptable, now);
            }
            return Ok(());
        }

        self.stats.on_packet_received();
        self.stats.on_packet_processed();
        trace!(?space, ?level, packet_number = packet_number.as_u64(), "packet decrypted");
        if self.stats.first_decrypted_packet.is_none() {
            self.stats.first_decrypted_packet = Some(now);
        }

        if level == EncryptionLevel::Handshake && !self.initial.keys_discarded {
            self.initial.keys_discarded = true;
            debug!("discarding Initial keys after first Handshake packet");
        }
        if self.is_server && level == EncryptionLevel::OneRtt && !self.zero_rtt_keys_discarded {
            self.zero_rtt_keys_discarded = true;
            debug!("discarding 0-RTT decrypter after first 1-RTT packet");
        }

        if level == EncryptionLevel::OneRtt {
            match self.keys.on_packet_decrypted(key_phase, packet_number.as_u64(), now) {
                KeyUpdateEvent::PeerInitiated => {
                    self.stats.key_update_count += 1;
                    debug!(?key_phase, "peer-initiated key update");
                    self.visitor.on_key_update(key_phase);
                    let pto = self.application.pto.pto_duration(&self.path.rtt, PacketNumberSpace::Application);
                    self.timers.set(TimerId::DiscardPreviousKeys, now + pto * 3);
                }
                KeyUpdateEvent::None => {}
            }
        }

        let ack_eliciting = self.dispatch_frames(now, space, level, payload)?;

        let is_post_handshake = self.is_handshake_confirmed();
        let schedule = self
            .space_mut(space)
            .received
            .on_packet_received(packet_number.as_u64(), now, ack_eliciting, is_post_handshake);
        match schedule {
            AckSchedule::Immediate => self.timers.set(TimerId::Ack, now),
            AckSchedule::Delayed(deadline) => self.timers.set(TimerId::Ack, deadline),
            AckSchedule::None => {}
        }

        self.handle_address_change(remote)?;
        self.drain_undecryptable(now, level);

        Ok(())
    }

    /// Decodes and dispatches every frame in `payload`, shared between
    /// fresh ingress and the replay path for packets drained from the
    /// [`UndecryptableBuffer`]. Returns whether any decoded frame was
    /// ack-eliciting.
    fn dispatch_frames(
        &mut self,
        now: Timestamp,
        space: PacketNumberSpace,
        level: EncryptionLevel,
        payload: &mut [u8],
    ) -> Result<bool, ConnectionError> {
        let mut ack_eliciting = false;
        let mut cursor = DecoderBufferMut::new(payload);
        loop {
            if cursor.is_empty() {
                break;
            }
            let (frame, rest) = match Frame::decode(cursor) {
                Ok(pair) => pair,
                Err(_) => {
                    self.close_now(transport::Error::ietf_protocol_violation(), CloseBehavior::Immediate)?;
                    return Ok(ack_eliciting);
                }
            };
            cursor = rest;

            if frame.ack_elicitation().is_ack_eliciting() {
                ack_eliciting = true;
            }

            if !self.handle_frame(now, space, level, &frame)? {
                self.close_now(transport::Error::ietf_protocol_violation(), CloseBehavior::Immediate)?;
                return Ok(ack_eliciting);
            }

            if matches!(frame, Frame::ConnectionClose(_)) {
                break;
            }
        }
        Ok(ack_eliciting)
    }

    /// Replays every packet buffered at `level` now that a successful
    /// decrypt there proves its keys are usable (spec.md §4.8
    /// "Process-undecryptable").
    fn drain_undecryptable(&mut self, now: Timestamp, level: EncryptionLevel) {
        let buffered = self.undecryptable.drain_level(level);
        for mut packet in buffered {
            if self
                .decrypter
                .decrypt(packet.level, packet.key_phase, packet.packet_number, &[], &mut packet.datagram)
                .is_err()
            {
                self.stats.num_failed_authentication_packets_received += 1;
                continue;
            }

            self.stats.on_packet_received();
            self.stats.on_packet_processed();
            let space = packet.level.packet_number_space();
            let Ok(ack_eliciting) = self.dispatch_frames(now, space, packet.level, &mut packet.datagram) else {
                continue;
            };

            let is_post_handshake = self.is_handshake_confirmed();
            let schedule = self.space_mut(space).received.on_packet_received(
                packet.packet_number.as_u64(),
                now,
                ack_eliciting,
                is_post_handshake,
            );
            match schedule {
                AckSchedule::Immediate => self.timers.set(TimerId::Ack, now),
                AckSchedule::Delayed(deadline) => self.timers.set(TimerId::Ack, deadline),
                AckSchedule::None => {}
            }
        }
        if self.undecryptable.is_empty() {
            self.timers.cancel(TimerId::ProcessUndecryptable);
        }
    }

    fn handle_frame(
        &mut self,
        now: Timestamp,
        space: PacketNumberSpace,
        level: EncryptionLevel,
        frame: &Frame<'_>,
    ) -> Result<bool, ConnectionError> {
        Ok(match frame {
            Frame::Padding(_) | Frame::Ping(_) => true,
            Frame::Ack(ack) => {
                self.on_ack_frame(now, space, ack);
                true
            }
            Frame::Crypto(f) => self.visitor.on_crypto_frame(level, f.offset.as_u64(), f.data),
            Frame::Stream(f) => self.visitor.on_stream_frame(f.stream_id.as_u64(), f.offset.as_u64(), f.data, f.is_fin),
            Frame::Datagram(f) => self.visitor.on_datagram_frame(f.data),
            Frame::HandshakeDone(_) => {
                if self.is_server {
                    false
                } else {
                    self.confirm_handshake();
                    true
                }
            }
            Frame::NewToken(_) => !self.is_server,
            Frame::PathChallenge(challenge) => {
                self.queue_path_response(*challenge);
                true
            }
            Frame::PathResponse(response) => {
                if let Some(result) = self.path_validator.on_path_response(response.data) {
                    self.on_path_validation_result(result);
                }
                true
            }
            Frame::ConnectionClose(close) => {
                self.on_connection_close_frame(close);
                true
            }
            Frame::AckFrequency(f) => {
                self.space_mut(space).received.on_ack_frequency(
                    f.ack_eliciting_threshold.as_u64() as u32,
                    Duration::from_micros(f.request_max_ack_delay.as_u64()),
                );
                true
            }
            _ => true,
        })
    }

    fn on_ack_frame(&mut self, now: Timestamp, space: PacketNumberSpace, ack: &Ack) {
        let acked_numbers: Vec<u64> = ack
            .ack_ranges
            .iter()
            .flat_map(|r| r.smallest..=r.largest)
            .collect();

        let drained = self.space_mut(space).sent_packets.drain_acked(acked_numbers.into_iter());
        if drained.is_empty() {
            return;
        }

        let largest_newly_acked = drained.iter().map(|(pn, _)| *pn).max();
        let mut newly_acked_bytes = 0usize;
        for (pn, info) in &drained {
            newly_acked_bytes += info.bytes;
            if Some(*pn) == largest_newly_acked && *pn == ack.largest_acked {
                let ack_delay = Duration::from_micros(ack.ack_delay.as_u64());
                let rtt_sample = now.saturating_duration_since(info.time_sent);
                self.path.rtt.update_rtt(
                    ack_delay,
                    rtt_sample,
                    now,
                    self.is_handshake_confirmed(),
                    space,
                );
                self.space_mut(space).received.on_rtt_update(self.path.rtt.smoothed_rtt());
            }
            if info.meta.is_mtu_probe {
                self.path.mtu.on_probe_acked();
            }
            if space == PacketNumberSpace::Application
                && self.keys.is_update_in_progress()
                && self.keys.first_packet_number_in_phase().map_or(false, |first| *pn >= first)
            {
                self.keys.confirm_update();
            }
        }

        self.space_mut(space).pto.on_new_packet_acked();
        self.blackhole.on_packet_acked();
        self.rearm_blackhole_timer();
        let rtt = self.path.rtt;
        self.send_algorithm.on_ack(now, newly_acked_bytes, &rtt);

        let loss_info = match space {
            PacketNumberSpace::Initial => self.loss_detection.detect_and_remove_lost_packets(now, &rtt, &mut self.initial.sent_packets),
            PacketNumberSpace::Handshake => self.loss_detection.detect_and_remove_lost_packets(now, &rtt, &mut self.handshake.sent_packets),
            PacketNumberSpace::Application => self.loss_detection.detect_and_remove_lost_packets(now, &rtt, &mut self.application.sent_packets),
        };
        if !loss_info.is_empty() {
            self.send_algorithm
                .on_packets_lost(now, loss_info.lost_bytes, loss_info.persistent_congestion);
        }

        self.rearm_pto_timer();
        self.rearm_ping_timer(now);
        self.maybe_confirm_handshake();
    }

    /// Transitions `Handshaking -> Connected` once the crypto/TLS layer
    /// independently agrees the handshake is done (spec.md §3
    /// Lifecycle). Only relevant to the server -- the client instead
    /// confirms on receipt of `HANDSHAKE_DONE` (RFC 9001 §4.9.2). No-op
    /// if already confirmed.
    fn maybe_confirm_handshake(&mut self) {
        if self.is_handshake_confirmed() || !self.visitor.is_handshake_confirmed() {
            return;
        }
        self.confirm_handshake();
    }

    /// Common handshake-confirmation bookkeeping shared by the client
    /// (on receiving `HANDSHAKE_DONE`) and the server (once its TLS
    /// layer reports completion): transitions to `Connected`, discards
    /// the Handshake-space keys, and cancels the handshake timer (RFC
    /// 9001 §4.9.2). The server additionally queues its own
    /// `HANDSHAKE_DONE` frame.
    fn confirm_handshake(&mut self) {
        self.state = ConnectionState::Connected;
        self.handshake.keys_discarded = true;
        self.timers.cancel(TimerId::Handshake);
        self.visitor.on_handshake_confirmed();
        if self.is_server {
            self.space_mut(PacketNumberSpace::Application)
                .creator
                .add_frame(&Frame::HandshakeDone(HandshakeDone::default()), 16);
        }
    }

    /// Recomputes the earliest PTO deadline across every space with
    /// in-flight ack-eliciting packets (RFC 9002 §6.2.1), or cancels the
    /// alarm if none remain.
    fn rearm_pto_timer(&mut self) {
        let mut earliest: Option<Timestamp> = None;
        for space in PacketNumberSpace::ALL {
            if self.space(space).keys_discarded {
                continue;
            }
            let last_ack_eliciting_sent = self
                .space(space)
                .sent_packets
                .iter()
                .filter(|(_, info)| info.ack_eliciting)
                .map(|(_, info)| info.time_sent)
                .max();
            let Some(last_sent) = last_ack_eliciting_sent else {
                continue;
            };
            let pto = self.space(space).pto.pto_duration(&self.path.rtt, space);
            let deadline = last_sent + pto;
            earliest = Some(earliest.map_or(deadline, |e: Timestamp| e.min(deadline)));
        }
        match earliest {
            Some(deadline) => self.timers.set(TimerId::Pto, deadline),
            None => self.timers.cancel(TimerId::Pto),
        }
    }

    /// Arms the keep-alive PING alarm while no retransmittable packet is
    /// in flight (spec.md §4.8 "Ping"); cancels it once one is.
    fn rearm_ping_timer(&mut self, now: Timestamp) {
        let in_flight: usize = PacketNumberSpace::ALL
            .iter()
            .map(|&space| self.space(space).sent_packets.bytes_in_flight())
            .sum();
        if in_flight == 0 {
            self.timers.set(TimerId::Ping, now + self.config.timers.ping_timeout);
        } else {
            self.timers.cancel(TimerId::Ping);
        }
    }

    /// Arms the blackhole-detector alarm for whatever stage is next, or
    /// cancels it once every stage has fired.
    fn rearm_blackhole_timer(&mut self) {
        match self.blackhole.next_deadline() {
            Some(deadline) => self.timers.set(TimerId::BlackholeDetector, deadline),
            None => self.timers.cancel(TimerId::BlackholeDetector),
        }
    }

    fn on_connection_close_frame(&mut self, close: &ConnectionClose<'_>) {
        let error = transport::Error {
            code: close.code(),
            frame_type: close.frame_type,
            reason: "",
        };
        self.close_error = Some(error);
        self.state = ConnectionState::Draining;
        self.visitor.on_connection_closed(&error, CloseSource::FromPeer);
    }

    fn queue_path_response(&mut self, challenge: PathChallenge) {
        let response = PathResponse { data: challenge.data };
        self.space_mut(PacketNumberSpace::Application)
            .creator
            .add_frame(&Frame::PathResponse(response), 32);
    }

    fn on_path_validation_result(&mut self, result: PathValidationResult) {
        match result {
            PathValidationResult::Success => {
                debug!("path validation succeeded");
                self.migration.on_validation_succeeded(&mut self.path, &mut self.stats);
            }
            PathValidationResult::Failure => {
                warn!("path validation failed, reverting to last validated address");
                self.migration.on_validation_failed();
                self.path.revert_to_last_validated();
            }
        }
    }

    fn handle_address_change(&mut self, remote: SocketAddr) -> Result<(), ConnectionError> {
        if !self.is_server {
            self.path.peer_addr = remote;
            return Ok(());
        }

        if remote == self.path.peer_addr {
            return Ok(());
        }

        if self.disable_active_migration {
            warn!(peer = %remote, "peer address changed with active migration disabled, closing");
            return self.close_now(transport::Error::ietf_protocol_violation(), CloseBehavior::Immediate);
        }

        let previous = self.path.peer_addr;
        if let Some(action) = self.migration.on_address_change(previous, remote, &mut self.stats) {
            debug!(migration_type = ?action.migration_type, from = %previous, to = %remote, "connection migrating");
            self.visitor.on_connection_migration(remote);
            self.path.peer_addr = remote;
            if action.replace_send_algorithm {
                self.path.rtt = self.path.rtt.for_new_path(self.config.timers.initial_rtt);
            }
            if action.throttle_to_anti_amplification {
                self.path.validated = false;
            }
            if action.start_reverse_validation {
                let now = self.clock.now();
                let retry_timeout = self.path.rtt.smoothed_rtt() * 3;
                let (payload, _) = self.path_validator.start(&mut self.random, now, retry_timeout);
                let challenge = PathChallenge { data: payload };
                self.space_mut(PacketNumberSpace::Application)
                    .creator
                    .add_frame(&Frame::PathChallenge(challenge), 32);
            }
            let _ = action.migration_type;
        }

        Ok(())
    }

    // ---------------------------------------------------------------
    // Egress (spec.md §4.5)
    // ---------------------------------------------------------------

    /// Builds and writes as many datagrams as the send gates currently
    /// allow. Returns the number of datagrams written.
    pub fn poll_transmit(&mut self) -> usize {
        if self.state == ConnectionState::Closed {
            return 0;
        }
        let now = self.clock.now();
        let mut written = 0;

        for space in PacketNumberSpace::ALL {
            self.arm_ack_alarm_frame(space, now);
        }

        loop {
            let mut any_flushed = false;
            for space in PacketNumberSpace::ALL {
                if self.space(space).keys_discarded {
                    continue;
                }
                if let Some(created) = self.flush_space(space, now) {
                    any_flushed = true;
                    let level = match space {
                        PacketNumberSpace::Initial => EncryptionLevel::Initial,
                        PacketNumberSpace::Handshake => EncryptionLevel::Handshake,
                        PacketNumberSpace::Application => EncryptionLevel::OneRtt,
                    };
                    if let Some(encoded) = self.encode_and_encrypt(level, created) {
                        let max_dgram = self.writer.max_packet_size() as usize;
                        if self.coalesced.push(level, encoded, max_dgram).is_err() {
                            self.flush_datagram(now);
                            written += 1;
                        }
                    }
                }
            }
            if !any_flushed {
                break;
            }
        }

        if !self.coalesced.is_empty() {
            self.flush_datagram(now);
            written += 1;
        }

        written
    }

    fn arm_ack_alarm_frame(&mut self, space: PacketNumberSpace, now: Timestamp) {
        if self.timers.deadline(TimerId::Ack).map_or(false, |d| now >= d) {
            if let Some(ack_frame) = build_ack_frame(&self.space(space).received, now) {
                self.space_mut(space).creator.add_frame(&Frame::Ack(ack_frame), 32);
                self.space_mut(space).received.on_ack_sent();
            }
            self.timers.cancel(TimerId::Ack);
        }
    }

    fn flush_space(&mut self, space: PacketNumberSpace, now: Timestamp) -> Option<CreatedPacket> {
        let prospective_bytes = self.writer.max_packet_size() as usize;
        if !self
            .send_algorithm
            .can_send(self.space(space).sent_packets.bytes_in_flight(), prospective_bytes)
        {
            return None;
        }
        if let Some(budget) = self.path.amplification_budget() {
            if prospective_bytes > budget {
                return None;
            }
        }

        let created = self.space_mut(space).creator.flush()?;
        let bytes = created.payload.len() + self.encrypter.tag_len();

        self.space_mut(space).sent_packets.on_packet_sent(
            created.packet_number,
            SentPacketInfo {
                time_sent: now,
                bytes,
                ack_eliciting: created.ack_eliciting,
                in_flight: created.ack_eliciting,
                meta: SentPacketMeta {
                    contains_crypto: created.contains_crypto,
                    is_mtu_probe: created.is_mtu_probe,
                },
            },
        );
        self.send_algorithm.on_packet_sent(now, bytes, self.space(space).sent_packets.bytes_in_flight());
        self.path.on_bytes_sent(bytes);
        self.stats.on_packet_sent(bytes);
        self.idle.on_activity(now, bytes);

        if created.ack_eliciting {
            self.rearm_pto_timer();
            self.timers.cancel(TimerId::Ping);
        }

        Some(created)
    }

    /// Builds the on-wire header for `level` around the already-sealed
    /// packet number + payload + tag in `body`, consuming it. The header's
    /// `EncoderValue` impl writes the declared-length/`remaining` field
    /// last, so handing it `body` directly produces the complete packet
    /// in one pass (spec.md §4.5).
    fn write_header(&self, level: EncryptionLevel, pn_len: PacketNumberLen, body: &mut Vec<u8>) -> Vec<u8> {
        if level == EncryptionLevel::OneRtt {
            let key_phase_bit = if self.keys.phase() == KeyPhase::One { KEY_PHASE_MASK } else { 0 };
            ShortHeader {
                first_byte: 0x40 | key_phase_bit | pn_len.tag_bits(),
                destination_connection_id: self.peer_cid,
                remaining: body.as_mut_slice(),
            }
            .encode_to_vec()
        } else {
            let packet_type = match level {
                EncryptionLevel::Initial => PacketType::Initial,
                EncryptionLevel::Handshake => PacketType::Handshake,
                EncryptionLevel::ZeroRtt => PacketType::ZeroRtt,
                EncryptionLevel::OneRtt => unreachable!("handled above"),
            };
            let token = if packet_type == PacketType::Initial && !self.is_server {
                self.retry_token.as_deref()
            } else {
                None
            };
            let source_connection_id =
                id::PeerId::try_from_bytes(self.local_cid.as_bytes()).expect("LocalId and PeerId share a max length");
            LongHeader {
                packet_type,
                first_byte: 0x80 | 0x40 | packet_type.into_bits() | pn_len.tag_bits(),
                version: QUIC_VERSION_1,
                destination_connection_id: self.peer_cid,
                source_connection_id,
                token,
                retry_tag: None,
                remaining: body.as_mut_slice(),
            }
            .encode_to_vec()
        }
    }

    fn encode_and_encrypt(&mut self, level: EncryptionLevel, created: CreatedPacket) -> Option<Vec<u8>> {
        let pn_len = created.packet_number.truncate(self.space(level.packet_number_space()).sent_packets.largest_sent_packet());
        let pn_bytes = pn_len.encode_truncated(created.packet_number);

        let mut body = Vec::with_capacity(pn_bytes.as_slice().len() + created.payload.len() + self.encrypter.tag_len());
        body.extend_from_slice(pn_bytes.as_slice());
        body.extend_from_slice(&created.payload);
        body.resize(body.len() + self.encrypter.tag_len(), 0);

        self.encrypter
            .encrypt(level, self.keys.phase(), created.packet_number, &[], &mut body)
            .ok()?;

        Some(self.write_header(level, pn_len, &mut body))
    }

    fn flush_datagram(&mut self, now: Timestamp) {
        let max_dgram = self.writer.max_packet_size() as usize;
        if let Some(datagram) = self.coalesced.flush(max_dgram) {
            match self.writer.write_datagram(&datagram) {
                Ok(()) => {
                    self.timers.cancel(TimerId::Send);
                }
                Err(WriteError::Blocked) => {
                    self.visitor.on_write_blocked(EncryptionLevel::OneRtt);
                    self.timers.set(TimerId::Send, now + self.config.timers.alarm_granularity);
                }
                Err(WriteError::TooBig) => {}
                Err(WriteError::Fatal) => {
                    let error = transport::Error::packet_write_error();
                    let _ = self.close_now(error, CloseBehavior::Immediate);
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Timers (spec.md §4.8)
    // ---------------------------------------------------------------

    pub fn next_timer_deadline(&self) -> Option<Timestamp> {
        match (self.timers.next_expiration(), self.path_validator.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Drives every alarm that has fired as of `now`.
    pub fn on_timeout(&mut self) -> Result<(), ConnectionError> {
        let now = self.clock.now();
        let fired: Vec<TimerId> = self.timers.expired(now).collect();

        for id in fired {
            match id {
                TimerId::Idle => {
                    if self.idle.has_expired(now) {
                        return self.close_now(transport::Error::network_idle_timeout(), CloseBehavior::Silent);
                    }
                }
                TimerId::Handshake => {
                    if !self.is_handshake_confirmed() {
                        return self.close_now(transport::Error::handshake_timeout(), CloseBehavior::Immediate);
                    }
                }
                TimerId::Pto => {
                    self.on_pto_fired(now);
                }
                TimerId::BlackholeDetector => {
                    if let Some(stage) = self.blackhole.poll(now) {
                        match stage {
                            BlackholeStage::PathDegrading => {}
                            BlackholeStage::Close => {
                                return self.close_now(transport::Error::too_many_rtos(), CloseBehavior::Immediate);
                            }
                            BlackholeStage::MtuReduction => {
                                self.path.mtu.on_probe_failed();
                            }
                        }
                    }
                    self.rearm_blackhole_timer();
                }
                TimerId::Ping => {
                    self.timers.cancel(TimerId::Ping);
                    self.space_mut(PacketNumberSpace::Application)
                        .creator
                        .add_frame(&Frame::Ping(Ping::default()), 16);
                    self.rearm_ping_timer(now);
                }
                TimerId::Send => {
                    self.timers.cancel(TimerId::Send);
                    self.flush_datagram(now);
                }
                TimerId::MtuDiscovery => {
                    self.timers.cancel(TimerId::MtuDiscovery);
                    if let Some(probe_size) = self.path.mtu.next_probe_size() {
                        let space = self.space_mut(PacketNumberSpace::Application);
                        space.creator.pad_to(probe_size as usize);
                        space.creator.mark_mtu_probe();
                        self.timers
                            .set(TimerId::MtuDiscovery, now + self.config.timers.path_degrading_timeout);
                    }
                }
                TimerId::DiscardPreviousKeys => {
                    self.timers.cancel(TimerId::DiscardPreviousKeys);
                    self.keys.discard_previous_phase();
                }
                TimerId::ProcessUndecryptable => {
                    self.timers.cancel(TimerId::ProcessUndecryptable);
                    for level in [
                        EncryptionLevel::Initial,
                        EncryptionLevel::Handshake,
                        EncryptionLevel::ZeroRtt,
                        EncryptionLevel::OneRtt,
                    ] {
                        self.drain_undecryptable(now, level);
                    }
                }
                TimerId::Ack => {
                    self.timers.cancel(id);
                }
            }
        }

        self.poll_path_validation_retry(now);

        Ok(())
    }

    /// Drives [`PathValidator::on_retry_timeout`] once its own retry
    /// deadline has passed -- tracked out-of-band from [`TimerSet`] since
    /// it isn't a fixed alarm (spec.md §4.7).
    fn poll_path_validation_retry(&mut self, now: Timestamp) {
        let Some(deadline) = self.path_validator.next_deadline() else {
            return;
        };
        if now < deadline {
            return;
        }

        let retry_timeout = self.path.rtt.smoothed_rtt() * 3;
        let max_retries = self.config.path_validation_max_retries;
        let overall_deadline = self.config.timers.idle_timeout;
        match self
            .path_validator
            .on_retry_timeout(&mut self.random, now, retry_timeout, max_retries, overall_deadline)
        {
            Ok(payload) => {
                let challenge = PathChallenge { data: payload };
                self.space_mut(PacketNumberSpace::Application)
                    .creator
                    .add_frame(&Frame::PathChallenge(challenge), 32);
            }
            Err(result) => self.on_path_validation_result(result),
        }
    }

    fn on_pto_fired(&mut self, now: Timestamp) {
        for space in PacketNumberSpace::ALL {
            if self.space(space).keys_discarded {
                continue;
            }
            self.space_mut(space).pto.on_pto_fired();
            self.blackhole.on_pto_fired(now);
            if self.config.options.skip_packet_number_on_pto {
                self.space_mut(space).creator.on_pto_triggered();
            }
            self.space_mut(space).creator.add_frame(&Frame::Ping(Ping::default()), 16);
        }
        self.rearm_blackhole_timer();
        self.rearm_pto_timer();
    }

    /// Initiates a locally-driven key update (RFC 9001 §6; spec.md §4.4
    /// step 8). No-op if one is already in flight or the peer has
    /// disabled key update.
    pub fn initiate_key_update(&mut self) -> bool {
        if !self.visitor.supports_key_update() {
            return false;
        }
        let next_pn = self.application.sent_packets.largest_sent_packet().map(|pn| pn.as_u64() + 1).unwrap_or(0);
        let now = self.clock.now();
        let started = self.keys.initiate_update(now, next_pn);
        if started {
            debug!("initiating local key update");
            let pto = self.application.pto.pto_duration(&self.path.rtt, PacketNumberSpace::Application);
            self.timers.set(TimerId::DiscardPreviousKeys, now + pto * 3);
        }
        started
    }

    // ---------------------------------------------------------------
    // Close (spec.md §4.8 "Connection close procedure")
    // ---------------------------------------------------------------

    pub fn close(&mut self, error: transport::Error, behavior: CloseBehavior) -> Result<(), ConnectionError> {
        self.close_now(error, behavior)
    }

    fn close_now(&mut self, error: transport::Error, behavior: CloseBehavior) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Closed || self.state == ConnectionState::Closing {
            return Ok(());
        }

        debug!(code = ?error.code, ?behavior, "closing connection");
        self.close_error = Some(error);
        self.state = ConnectionState::Closing;
        self.visitor.on_connection_closed(&error, CloseSource::FromSelf);

        if behavior == CloseBehavior::Immediate {
            let frame = close::build_close_frame(&error);
            for space in [PacketNumberSpace::Initial, PacketNumberSpace::Handshake, PacketNumberSpace::Application] {
                if !self.space(space).keys_discarded {
                    let frame = ConnectionClose {
                        is_application_error: frame.is_application_error,
                        error_code: frame.error_code,
                        frame_type: frame.frame_type,
                        reason: frame.reason,
                    };
                    self.space_mut(space).creator.add_frame(&Frame::ConnectionClose(frame), 32);
                }
            }
        }

        self.state = ConnectionState::Closed;
        let err = ConnectionError::local(error, behavior);
        Err(err)
    }
}
