// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenario tests driving [`Connection`] against fake
//! capabilities, the way `s2n-quic-transport`'s own connection tests
//! drive `ConnectionImpl` against a fake `Endpoint::Config`.

use std::cell::{Cell, RefCell};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;

use quic_endpoint_core::capability::{
    AeadError, CloseSource, Clock, DataProducer, Decrypter, Encrypter, LossDetection, PacketWriter,
    Random, SendAlgorithm, Visitor, WriteError,
};
use quic_endpoint_core::connection::id::{LocalId, PeerId};
use quic_endpoint_core::connection::{Connection, ConnectionState};
use quic_endpoint_core::recovery::{LossInfo, RttEstimator, SentPacketTable};
use quic_endpoint_core::wire::packet::long::{LongHeader, PacketType};
use quic_endpoint_core::wire::packet::short::ShortHeader;
use quic_endpoint_core::wire::packet::{EncryptionLevel, QUIC_VERSION_1};
use quic_endpoint_core::{Config, Timestamp, TransportError};
use s2n_codec::EncoderValue;

struct FakeClock(Cell<Timestamp>);

impl FakeClock {
    fn new() -> Self {
        Self(Cell::new(Timestamp::ZERO))
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Timestamp {
        self.0.get()
    }
}

struct FakeRandom(u8);

impl Random for FakeRandom {
    fn fill(&mut self, dest: &mut [u8]) {
        for b in dest {
            *b = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }
}

#[derive(Default)]
struct FakeCongestion;

impl SendAlgorithm for FakeCongestion {
    fn on_packet_sent(&mut self, _now: Timestamp, _bytes_sent: usize, _bytes_in_flight: usize) {}
    fn on_ack(&mut self, _now: Timestamp, _newly_acked_bytes: usize, _rtt: &RttEstimator) {}
    fn on_packets_lost(&mut self, _now: Timestamp, _lost_bytes: usize, _persistent_congestion: bool) {}
    fn congestion_window(&self) -> u32 {
        u32::MAX
    }
    fn bytes_in_flight(&self) -> u32 {
        0
    }
    fn is_congestion_limited(&self) -> bool {
        false
    }
}

/// Never reports a loss; these tests only exercise the ingress/egress
/// plumbing, not RFC 9002 loss math (explicitly out of scope).
struct NoLoss;

impl<Meta> LossDetection<Meta> for NoLoss {
    fn detect_and_remove_lost_packets(
        &mut self,
        _now: Timestamp,
        _rtt: &RttEstimator,
        _sent_packets: &mut SentPacketTable<Meta>,
    ) -> LossInfo {
        LossInfo::default()
    }
}

/// Header-protection/AEAD are out of this crate's scope; the fake simply
/// passes bytes through unmodified so the dispatch/framing logic above it
/// can be exercised without real key material.
struct IdentityCrypto;

impl Encrypter for IdentityCrypto {
    fn encrypt(
        &self,
        _level: EncryptionLevel,
        _key_phase: quic_endpoint_core::crypto::KeyPhase,
        _packet_number: quic_endpoint_core::wire::packet::PacketNumber,
        _header: &[u8],
        _payload_in_out: &mut [u8],
    ) -> Result<(), AeadError> {
        Ok(())
    }

    fn tag_len(&self) -> usize {
        0
    }
}

impl Decrypter for IdentityCrypto {
    fn decrypt(
        &self,
        _level: EncryptionLevel,
        _key_phase: quic_endpoint_core::crypto::KeyPhase,
        _packet_number: quic_endpoint_core::wire::packet::PacketNumber,
        _header: &[u8],
        _payload_in_out: &mut [u8],
    ) -> Result<(), AeadError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingWriter {
    datagrams: Vec<Vec<u8>>,
}

impl PacketWriter for RecordingWriter {
    fn write_datagram(&mut self, datagram: &[u8]) -> Result<(), WriteError> {
        self.datagrams.push(datagram.to_vec());
        Ok(())
    }

    fn max_packet_size(&self) -> u16 {
        1200
    }
}

struct NoData;

impl DataProducer for NoData {
    fn poll_produce(&mut self, _stream_id: u64, _offset: u64, _max_len: usize) -> Option<(bytes::Bytes, bool)> {
        None
    }
}

#[derive(Default)]
struct Events {
    migrations: Vec<SocketAddr>,
    retries: Vec<Vec<u8>>,
    closes: Vec<(TransportError, CloseSource)>,
    handshake_confirmed: bool,
}

#[derive(Clone, Default)]
struct RecordingVisitor(Rc<RefCell<Events>>);

impl Visitor for RecordingVisitor {
    fn on_connection_migration(&mut self, new_peer: SocketAddr) {
        self.0.borrow_mut().migrations.push(new_peer);
    }

    fn on_retry_received(&mut self, new_token: &[u8]) {
        self.0.borrow_mut().retries.push(new_token.to_vec());
    }

    fn on_connection_closed(&mut self, error: &TransportError, source: CloseSource) {
        self.0.borrow_mut().closes.push((*error, source));
    }

    fn on_handshake_confirmed(&mut self) {
        self.0.borrow_mut().handshake_confirmed = true;
    }

    fn is_handshake_confirmed(&self) -> bool {
        self.0.borrow().handshake_confirmed
    }
}

type TestConnection = Connection<
    FakeClock,
    FakeRandom,
    FakeCongestion,
    NoLoss,
    IdentityCrypto,
    IdentityCrypto,
    RecordingWriter,
    NoData,
    RecordingVisitor,
>;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
}

fn cid(fill: u8) -> [u8; 20] {
    [fill; 20]
}

fn new_connection(is_server: bool, events: Rc<RefCell<Events>>) -> TestConnection {
    Connection::new(
        Config::new(),
        is_server,
        addr(4000),
        addr(5000),
        LocalId::try_from_bytes(&cid(0xaa)).unwrap(),
        PeerId::try_from_bytes(&cid(0xbb)).unwrap(),
        FakeClock::new(),
        FakeRandom(1),
        FakeCongestion::default(),
        NoLoss,
        IdentityCrypto,
        IdentityCrypto,
        RecordingWriter::default(),
        NoData,
        RecordingVisitor(events),
    )
}

/// Encodes a single 1-RTT short-header datagram carrying `frame`, using
/// the identity crypto fake (no header protection, no AEAD tag) so
/// `on_datagram_received` can decode it straight through.
fn one_rtt_datagram(dcid: [u8; 20], packet_number: u8, frame: &quic_endpoint_core::wire::frame::Frame<'_>) -> Vec<u8> {
    let mut body = vec![packet_number];
    body.extend_from_slice(&frame.encode_to_vec());
    ShortHeader {
        first_byte: 0x40,
        destination_connection_id: PeerId::try_from_bytes(&dcid).unwrap(),
        remaining: body.as_mut_slice(),
    }
    .encode_to_vec()
}

#[test]
fn new_connection_starts_handshaking() {
    let conn = new_connection(true, Rc::new(RefCell::new(Events::default())));
    assert_eq!(conn.state(), ConnectionState::Handshaking);
    assert!(!conn.is_handshake_confirmed());
}

#[test]
fn server_receiving_handshake_done_is_rejected() {
    // HANDSHAKE_DONE is client-bound only (RFC 9000 §19.20); a server
    // receiving one is a protocol violation that must close the connection.
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(true, events.clone());

    let frame = quic_endpoint_core::wire::frame::Frame::HandshakeDone(
        quic_endpoint_core::wire::frame::misc::HandshakeDone::default(),
    );
    let mut datagram = one_rtt_datagram(cid(0xaa), 1, &frame);

    let result = conn.on_datagram_received(&mut datagram, addr(5000));
    assert!(result.is_err());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(events.borrow().closes.len(), 1);
    assert_eq!(events.borrow().closes[0].1, CloseSource::FromSelf);
}

#[test]
fn client_handshake_done_transitions_to_connected() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(false, events.clone());

    let frame = quic_endpoint_core::wire::frame::Frame::HandshakeDone(
        quic_endpoint_core::wire::frame::misc::HandshakeDone::default(),
    );
    let mut datagram = one_rtt_datagram(cid(0xaa), 1, &frame);

    conn.on_datagram_received(&mut datagram, addr(5000)).unwrap();
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert!(events.borrow().handshake_confirmed);
    assert_eq!(conn.stats().packets_processed, 1);
}

#[test]
fn server_address_change_without_migration_disabled_starts_path_validation() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(true, events.clone());

    let frame = quic_endpoint_core::wire::frame::Frame::Ping(quic_endpoint_core::wire::frame::misc::Ping::default());
    let mut datagram = one_rtt_datagram(cid(0xaa), 1, &frame);

    let new_peer = addr(5001);
    conn.on_datagram_received(&mut datagram, new_peer).unwrap();

    assert_eq!(events.borrow().migrations, vec![new_peer]);
    // A PATH_CHALLENGE should now be queued for the application space;
    // poll_transmit must emit at least one datagram carrying it.
    assert!(conn.poll_transmit() > 0);
}

#[test]
fn disable_active_migration_closes_on_address_change() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(true, events.clone());
    conn.on_transport_parameters(&quic_endpoint_core::transport::parameters::PeerTransportParameters {
        disable_active_migration: true,
        ..Default::default()
    });

    let frame = quic_endpoint_core::wire::frame::Frame::Ping(quic_endpoint_core::wire::frame::misc::Ping::default());
    let mut datagram = one_rtt_datagram(cid(0xaa), 1, &frame);

    let result = conn.on_datagram_received(&mut datagram, addr(5001));
    assert!(result.is_err());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(events.borrow().migrations.is_empty());
}

#[test]
fn retry_updates_destination_connection_id_and_notifies_visitor() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(false, events.clone());

    let new_scid = cid(0xcc);
    let token = b"retry-token".to_vec();
    let mut remaining = token.clone();
    let tag = [0u8; 16];
    let header = LongHeader {
        packet_type: PacketType::Retry,
        first_byte: 0x80 | 0x40 | PacketType::Retry.into_bits(),
        version: QUIC_VERSION_1,
        destination_connection_id: PeerId::try_from_bytes(&cid(0xaa)).unwrap(),
        source_connection_id: PeerId::try_from_bytes(&new_scid).unwrap(),
        token: None,
        retry_tag: Some(&tag),
        remaining: remaining.as_mut_slice(),
    };
    let mut datagram = header.encode_to_vec();

    conn.on_datagram_received(&mut datagram, addr(5000)).unwrap();

    assert_eq!(events.borrow().retries, vec![token]);
    assert_eq!(conn.stats().retry_packet_processed, 1);

    // A second Retry must be ignored (RFC 9000 §17.2.5).
    let new_scid2 = cid(0xdd);
    let mut remaining2 = b"ignored".to_vec();
    let header2 = LongHeader {
        packet_type: PacketType::Retry,
        first_byte: 0x80 | 0x40 | PacketType::Retry.into_bits(),
        version: QUIC_VERSION_1,
        destination_connection_id: PeerId::try_from_bytes(&cid(0xaa)).unwrap(),
        source_connection_id: PeerId::try_from_bytes(&new_scid2).unwrap(),
        token: None,
        retry_tag: Some(&tag),
        remaining: remaining2.as_mut_slice(),
    };
    let mut datagram2 = header2.encode_to_vec();
    conn.on_datagram_received(&mut datagram2, addr(5000)).unwrap();

    assert_eq!(events.borrow().retries.len(), 1, "a second retry must not be acted on");
}

#[test]
fn server_never_acts_on_retry() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(true, events.clone());

    let mut remaining = b"token".to_vec();
    let tag = [0u8; 16];
    let header = LongHeader {
        packet_type: PacketType::Retry,
        first_byte: 0x80 | 0x40 | PacketType::Retry.into_bits(),
        version: QUIC_VERSION_1,
        destination_connection_id: PeerId::try_from_bytes(&cid(0xaa)).unwrap(),
        source_connection_id: PeerId::try_from_bytes(&cid(0xcc)).unwrap(),
        token: None,
        retry_tag: Some(&tag),
        remaining: remaining.as_mut_slice(),
    };
    let mut datagram = header.encode_to_vec();

    conn.on_datagram_received(&mut datagram, addr(5000)).unwrap();
    assert!(events.borrow().retries.is_empty());
}

#[test]
fn initiate_key_update_is_idempotent_until_peer_acks() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(false, events);

    assert!(conn.initiate_key_update());
    // A second call while the first update is still in flight is a no-op.
    assert!(!conn.initiate_key_update());
}

#[test]
fn close_notifies_visitor_and_moves_to_closed() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(true, events.clone());

    let err = conn.close(TransportError::ietf_protocol_violation(), quic_endpoint_core::connection::CloseBehavior::Immediate);
    assert!(err.is_err());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(events.borrow().closes.len(), 1);
    assert_eq!(events.borrow().closes[0].1, CloseSource::FromSelf);

    // A closed connection accepts no further datagrams or transmits.
    let frame = quic_endpoint_core::wire::frame::Frame::Ping(quic_endpoint_core::wire::frame::misc::Ping::default());
    let mut datagram = one_rtt_datagram(cid(0xaa), 1, &frame);
    conn.on_datagram_received(&mut datagram, addr(5000)).unwrap();
    assert_eq!(conn.poll_transmit(), 0);
}

#[test]
fn receiving_a_packet_arms_the_idle_timer_without_expiring_it() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut conn = new_connection(true, events);

    let frame = quic_endpoint_core::wire::frame::Frame::Ping(quic_endpoint_core::wire::frame::misc::Ping::default());
    let mut datagram = one_rtt_datagram(cid(0xaa), 1, &frame);
    conn.on_datagram_received(&mut datagram, addr(5000)).unwrap();

    assert!(conn.next_timer_deadline().is_some());
    // The fake clock never advances past the deadline, so draining fired
    // timers must not close the connection out from under the test.
    conn.on_timeout().unwrap();
    assert_eq!(conn.state(), ConnectionState::Handshaking);
}
