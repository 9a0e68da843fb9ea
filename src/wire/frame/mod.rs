// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QUIC frame types (spec.md §3 "Frame", §6 frame-type table).
//!
//! Every frame lives in its own module, the way `s2n-quic-core::frame`
//! lays them out; [`Frame`] is the tagged union the ingress pipeline
//! dispatches on and the egress [`crate::creator::PacketCreator`]
//! serializes.

pub mod ack;
pub mod ack_frequency;
pub mod connection_close;
pub mod crypto;
pub mod data_blocked;
pub mod datagram;
pub mod max_data;
pub mod max_stream_data;
pub mod max_streams;
pub mod misc;
pub mod new_connection_id;
pub mod new_token;
pub mod path_challenge;
pub mod path_response;
pub mod reset_stream;
pub mod retire_connection_id;
pub mod stop_sending;
pub mod stream;
pub mod stream_data_blocked;
pub mod streams_blocked;

pub use ack::Ack;
pub use ack_frequency::AckFrequency;
pub use connection_close::ConnectionClose;
pub use crypto::Crypto;
pub use data_blocked::DataBlocked;
pub use datagram::Datagram;
pub use max_data::MaxData;
pub use max_stream_data::MaxStreamData;
pub use max_streams::MaxStreams;
pub use misc::{HandshakeDone, Padding, Ping};
pub use new_connection_id::NewConnectionId;
pub use new_token::NewToken;
pub use path_challenge::PathChallenge;
pub use path_response::PathResponse;
pub use reset_stream::ResetStream;
pub use retire_connection_id::RetireConnectionId;
pub use stop_sending::StopSending;
pub use stream::Stream;
pub use stream_data_blocked::StreamDataBlocked;
pub use streams_blocked::StreamsBlocked;

use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

pub(crate) type Tag = u64;

/// Frame-type tags (RFC 9000 §19; `ACK_FREQUENCY` is the unassigned
/// extension from draft-ietf-quic-ack-frequency, spec.md §6).
pub mod tag {
    use super::Tag;

    pub const PADDING: Tag = 0x00;
    pub const PING: Tag = 0x01;
    pub const ACK: Tag = 0x02;
    pub const ACK_ECN: Tag = 0x03;
    pub const RESET_STREAM: Tag = 0x04;
    pub const STOP_SENDING: Tag = 0x05;
    pub const CRYPTO: Tag = 0x06;
    pub const NEW_TOKEN: Tag = 0x07;
    pub const STREAM_START: Tag = 0x08;
    pub const STREAM_END: Tag = 0x0f;
    pub const MAX_DATA: Tag = 0x10;
    pub const MAX_STREAM_DATA: Tag = 0x11;
    pub const MAX_STREAMS_BIDI: Tag = 0x12;
    pub const MAX_STREAMS_UNI: Tag = 0x13;
    pub const DATA_BLOCKED: Tag = 0x14;
    pub const STREAM_DATA_BLOCKED: Tag = 0x15;
    pub const STREAMS_BLOCKED_BIDI: Tag = 0x16;
    pub const STREAMS_BLOCKED_UNI: Tag = 0x17;
    pub const NEW_CONNECTION_ID: Tag = 0x18;
    pub const RETIRE_CONNECTION_ID: Tag = 0x19;
    pub const PATH_CHALLENGE: Tag = 0x1a;
    pub const PATH_RESPONSE: Tag = 0x1b;
    pub const CONNECTION_CLOSE_TRANSPORT: Tag = 0x1c;
    pub const CONNECTION_CLOSE_APPLICATION: Tag = 0x1d;
    pub const HANDSHAKE_DONE: Tag = 0x1e;
    pub const DATAGRAM_START: Tag = 0x30;
    pub const DATAGRAM_END: Tag = 0x31;
    /// Unassigned IANA codepoint; spec.md marks ACK_FREQUENCY as
    /// experimental, so this value is a placeholder pending assignment.
    pub const ACK_FREQUENCY: Tag = 0xaf;
}

/// Describes if a frame elicits an ACK from the peer (RFC 9002 §2: "All
/// frames other than ACK, PADDING, and CONNECTION_CLOSE").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AckElicitation {
    NonEliciting,
    Eliciting,
}

impl AckElicitation {
    #[inline]
    pub fn is_ack_eliciting(self) -> bool {
        matches!(self, Self::Eliciting)
    }
}

/// A decoded QUIC frame, owning its payload by borrowing from the
/// decrypted packet buffer it was parsed out of.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Padding(Padding),
    Ping(Ping),
    Ack(Ack),
    ResetStream(ResetStream),
    StopSending(StopSending),
    Crypto(Crypto<'a>),
    NewToken(NewToken<'a>),
    Stream(Stream<'a>),
    MaxData(MaxData),
    MaxStreamData(MaxStreamData),
    MaxStreams(MaxStreams),
    DataBlocked(DataBlocked),
    StreamDataBlocked(StreamDataBlocked),
    StreamsBlocked(StreamsBlocked),
    NewConnectionId(NewConnectionId<'a>),
    RetireConnectionId(RetireConnectionId),
    PathChallenge(PathChallenge),
    PathResponse(PathResponse),
    ConnectionClose(ConnectionClose<'a>),
    HandshakeDone(HandshakeDone),
    Datagram(Datagram<'a>),
    AckFrequency(AckFrequency),
}

impl<'a> Frame<'a> {
    pub fn ack_elicitation(&self) -> AckElicitation {
        use AckElicitation::*;
        match self {
            Frame::Ack(_) | Frame::Padding(_) | Frame::ConnectionClose(_) => NonEliciting,
            _ => Eliciting,
        }
    }

    /// Whether this frame is "congestion controlled" (i.e. counts toward
    /// bytes-in-flight and is retransmitted on loss). ACK and PADDING are
    /// not; CONNECTION_CLOSE and PATH_RESPONSE are sent but never
    /// retransmitted by the loss-recovery machinery.
    pub fn is_retransmittable(&self) -> bool {
        !matches!(
            self,
            Frame::Ack(_) | Frame::Padding(_) | Frame::ConnectionClose(_) | Frame::PathResponse(_)
        )
    }

    /// Decodes one frame from the front of `buffer`, returning the frame
    /// and the remaining buffer. `DecoderError::UnexpectedEnd` is returned
    /// for frame types that are recognized but whose encoding is
    /// malformed; unknown extension tags return
    /// `DecoderError::InvariantViolation`.
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer): (VarInt, _) = buffer.decode()?;
        let tag = tag.as_u64();
        match tag {
            tag::PADDING => Padding::decode(buffer).map(|(f, b)| (Frame::Padding(f), b)),
            tag::PING => Ping::decode(buffer).map(|(f, b)| (Frame::Ping(f), b)),
            tag::ACK | tag::ACK_ECN => {
                Ack::decode(tag == tag::ACK_ECN, buffer).map(|(f, b)| (Frame::Ack(f), b))
            }
            tag::RESET_STREAM => {
                ResetStream::decode(buffer).map(|(f, b)| (Frame::ResetStream(f), b))
            }
            tag::STOP_SENDING => {
                StopSending::decode(buffer).map(|(f, b)| (Frame::StopSending(f), b))
            }
            tag::CRYPTO => Crypto::decode(buffer).map(|(f, b)| (Frame::Crypto(f), b)),
            tag::NEW_TOKEN => NewToken::decode(buffer).map(|(f, b)| (Frame::NewToken(f), b)),
            tag::STREAM_START..=tag::STREAM_END => {
                Stream::decode(tag as u8, buffer).map(|(f, b)| (Frame::Stream(f), b))
            }
            tag::MAX_DATA => MaxData::decode(buffer).map(|(f, b)| (Frame::MaxData(f), b)),
            tag::MAX_STREAM_DATA => {
                MaxStreamData::decode(buffer).map(|(f, b)| (Frame::MaxStreamData(f), b))
            }
            tag::MAX_STREAMS_BIDI | tag::MAX_STREAMS_UNI => {
                MaxStreams::decode(tag == tag::MAX_STREAMS_UNI, buffer)
                    .map(|(f, b)| (Frame::MaxStreams(f), b))
            }
            tag::DATA_BLOCKED => {
                DataBlocked::decode(buffer).map(|(f, b)| (Frame::DataBlocked(f), b))
            }
            tag::STREAM_DATA_BLOCKED => {
                StreamDataBlocked::decode(buffer).map(|(f, b)| (Frame::StreamDataBlocked(f), b))
            }
            tag::STREAMS_BLOCKED_BIDI | tag::STREAMS_BLOCKED_UNI => {
                StreamsBlocked::decode(tag == tag::STREAMS_BLOCKED_UNI, buffer)
                    .map(|(f, b)| (Frame::StreamsBlocked(f), b))
            }
            tag::NEW_CONNECTION_ID => {
                NewConnectionId::decode(buffer).map(|(f, b)| (Frame::NewConnectionId(f), b))
            }
            tag::RETIRE_CONNECTION_ID => {
                RetireConnectionId::decode(buffer).map(|(f, b)| (Frame::RetireConnectionId(f), b))
            }
            tag::PATH_CHALLENGE => {
                PathChallenge::decode(buffer).map(|(f, b)| (Frame::PathChallenge(f), b))
            }
            tag::PATH_RESPONSE => {
                PathResponse::decode(buffer).map(|(f, b)| (Frame::PathResponse(f), b))
            }
            tag::CONNECTION_CLOSE_TRANSPORT | tag::CONNECTION_CLOSE_APPLICATION => {
                ConnectionClose::decode(tag == tag::CONNECTION_CLOSE_APPLICATION, buffer)
                    .map(|(f, b)| (Frame::ConnectionClose(f), b))
            }
            tag::HANDSHAKE_DONE => {
                HandshakeDone::decode(buffer).map(|(f, b)| (Frame::HandshakeDone(f), b))
            }
            tag::DATAGRAM_START..=tag::DATAGRAM_END => {
                Datagram::decode(tag as u8, buffer).map(|(f, b)| (Frame::Datagram(f), b))
            }
            tag::ACK_FREQUENCY => {
                AckFrequency::decode(buffer).map(|(f, b)| (Frame::AckFrequency(f), b))
            }
            _ => Err(DecoderError::InvariantViolation("unrecognized frame type")),
        }
    }
}

impl<'a> EncoderValue for Frame<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        match self {
            Frame::Padding(f) => buffer.encode(f),
            Frame::Ping(f) => buffer.encode(f),
            Frame::Ack(f) => buffer.encode(f),
            Frame::ResetStream(f) => buffer.encode(f),
            Frame::StopSending(f) => buffer.encode(f),
            Frame::Crypto(f) => buffer.encode(f),
            Frame::NewToken(f) => buffer.encode(f),
            Frame::Stream(f) => buffer.encode(f),
            Frame::MaxData(f) => buffer.encode(f),
            Frame::MaxStreamData(f) => buffer.encode(f),
            Frame::MaxStreams(f) => buffer.encode(f),
            Frame::DataBlocked(f) => buffer.encode(f),
            Frame::StreamDataBlocked(f) => buffer.encode(f),
            Frame::StreamsBlocked(f) => buffer.encode(f),
            Frame::NewConnectionId(f) => buffer.encode(f),
            Frame::RetireConnectionId(f) => buffer.encode(f),
            Frame::PathChallenge(f) => buffer.encode(f),
            Frame::PathResponse(f) => buffer.encode(f),
            Frame::ConnectionClose(f) => buffer.encode(f),
            Frame::HandshakeDone(f) => buffer.encode(f),
            Frame::Datagram(f) => buffer.encode(f),
            Frame::AckFrequency(f) => buffer.encode(f),
        }
    }
}
