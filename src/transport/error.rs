// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The closed set of error codes the core raises or maps to, and the
//! `CONNECTION_CLOSE` wire encoding they turn into (spec.md §7).

use crate::varint::VarInt;
use core::fmt;

/// A transport-level error code, as carried in a `CONNECTION_CLOSE` frame of
/// type `0x1c` (RFC 9000 §19.19).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Code(pub VarInt);

macro_rules! def_code {
    ($doc:expr, $name:ident, $value:expr) => {
        impl Code {
            #[doc = $doc]
            pub const $name: Code = Code(VarInt::new_saturating($value));
        }
    };
}

def_code!("No error; connection closed abruptly without cause.", NO_ERROR, 0x0);
def_code!("Internal error; cannot continue with the connection.", INTERNAL_ERROR, 0x1);
def_code!("Received more data than permitted by advertised limits.", FLOW_CONTROL_ERROR, 0x3);
def_code!("Peer violated a QUIC-invariant-level protocol rule.", PROTOCOL_VIOLATION, 0xa);
def_code!("Number of open connection IDs exceeds the advertised limit.", CONNECTION_ID_LIMIT_ERROR, 0x9);
def_code!("Frame encoding was syntactically invalid.", FRAME_ENCODING_ERROR, 0x7);
def_code!("An endpoint has reached the confidentiality or integrity limit for a packet protection key.", AEAD_LIMIT_REACHED, 0x18);
def_code!("The endpoint detected that its peer created multiple connection IDs with the same sequence number.", CONNECTION_ID_LIMIT_REACHED, 0x9);
def_code!("The requested operation cannot be completed because of the current application state.", APPLICATION_ERROR, 0xc);

/// A `CONNECTION_CLOSE` frame's payload: a code, the frame type that
/// triggered it (if any), and a diagnostic string that is never sent on the
/// wire at the application-close level but may be at the transport level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error {
    pub code: Code,
    pub frame_type: Option<VarInt>,
    pub reason: &'static str,
}

impl Error {
    pub const fn new(code: Code, reason: &'static str) -> Self {
        Self {
            code,
            frame_type: None,
            reason,
        }
    }

    pub const fn with_frame_type(mut self, frame_type: VarInt) -> Self {
        self.frame_type = Some(frame_type);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "TransportError({})", self.code.0)
        } else {
            f.write_str(self.reason)
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Named constructors realizing every `QUIC_*` name in spec.md §7, mapped
/// onto the IETF transport error space they encode as
/// (`QuicErrorCodeToTransportErrorCode`, as the spec names it).
impl Error {
    pub const fn invalid_ack_data() -> Self {
        Self::new(Code::FRAME_ENCODING_ERROR, "QUIC_INVALID_ACK_DATA")
    }

    pub const fn invalid_stop_waiting_data() -> Self {
        Self::new(Code::FRAME_ENCODING_ERROR, "QUIC_INVALID_STOP_WAITING_DATA")
    }

    pub const fn invalid_version() -> Self {
        Self::new(Code::PROTOCOL_VIOLATION, "QUIC_INVALID_VERSION")
    }

    pub const fn invalid_version_negotiation_packet() -> Self {
        Self::new(
            Code::PROTOCOL_VIOLATION,
            "QUIC_INVALID_VERSION_NEGOTIATION_PACKET",
        )
    }

    pub const fn unencrypted_stream_data() -> Self {
        Self::new(Code::PROTOCOL_VIOLATION, "QUIC_UNENCRYPTED_STREAM_DATA")
    }

    pub const fn maybe_corrupted_memory() -> Self {
        Self::new(Code::INTERNAL_ERROR, "QUIC_MAYBE_CORRUPTED_MEMORY")
    }

    pub const fn invalid_0rtt_packet_number_out_of_order() -> Self {
        Self::new(
            Code::PROTOCOL_VIOLATION,
            "QUIC_INVALID_0RTT_PACKET_NUMBER_OUT_OF_ORDER",
        )
    }

    pub const fn ietf_protocol_violation() -> Self {
        Self::new(Code::PROTOCOL_VIOLATION, "IETF_QUIC_PROTOCOL_VIOLATION")
    }

    pub const fn too_many_buffered_control_frames() -> Self {
        Self::new(
            Code::INTERNAL_ERROR,
            "QUIC_TOO_MANY_BUFFERED_CONTROL_FRAMES",
        )
    }

    pub const fn too_many_outstanding_sent_packets() -> Self {
        Self::new(
            Code::INTERNAL_ERROR,
            "QUIC_TOO_MANY_OUTSTANDING_SENT_PACKETS",
        )
    }

    pub const fn too_many_rtos() -> Self {
        Self::new(Code::INTERNAL_ERROR, "QUIC_TOO_MANY_RTOS")
    }

    pub const fn aead_limit_reached() -> Self {
        Self::new(Code::AEAD_LIMIT_REACHED, "QUIC_AEAD_LIMIT_REACHED")
    }

    pub const fn error_migrating_address() -> Self {
        Self::new(Code::INTERNAL_ERROR, "QUIC_ERROR_MIGRATING_ADDRESS")
    }

    pub const fn peer_going_away() -> Self {
        Self::new(Code::NO_ERROR, "QUIC_PEER_GOING_AWAY")
    }

    pub const fn attempt_to_send_unencrypted_stream_data() -> Self {
        Self::new(
            Code::INTERNAL_ERROR,
            "QUIC_ATTEMPT_TO_SEND_UNENCRYPTED_STREAM_DATA",
        )
    }

    pub const fn packet_write_error() -> Self {
        Self::new(Code::INTERNAL_ERROR, "QUIC_PACKET_WRITE_ERROR")
    }

    pub const fn network_idle_timeout() -> Self {
        Self::new(Code::INTERNAL_ERROR, "QUIC_NETWORK_IDLE_TIMEOUT")
    }

    pub const fn handshake_timeout() -> Self {
        Self::new(Code::INTERNAL_ERROR, "QUIC_HANDSHAKE_TIMEOUT")
    }

    pub const fn public_reset() -> Self {
        Self::new(Code::NO_ERROR, "QUIC_PUBLIC_RESET")
    }
}
