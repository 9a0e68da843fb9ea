// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! `CloseConnection` (spec.md §4.8 "Connection close procedure").

use crate::capability::CloseSource;
use crate::transport;
use crate::wire::frame::connection_close::ConnectionClose;

/// Whether a `CONNECTION_CLOSE` is actually written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBehavior {
    /// Build and (rate-limited) retransmit a `CONNECTION_CLOSE` frame.
    Immediate,
    /// Mark the connection closed and record it in stats without ever
    /// sending a frame.
    Silent,
}

/// Why the connection closed, surfaced to the embedder once (spec.md
/// §4.8, §3 Lifecycle "Closed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionError {
    pub error: transport::Error,
    pub source: CloseSource,
    pub behavior: CloseBehavior,
}

impl ConnectionError {
    pub fn new(error: transport::Error, source: CloseSource, behavior: CloseBehavior) -> Self {
        Self {
            error,
            source,
            behavior,
        }
    }

    pub fn local(error: transport::Error, behavior: CloseBehavior) -> Self {
        Self::new(error, CloseSource::FromSelf, behavior)
    }

    pub fn from_peer(error: transport::Error) -> Self {
        Self::new(error, CloseSource::FromPeer, CloseBehavior::Silent)
    }
}

impl core::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConnectionError {}

/// Builds the wire `CONNECTION_CLOSE` frame for `error`, application-coded
/// if it arrived via [`transport::error::Code::APPLICATION_ERROR`]-style
/// application-layer signaling. The core only ever raises transport-level
/// errors itself; application-level closes are passed through from the
/// stream layer via [`crate::capability::Visitor`] (out of this crate's
/// scope, spec.md §1).
pub fn build_close_frame(error: &transport::Error) -> ConnectionClose<'static> {
    ConnectionClose {
        is_application_error: false,
        error_code: error.code.0,
        frame_type: error.frame_type,
        reason: error.reason.as_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_frame_carries_the_mapped_transport_code() {
        let error = transport::Error::network_idle_timeout();
        let frame = build_close_frame(&error);
        assert_eq!(frame.error_code, transport::error::Code::INTERNAL_ERROR.0);
        assert!(!frame.is_application_error);
    }
}
