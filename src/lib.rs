// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection QUIC (RFC 9000) state machine.
//!
//! This crate owns packet encryption/decryption dispatch, the three
//! packet-number spaces, loss-detection and congestion-controller wiring,
//! path validation and migration, key update, connection timers, and
//! connection termination. Congestion control, loss-detection math,
//! cryptographic primitives, the stream/application layer, and UDP I/O are
//! external capabilities consumed through the traits in [`capability`].

#![forbid(unsafe_code)]

extern crate alloc;

pub mod ack;
pub mod capability;
pub mod coalescer;
pub mod config;
pub mod connection;
pub mod creator;
pub mod crypto;
pub mod detector;
pub(crate) mod log;
pub mod path;
pub mod recovery;
pub mod stats;
pub mod time;
pub mod timer;
pub mod transport;
pub mod undecryptable;
pub mod varint;
pub mod wire;

pub use config::Config;
pub use connection::{Connection, ConnectionError};
pub use stats::Stats;
pub use time::Timestamp;
pub use transport::error::Error as TransportError;
pub use varint::VarInt;
