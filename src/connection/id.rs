// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QUIC connection IDs (spec.md §3 "ConnectionId").
//!
//! Both endpoints maintain a *local* id space (ids this endpoint chose and
//! the peer addresses packets to) and a *peer* id space (ids the peer
//! chose). The two are kept as distinct types so a value from one can never
//! be accidentally compared against or substituted for the other.

use core::{convert::TryFrom, fmt};
use s2n_codec::{DecoderBuffer, DecoderBufferMut, DecoderError, Encoder, EncoderValue};

/// The maximum size of a connection ID (RFC 9000 §17.2).
pub const MAX_LEN: usize = 20;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            bytes: [u8; MAX_LEN],
            len: u8,
        }

        impl $name {
            #[inline]
            pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
                if bytes.len() > MAX_LEN {
                    return None;
                }
                let mut storage = [0u8; MAX_LEN];
                storage[..bytes.len()].copy_from_slice(bytes);
                Some(Self {
                    bytes: storage,
                    len: bytes.len() as u8,
                })
            }

            #[inline]
            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes[..self.len()]
            }

            #[inline]
            pub const fn len(&self) -> usize {
                self.len as usize
            }

            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.len == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:02x?})", stringify!($name), self.as_bytes())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.as_bytes()
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = ();

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                Self::try_from_bytes(bytes).ok_or(())
            }
        }

        impl EncoderValue for $name {
            fn encode<E: Encoder>(&self, buffer: &mut E) {
                buffer.write_slice(self.as_bytes());
            }
        }
    };
}

id_type!(LocalId);
id_type!(PeerId);

impl LocalId {
    /// Decodes a length-prefixed connection id, where `len` has already
    /// been read from the packet header.
    pub fn decode_with_len<'a>(
        len: usize,
        buffer: DecoderBuffer<'a>,
    ) -> Result<(Self, DecoderBuffer<'a>), DecoderError> {
        let (slice, buffer) = buffer.decode_slice(len)?;
        let id =
            LocalId::try_from_bytes(slice.into_less_safe_slice()).ok_or(DecoderError::InvariantViolation(
                "connection id exceeds maximum length",
            ))?;
        Ok((id, buffer))
    }
}

impl PeerId {
    pub fn decode_with_len<'a>(
        len: usize,
        buffer: DecoderBufferMut<'a>,
    ) -> Result<(Self, DecoderBufferMut<'a>), DecoderError> {
        let (slice, buffer) = buffer.decode_slice(len)?;
        let id =
            PeerId::try_from_bytes(slice.into_less_safe_slice()).ok_or(DecoderError::InvariantViolation(
                "connection id exceeds maximum length",
            ))?;
        Ok((id, buffer))
    }
}

/// A 16-byte token shared via a transport parameter or NEW_CONNECTION_ID,
/// used to recognize stateless resets (spec.md §3 "StatelessResetToken").
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatelessResetToken([u8; 16]);

impl StatelessResetToken {
    #[inline]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Matches the last 16 bytes of an undecryptable short-header packet
    /// against this token, in constant time (spec.md §6 "Stateless reset").
    pub fn matches(&self, tail: &[u8]) -> bool {
        if tail.len() != 16 {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(tail) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl fmt::Debug for StatelessResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatelessResetToken({:02x?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_ids() {
        let bytes = [0u8; MAX_LEN + 1];
        assert!(LocalId::try_from_bytes(&bytes).is_none());
    }

    #[test]
    fn round_trips_bytes() {
        let bytes = [1, 2, 3, 4, 5];
        let id = PeerId::try_from_bytes(&bytes).unwrap();
        assert_eq!(id.as_bytes(), &bytes[..]);
    }

    #[test]
    fn stateless_reset_token_matches_exact_tail() {
        let token = StatelessResetToken::new([7u8; 16]);
        assert!(token.matches(&[7u8; 16]));
        assert!(!token.matches(&[8u8; 16]));
        assert!(!token.matches(&[7u8; 15]));
    }
}
