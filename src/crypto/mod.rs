// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Key phase bookkeeping for the 1-RTT key update state machine (RFC
//! 9001 §6; spec.md §4.4 "Key Update"). The actual AEAD key material and
//! derivation live entirely behind [`crate::capability::Encrypter`] /
//! [`crate::capability::Decrypter`] -- this module only tracks which
//! phase is current and whether a key update is mid-flight.

use crate::time::Timestamp;

/// One of the two alternating key phases a 1-RTT packet is protected
/// under (RFC 9001 §6: the phase bit toggles on every key update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPhase {
    #[default]
    Zero,
    One,
}

impl KeyPhase {
    #[inline]
    pub fn next(self) -> Self {
        match self {
            KeyPhase::Zero => KeyPhase::One,
            KeyPhase::One => KeyPhase::Zero,
        }
    }

    #[inline]
    pub fn bit(self) -> bool {
        matches!(self, KeyPhase::One)
    }

    #[inline]
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            KeyPhase::One
        } else {
            KeyPhase::Zero
        }
    }
}

/// Tracks the current key phase and the in-progress/cooldown state of a
/// key update, per endpoint (spec.md §4.4 invariant: at most one key
/// update may be in flight at a time).
#[derive(Debug, Clone, Copy)]
pub struct KeySet {
    phase: KeyPhase,
    /// Set while we've sent packets in the new phase but haven't yet
    /// observed an ACK for one of them; a peer-initiated update must not
    /// be accepted again until this clears (RFC 9001 §6.3).
    update_in_progress: bool,
    /// The packet number of the first packet sent in the current phase,
    /// used to detect and reject a peer replaying an old phase bit
    /// (RFC 9001 §6.4).
    first_packet_number_in_phase: Option<u64>,
    last_update_confirmed_at: Option<Timestamp>,
    /// Whether the previous key phase's decrypter is still accepted.
    /// Cleared once the `DiscardPreviousKeys` alarm fires, 3xPTO after
    /// this endpoint first decrypted a packet in the current phase (RFC
    /// 9001 §4.9.2).
    previous_phase_available: bool,
}

impl Default for KeySet {
    fn default() -> Self {
        Self {
            phase: KeyPhase::default(),
            update_in_progress: false,
            first_packet_number_in_phase: None,
            last_update_confirmed_at: None,
            previous_phase_available: true,
        }
    }
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> KeyPhase {
        self.phase
    }

    pub fn is_update_in_progress(&self) -> bool {
        self.update_in_progress
    }

    /// The packet number of the first packet sent (or peer-decrypted)
    /// since the current phase began, used to tell whether an ACK covers
    /// a packet sent after a local key update was initiated.
    pub fn first_packet_number_in_phase(&self) -> Option<u64> {
        self.first_packet_number_in_phase
    }

    /// Whether the previous key phase's decrypter is still retained.
    pub fn previous_phase_available(&self) -> bool {
        self.previous_phase_available
    }

    /// Drops the previous key phase's decrypter (spec.md §4.8
    /// "Discard-previous-1RTT-keys"). Subsequent packets still carrying
    /// the old phase bit are treated as undecryptable.
    pub fn discard_previous_phase(&mut self) {
        self.previous_phase_available = false;
    }

    /// Begins a locally-initiated key update. Returns `false` (and does
    /// nothing) if one is already in progress, enforcing the
    /// one-at-a-time invariant.
    pub fn initiate_update(&mut self, now: Timestamp, next_packet_number: u64) -> bool {
        if self.update_in_progress {
            return false;
        }
        self.phase = self.phase.next();
        self.update_in_progress = true;
        self.first_packet_number_in_phase = Some(next_packet_number);
        self.last_update_confirmed_at = Some(now);
        self.previous_phase_available = true;
        true
    }

    /// Observes a packet decrypted under `phase`; if it differs from the
    /// currently tracked phase, this is a peer-initiated key update
    /// (spec.md §4.4), which is accepted unless one is already pending.
    pub fn on_packet_decrypted(
        &mut self,
        phase: KeyPhase,
        packet_number: u64,
        now: Timestamp,
    ) -> KeyUpdateEvent {
        if phase == self.phase {
            return KeyUpdateEvent::None;
        }

        if let Some(first) = self.first_packet_number_in_phase {
            if packet_number < first {
                // A reordered packet from the old phase; not a new update.
                return KeyUpdateEvent::None;
            }
        }

        self.phase = phase;
        self.update_in_progress = false;
        self.first_packet_number_in_phase = Some(packet_number);
        self.last_update_confirmed_at = Some(now);
        self.previous_phase_available = true;
        KeyUpdateEvent::PeerInitiated
    }

    /// Marks the in-flight local update as acknowledged, so a new one may
    /// be initiated.
    pub fn confirm_update(&mut self) {
        self.update_in_progress = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpdateEvent {
    None,
    PeerInitiated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_concurrent_local_updates() {
        let mut keys = KeySet::new();
        assert!(keys.initiate_update(Timestamp::ZERO, 10));
        assert!(!keys.initiate_update(Timestamp::ZERO, 11));
    }

    #[test]
    fn peer_update_flips_phase() {
        let mut keys = KeySet::new();
        let event = keys.on_packet_decrypted(KeyPhase::One, 5, Timestamp::ZERO);
        assert_eq!(event, KeyUpdateEvent::PeerInitiated);
        assert_eq!(keys.phase(), KeyPhase::One);
    }

    #[test]
    fn stale_reordered_packet_is_ignored() {
        let mut keys = KeySet::new();
        keys.on_packet_decrypted(KeyPhase::One, 10, Timestamp::ZERO);
        let event = keys.on_packet_decrypted(KeyPhase::Zero, 3, Timestamp::ZERO);
        assert_eq!(event, KeyUpdateEvent::None);
        assert_eq!(keys.phase(), KeyPhase::One);
    }
}
