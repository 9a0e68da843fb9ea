// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Path Validator: at-most-one-in-flight PATH_CHALLENGE campaign
//! (spec.md §4.7, invariant I6).

use crate::capability::Random;
use crate::time::Timestamp;
use core::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathValidationResult {
    Success,
    Failure,
}

#[derive(Debug)]
struct Campaign {
    payload: [u8; 8],
    attempt_count: u8,
    next_deadline: Timestamp,
    /// The time the campaign started, bounding the overall attempt even
    /// if individual retries keep landing (spec.md §4.6 "overall
    /// deadline").
    started_at: Timestamp,
}

/// Drives a single PATH_CHALLENGE/PATH_RESPONSE exchange. Starting a new
/// campaign while one is outstanding cancels the old one with
/// [`PathValidationResult::Failure`] (spec.md I6).
#[derive(Debug, Default)]
pub struct PathValidator {
    campaign: Option<Campaign>,
}

impl PathValidator {
    pub fn new() -> Self {
        Self { campaign: None }
    }

    pub fn is_validating(&self) -> bool {
        self.campaign.is_some()
    }

    /// Starts a new campaign, returning the payload to send in a
    /// PATH_CHALLENGE and the result of the campaign it replaced, if any.
    pub fn start(
        &mut self,
        random: &mut dyn Random,
        now: Timestamp,
        retry_timeout: Duration,
    ) -> ([u8; 8], Option<PathValidationResult>) {
        let cancelled = self.campaign.is_some().then_some(PathValidationResult::Failure);

        let mut payload = [0u8; 8];
        random.fill(&mut payload);
        self.campaign = Some(Campaign {
            payload,
            attempt_count: 1,
            next_deadline: now + retry_timeout,
            started_at: now,
        });
        (payload, cancelled)
    }

    /// Processes an incoming PATH_RESPONSE; a mismatched payload must not
    /// terminate the campaign (spec.md P6).
    pub fn on_path_response(&mut self, payload: [u8; 8]) -> Option<PathValidationResult> {
        let campaign = self.campaign.as_ref()?;
        if campaign.payload != payload {
            return None;
        }
        self.campaign = None;
        Some(PathValidationResult::Success)
    }

    /// Called when the retry timer fires. Draws a fresh payload and
    /// retransmits a PATH_CHALLENGE carrying it, or returns `Failure` if
    /// `max_retries` (kMaxRetryTimes) or `overall_deadline` has been
    /// exhausted (spec.md §4.7: "Network errors on the writer do not fail
    /// the validation; only timeout does").
    pub fn on_retry_timeout(
        &mut self,
        random: &mut dyn Random,
        now: Timestamp,
        retry_timeout: Duration,
        max_retries: u8,
        overall_deadline: Duration,
    ) -> Result<[u8; 8], PathValidationResult> {
        let campaign = match self.campaign.as_mut() {
            Some(c) => c,
            None => return Err(PathValidationResult::Failure),
        };

        if now.saturating_duration_since(campaign.started_at) >= overall_deadline
            || campaign.attempt_count >= max_retries
        {
            self.campaign = None;
            return Err(PathValidationResult::Failure);
        }

        let mut payload = [0u8; 8];
        random.fill(&mut payload);
        campaign.payload = payload;
        campaign.attempt_count += 1;
        campaign.next_deadline = now + retry_timeout;
        Ok(payload)
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.campaign.as_ref().map(|c| c.next_deadline)
    }

    pub fn cancel(&mut self) -> Option<PathValidationResult> {
        self.campaign.take().map(|_| PathValidationResult::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRandom(u8);
    impl Random for FixedRandom {
        fn fill(&mut self, dest: &mut [u8]) {
            dest.fill(self.0);
        }
    }

    #[test]
    fn matching_response_succeeds() {
        let mut validator = PathValidator::new();
        let mut rng = FixedRandom(7);
        let (payload, _) = validator.start(&mut rng, Timestamp::ZERO, Duration::from_millis(100));
        let result = validator.on_path_response(payload);
        assert_eq!(result, Some(PathValidationResult::Success));
        assert!(!validator.is_validating());
    }

    #[test]
    fn mismatched_response_does_not_terminate() {
        let mut validator = PathValidator::new();
        let mut rng = FixedRandom(1);
        validator.start(&mut rng, Timestamp::ZERO, Duration::from_millis(100));
        let result = validator.on_path_response([0xffu8; 8]);
        assert_eq!(result, None);
        assert!(validator.is_validating());
    }

    #[test]
    fn starting_new_campaign_cancels_old_one() {
        let mut validator = PathValidator::new();
        let mut rng = FixedRandom(3);
        validator.start(&mut rng, Timestamp::ZERO, Duration::from_millis(100));
        let (_, cancelled) = validator.start(&mut rng, Timestamp::ZERO, Duration::from_millis(100));
        assert_eq!(cancelled, Some(PathValidationResult::Failure));
    }

    #[test]
    fn exhausting_retries_fails() {
        let mut validator = PathValidator::new();
        let mut rng = FixedRandom(9);
        validator.start(&mut rng, Timestamp::ZERO, Duration::from_millis(10));
        let result = validator.on_retry_timeout(
            &mut rng,
            Timestamp::ZERO + Duration::from_millis(10),
            Duration::from_millis(10),
            1,
            Duration::from_secs(1),
        );
        assert_eq!(result, Err(PathValidationResult::Failure));
    }

    #[test]
    fn retry_draws_a_fresh_payload() {
        let mut validator = PathValidator::new();
        let mut start_rng = FixedRandom(1);
        let (first, _) = validator.start(&mut start_rng, Timestamp::ZERO, Duration::from_millis(10));

        let mut retry_rng = FixedRandom(2);
        let retried = validator
            .on_retry_timeout(
                &mut retry_rng,
                Timestamp::ZERO + Duration::from_millis(10),
                Duration::from_millis(10),
                3,
                Duration::from_secs(1),
            )
            .unwrap();

        assert_ne!(first, retried);
        // The old payload must no longer be accepted; only the retried one.
        assert_eq!(validator.on_path_response(first), None);
        assert_eq!(validator.on_path_response(retried), Some(PathValidationResult::Success));
    }
}
