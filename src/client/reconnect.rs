//! Reconnection policy.
//!
//! Exponential backoff with jitter. After every successful handshake the
//! attempt counter resets and all active topics are subscribed again.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first reconnect attempt.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for any reconnect delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Growth factor between attempts.
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Fraction of the delay that may be randomly shaved off.
const DEFAULT_JITTER: f64 = 0.2;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Controls whether and when a lost session is re-established.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Reconnect at all.
    pub enabled: bool,
    /// Delay before attempt 0.
    pub initial_delay: Duration,
    /// Cap on the delay.
    pub max_delay: Duration,
    /// Growth factor (≥ 1.0).
    pub multiplier: f64,
    /// Random reduction in `[0, jitter]` of each delay (0.0..=1.0).
    pub jitter: f64,
    /// Give up after this many consecutive failures.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            max_attempts: None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ReconnectPolicy {
    /// A policy that never reconnects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Exponential backoff between `initial_delay` and `max_delay`.
    #[must_use]
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ReconnectPolicy {
    /// Sets the growth factor.
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction.
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Caps consecutive failures.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

// ============================================================================
// Delay Computation
// ============================================================================

impl ReconnectPolicy {
    /// Checks the numeric fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a multiplier below 1.0, a jitter outside
    /// `0.0..=1.0`, or a max delay shorter than the initial delay.
    pub fn validate(&self) -> Result<()> {
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(Error::config(format!(
                "reconnect multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::config(format!(
                "reconnect jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::config("reconnect max_delay is below initial_delay"));
        }
        Ok(())
    }

    /// Delay before the zero-based `attempt`, without jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Delay before the zero-based `attempt`, with jitter applied.
    ///
    /// Returns `None` when reconnecting is disabled or attempts are exhausted.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let base = self.backoff(attempt);
        if self.jitter <= 0.0 {
            return Some(base);
        }
        let factor = 1.0 - self.jitter * rand::thread_rng().r#gen::<f64>();
        Some(base.mul_f64(factor))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let policy = ReconnectPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_disabled_never_delays() {
        assert_eq!(ReconnectPolicy::disabled().delay_for(0), None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_secs(1));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_max_attempts() {
        let policy = ReconnectPolicy::default()
            .with_jitter(0.0)
            .with_max_attempts(2);
        assert!(policy.delay_for(0).is_some());
        assert!(policy.delay_for(1).is_some());
        assert_eq!(policy.delay_for(2), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ReconnectPolicy::default().with_multiplier(0.5).validate().is_err());
        assert!(ReconnectPolicy::default().with_jitter(1.5).validate().is_err());
        assert!(
            ReconnectPolicy::exponential(Duration::from_secs(5), Duration::from_secs(1))
                .validate()
                .is_err()
        );
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_within_bounds(attempt in 0u32..64, jitter in 0.0f64..=1.0) {
            let policy = ReconnectPolicy::exponential(Duration::from_millis(50), Duration::from_secs(10))
                .with_jitter(jitter);
            let base = policy.backoff(attempt);
            let delay = policy.delay_for(attempt).unwrap();
            prop_assert!(delay <= base);
            prop_assert!(delay >= base.mul_f64(1.0 - jitter).saturating_sub(Duration::from_nanos(1)));
        }
    }
}
