//! Automatic reconnection policy.
//!
//! Reconnection is off unless a policy enables it. When enabled, an
//! unsolicited close schedules a fresh `connect()` after an exponentially
//! growing, jittered delay. Requests that were pending when the socket
//! dropped are rejected, never replayed.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// Constants
// ============================================================================

/// Default first retry delay.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default delay ceiling.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// When and how often to reconnect after an unsolicited close.
///
/// The attempt counter resets once the device sends `hello` again.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use panel_channel::ReconnectPolicy;
///
/// let policy = ReconnectPolicy::exponential(Duration::from_millis(250), Duration::from_secs(10))
///     .with_max_attempts(8);
///
/// assert!(policy.allows(8));
/// assert!(!policy.allows(9));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect at all.
    enabled: bool,
    /// Delay before the first attempt.
    initial_delay: Duration,
    /// Delay ceiling.
    max_delay: Duration,
    /// Attempts before giving up; `None` retries forever.
    max_attempts: Option<u32>,
    /// Randomize each delay within `[delay / 2, delay]`.
    jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ReconnectPolicy {
    /// Never reconnects; callers own the connection lifecycle.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
            jitter: true,
        }
    }

    /// Doubles the delay after each failed attempt, up to `max_delay`.
    #[inline]
    #[must_use]
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            enabled: true,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            max_attempts: None,
            jitter: true,
        }
    }

    /// Gives up after `attempts` consecutive failures.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Enables or disables delay jitter.
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns `true` if reconnection is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` if attempt number `attempt` (1-based) may run.
    #[inline]
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Un-jittered delay before attempt `attempt` (1-based).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before attempt `attempt` (1-based), jitter applied.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }

        let upper = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let lower = upper / 2;
        Duration::from_millis(rand::rng().random_range(lower..=upper))
    }
}

// ============================================================================
// Tests
// ============================================================================
