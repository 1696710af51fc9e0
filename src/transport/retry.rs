//! Retry policy for outbound API calls.

use std::time::Duration;

use rand::Rng;

/// Configuration for exponential backoff with optional jitter.
///
/// Retry `n` (0-indexed) waits `initial_delay * multiplier^n`, capped at
/// `max_delay`. With jitter enabled the wait is drawn uniformly between
/// that value and the next step's value, so successive delays never
/// shrink.
///
/// # Defaults
///
/// - `max_attempts`: 3
/// - `initial_delay`: 1 second
/// - `max_delay`: 60 seconds
/// - `multiplier`: 2.0
/// - `jitter`: enabled
///
/// # Example
///
/// ```
/// use wan_dyndns::transport::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_attempts(5)
///     .with_initial_delay(Duration::from_millis(500))
///     .with_jitter(false);
/// assert_eq!(policy.delay_for_retry(1), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry.
    pub multiplier: f64,

    /// Whether to spread delays randomly up to the next backoff step.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Default maximum attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Default initial delay (1 second).
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

    /// Default maximum delay (60 seconds).
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

    /// Default multiplier (2.0).
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;

    /// Minimum value for `max_attempts`.
    pub const MIN_MAX_ATTEMPTS: u32 = 1;

    /// Creates a new retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            multiplier: Self::DEFAULT_MULTIPLIER,
            jitter: true,
        }
    }

    /// Sets the maximum number of attempts.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is less than 1.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        assert!(
            max_attempts >= Self::MIN_MAX_ATTEMPTS,
            "max_attempts must be at least 1"
        );
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial delay between retries.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the delay multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is less than 1.0.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        assert!(multiplier >= 1.0, "multiplier must be at least 1.0");
        self.multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay for a given retry number (0-indexed) without jitter.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.jittered_delay(retry, 0.0)
    }

    /// Computes the delay for a given retry, placed `fraction` of the way
    /// between this step and the next one.
    ///
    /// `fraction` is clamped to `[0.0, 1.0]`. The result never exceeds
    /// `max_delay`.
    #[must_use]
    pub fn jittered_delay(&self, retry: u32, fraction: f64) -> Duration {
        let base = self.step_secs(retry);
        let next = self.step_secs(retry.saturating_add(1));
        let delay_secs = fraction.clamp(0.0, 1.0).mul_add(next - base, base);
        let capped = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Computes the delay to actually wait before the given retry.
    ///
    /// Draws a random fraction when jitter is enabled.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let fraction = if self.jitter {
            rand::thread_rng().r#gen::<f64>()
        } else {
            0.0
        };
        self.jittered_delay(retry, fraction)
    }

    /// Returns true if another attempt may follow attempt number `attempt`
    /// (1 = first attempt).
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    fn step_secs(&self, retry: u32) -> f64 {
        // Retry counts stay far below i32::MAX.
        #[allow(clippy::cast_possible_wrap)]
        let factor = self.multiplier.powi(retry.min(1024) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if secs.is_finite() { secs } else { f64::MAX }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
