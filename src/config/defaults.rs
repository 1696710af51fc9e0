//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

/// Config file used when `--config` is not given and the file exists.
pub const CONFIG_PATH: &str = "/etc/wan-dyndns/config.toml";

/// Default TTL of published records, in seconds.
pub const TTL: u32 = 300;

/// Smallest TTL the provider accepts, in seconds.
pub const MIN_TTL: u32 = 60;

/// Default time between ticks, in seconds.
pub const INTERVAL_SECS: u64 = 300;

/// Default wait before verifying an applied change, in seconds.
pub const VERIFY_DELAY_SECS: f64 = 2.0;

/// Default per-query nameserver timeout, in seconds.
pub const VERIFY_TIMEOUT_SECS: f64 = 5.0;

/// Default admission budget per window.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 30;

/// Default admission window, in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default maximum number of attempts per call.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 1_000;

/// Default cap on retry delays, in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 60_000;

/// Default retry backoff multiplier.
pub const RETRY_MULTIPLIER: f64 = 2.0;

/// Hostname whose changes trigger downstream notification by default.
pub const TRIGGER_HOSTNAME: &str = "@";

