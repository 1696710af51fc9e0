//! Application startup and utilities.
//!
//! Exit codes, tracing setup, and error hints that support the main entry
//! point.

use tracing_subscriber::EnvFilter;
use wan_dyndns::config::{ConfigError, LogLevel};

/// Application exit codes.
pub mod exit_code {
    use std::process::ExitCode;

    /// Success (exit code 0).
    pub const SUCCESS: ExitCode = ExitCode::SUCCESS;

    /// Configuration error (exit code 1): invalid args, missing fields, bad values.
    pub const CONFIG_ERROR: ExitCode = ExitCode::FAILURE;

    /// Runtime error (exit code 2): setup failure or a failed single-run tick.
    ///
    /// A function because `ExitCode::from()` is not `const fn`.
    pub fn runtime_error() -> ExitCode {
        ExitCode::from(2)
    }
}

/// Returns a hint for configuration errors a template would fix.
pub fn config_hint(error: &ConfigError) -> Option<&'static str> {
    match error {
        ConfigError::MissingRequired { .. } | ConfigError::FileRead { .. } => {
            Some("Run 'wan-dyndns init' to generate a configuration template.")
        }
        _ => None,
    }
}

/// Prints a hint for common configuration errors.
pub fn print_config_hint(error: &ConfigError) {
    if let Some(hint) = config_hint(error) {
        eprintln!("\n{hint}");
    }
}

/// Builds the log filter: `RUST_LOG` when set, else `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.as_level().into())
        .from_env_lossy()
}

/// Sets up the tracing subscriber for logging.
#[cfg(not(tarpaulin_include))]
pub fn setup_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .init();
}
