//! Configuration layer.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`], [`LogLevel`])
//! - TOML configuration file parsing with `${NAME}` substitution ([`TomlConfig`])
//! - Environment-only configuration ([`from_env`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Sources
//!
//! Raw settings come from exactly one place:
//!
//! 1. The file named by `--config`
//! 2. [`defaults::CONFIG_PATH`], when that file exists
//! 3. The environment (see [`env::var`])
//!
//! CLI flags are applied on top. `--dry-run` is OR-ed with
//! `settings.dry_run`: either one enables it.

mod cli;
pub mod defaults;
pub mod env;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command, LogLevel};
pub use env::{from_env, from_env_lookup};
pub use error::{ConfigError, field};
pub use toml::{
    DnsSection, NotifySection, RateLimitSection, RecordEntry, RetrySection, RouterSection,
    SettingsSection, TomlConfig, VerifySection, default_config_template, substitute,
};
pub use validated::{
    ConfigSource, DnsConfig, NotifyConfig, RateLimitConfig, RouterConfig, ValidatedConfig,
    VerifyConfig, write_default_config,
};
