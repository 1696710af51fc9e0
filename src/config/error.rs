//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration operations.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write configuration file (for init command).
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A `${NAME}` reference names an unset environment variable.
    #[error("Environment variable '{name}' not set")]
    UnsetVariable {
        /// Variable name inside the braces
        name: String,
    },

    /// Missing required field.
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired {
        /// Name of the missing field
        field: &'static str,
        /// Hint for how to provide the value
        hint: &'static str,
    },

    /// Invalid URL provided.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The invalid URL string
        url: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A value is out of range or cannot be parsed.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid retry configuration.
    #[error("Invalid retry configuration: {0}")]
    InvalidRetry(String),

    /// Invalid rate limit configuration.
    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(String),

    /// Records, interfaces and retired hostnames do not fit together.
    #[error("Invalid record configuration: {0}")]
    InvalidRecords(String),
}

/// Well-known field names for `MissingRequired` errors.
pub mod field {
    pub const ROUTER_URL: &str = "router.url";
    pub const ROUTER_KEY: &str = "router.key";
    pub const ROUTER_SECRET: &str = "router.secret";
    pub const ROUTER_INTERFACES: &str = "router.interfaces";
    pub const DNS_TOKEN: &str = "dns.token";
    pub const DNS_ZONE: &str = "dns.zone";
    pub const RECORDS: &str = "records";
}

impl ConfigError {
    /// Creates a `MissingRequired` error for a required field.
    #[must_use]
    pub const fn missing(field: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { field, hint }
    }

    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
