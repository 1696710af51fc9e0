//! TOML configuration file parsing.
//!
//! Every string in the file may reference environment variables as
//! `${NAME}`. References are replaced once, before the file is mapped onto
//! [`TomlConfig`]; substituted text is not scanned again.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure.
///
/// Every field is optional here; [`super::ValidatedConfig`] decides what is
/// required. Environment-only mode fills the same structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub router: RouterSection,

    #[serde(default)]
    pub dns: DnsSection,

    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub rate_limit: RateLimitSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub verify: VerifySection,

    #[serde(default)]
    pub notify: NotifySection,

    /// Managed hostnames, in apply order
    #[serde(default)]
    pub records: Vec<RecordEntry>,
}

/// Router (OPNsense) section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterSection {
    /// API base URL
    pub url: Option<String>,

    /// API key
    pub key: Option<String>,

    /// API secret
    pub secret: Option<String>,

    /// Verify the router's TLS certificate (default: true)
    pub verify_ssl: Option<bool>,

    /// Logical interface name to router interface name
    #[serde(default)]
    pub interfaces: BTreeMap<String, String>,
}

/// DNS provider (Hetzner) section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsSection {
    /// API token
    pub token: Option<String>,

    /// Zone name
    pub zone: Option<String>,

    /// TTL of written record sets, in seconds
    pub ttl: Option<u32>,

    /// Hostnames whose records are to be deleted
    #[serde(default)]
    pub retire: Vec<String>,
}

/// General settings section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsSection {
    /// Time between ticks, in seconds
    pub interval: Option<u64>,

    /// Log planned changes without writing them
    #[serde(default)]
    pub dry_run: bool,

    /// Port of the health server; disabled when absent
    pub health_port: Option<u16>,

    /// Wait before verification, in seconds
    pub verify_delay: Option<f64>,
}

/// Admission control section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Calls allowed per window
    pub max_requests: Option<u32>,

    /// Window length, in seconds
    pub window: Option<u64>,
}

/// Retry policy section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Maximum number of attempts per call
    pub max_attempts: Option<u32>,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: Option<u64>,

    /// Cap on retry delays, in milliseconds
    pub max_delay_ms: Option<u64>,

    /// Backoff multiplier
    pub multiplier: Option<f64>,

    /// Randomize delays (default: true)
    pub jitter: Option<bool>,
}

/// Verification section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySection {
    /// Query authoritative nameservers after each write (default: true)
    pub enabled: Option<bool>,

    /// Nameserver hostnames to query
    pub nameservers: Option<Vec<String>>,

    /// Per-query timeout, in seconds
    pub timeout: Option<f64>,
}

/// Downstream notification section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifySection {
    /// Update Kubernetes annotations on trigger changes
    #[serde(default)]
    pub enabled: bool,

    /// Label selector of the resources to update
    pub label_selector: Option<String>,

    /// Hostname whose changes are forwarded
    pub trigger_hostname: Option<String>,
}

/// One managed hostname.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordEntry {
    /// Hostname relative to the zone (`@` for the apex)
    pub hostname: String,

    /// Logical interface names whose addresses it publishes
    pub interfaces: Vec<String>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file, substituting from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unset variable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Loads configuration from a TOML file with a custom variable lookup.
    ///
    /// # Errors
    ///
    /// See [`TomlConfig::load`].
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse_with(&content, lookup)
    }

    /// Parses configuration from a TOML string without substitution.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Parses configuration from a TOML string, substituting `${NAME}`
    /// references through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a referenced variable is
    /// unset.
    pub fn parse_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table: toml::Table = toml::from_str(content)?;
        let mut value = toml::Value::Table(table);
        substitute_value(&mut value, &lookup)?;
        let config: Self = value.try_into()?;
        Ok(config)
    }
}

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"));

fn substitute_value<F>(value: &mut toml::Value, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        toml::Value::String(s) => *s = substitute(s, lookup)?,
        toml::Value::Array(items) => {
            for item in items {
                substitute_value(item, lookup)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                substitute_value(item, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replaces every `${NAME}` in `input` with the looked-up value.
///
/// # Errors
///
/// Returns [`ConfigError::UnsetVariable`] for the first unset name.
pub fn substitute<F>(input: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut unset = None;
    let output = VARIABLE.replace_all(input, |caps: &Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| {
            unset.get_or_insert_with(|| caps[1].to_string());
            String::new()
        })
    });

    match unset {
        Some(name) => Err(ConfigError::UnsetVariable { name }),
        None => Ok(output.into_owned()),
    }
}

/// Generates a configuration file template with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# wan-dyndns configuration
# Any string may reference environment variables as ${NAME}.

[router]
# OPNsense base URL (required); "/api" is appended when missing
url = "https://opnsense.local"
key = "${OPNSENSE_KEY}"
secret = "${OPNSENSE_SECRET}"
# verify_ssl = true

[router.interfaces]
# logical name = OPNsense interface name
wan1 = "wan"
# wan2 = "opt1"

[dns]
token = "${HETZNER_TOKEN}"
zone = "example.com"
# ttl = 300
# Hostnames whose records are deleted; everything else is left alone
# retire = ["old"]

[settings]
# interval = 300
# dry_run = false
# health_port = 8080
# verify_delay = 2.0

[rate_limit]
# max_requests = 30
# window = 60

[retry]
# max_attempts = 3
# initial_delay_ms = 1000
# max_delay_ms = 60000
# multiplier = 2.0
# jitter = true

[verify]
# enabled = true
# nameservers = ["helium.ns.hetzner.de", "hydrogen.ns.hetzner.com", "oxygen.ns.hetzner.com"]
# timeout = 5.0

[notify]
# Update external-dns target annotations in Kubernetes
# enabled = false
# label_selector = "ginsys.net/apex-dns=true"
# trigger_hostname = "@"

[[records]]
hostname = "@"
interfaces = ["wan1"]

[[records]]
hostname = "www"
interfaces = ["wan1"]
"#
    .to_string()
}
