//! Validated configuration.
//!
//! Raw settings come from a TOML file or from the environment; CLI flags
//! are layered on top. All validation happens during construction.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::notify::DEFAULT_LABEL_SELECTOR;
use crate::reconcile::Record;
use crate::router::Interface;
use crate::transport::RetryPolicy;
use crate::verify::HETZNER_NAMESERVERS;

use super::cli::{Cli, LogLevel};
use super::defaults;
use super::env;
use super::error::{ConfigError, field};
use super::toml::{RecordEntry, TomlConfig};

/// Where the raw settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Environment => f.write_str("environment"),
        }
    }
}

/// Router connection settings.
#[derive(Clone)]
pub struct RouterConfig {
    pub url: Url,
    pub key: String,
    pub secret: String,
    pub verify_ssl: bool,
    /// Configured interfaces, sorted by logical name
    pub interfaces: Vec<Interface>,
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("url", &self.url.as_str())
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .field("verify_ssl", &self.verify_ssl)
            .field("interfaces", &self.interfaces)
            .finish()
    }
}

/// DNS provider settings.
#[derive(Clone)]
pub struct DnsConfig {
    pub token: String,
    pub zone: String,
    pub ttl: u32,
    /// Hostnames whose records are deleted
    pub retire: Vec<String>,
}

impl fmt::Debug for DnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsConfig")
            .field("token", &"[redacted]")
            .field("zone", &self.zone)
            .field("ttl", &self.ttl)
            .field("retire", &self.retire)
            .finish()
    }
}

/// Admission control settings shared by every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Post-apply verification settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyConfig {
    pub nameservers: Vec<String>,
    pub timeout: Duration,
    pub delay: Duration,
}

/// Downstream notification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    pub label_selector: String,
    pub trigger_hostname: String,
}

/// Fully validated configuration ready for use by the application.
#[derive(Debug)]
pub struct ValidatedConfig {
    pub router: RouterConfig,
    pub dns: DnsConfig,
    /// Managed hostnames in declaration order
    pub records: Vec<Record>,
    pub interval: Duration,
    pub dry_run: bool,
    /// Run a single tick
    pub once: bool,
    pub health_port: Option<u16>,
    pub rate_limit: RateLimitConfig,
    pub retry_policy: RetryPolicy,
    /// `None` when verification is disabled
    pub verify: Option<VerifyConfig>,
    /// `None` when notification is disabled
    pub notify: Option<NotifyConfig>,
    pub log_level: LogLevel,
    pub source: ConfigSource,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let health = self
            .health_port
            .map_or_else(|| "off".to_string(), |p| p.to_string());
        write!(
            f,
            "Config {{ source: {}, router: {}, zone: {}, ttl: {}, records: {}, retire: {}, \
             interval: {}s, dry_run: {}, once: {}, health_port: {}, rate_limit: {}/{}s, \
             retry: {}x, verify: {}, notify: {} }}",
            self.source,
            self.router.url,
            self.dns.zone,
            self.dns.ttl,
            self.records.len(),
            self.dns.retire.len(),
            self.interval.as_secs(),
            self.dry_run,
            self.once,
            health,
            self.rate_limit.max_requests,
            self.rate_limit.window.as_secs(),
            self.retry_policy.max_attempts,
            self.verify.is_some(),
            self.notify.is_some(),
        )
    }
}

impl ValidatedConfig {
    /// Loads configuration for `cli`.
    ///
    /// Uses `--config` when given, else the default path when that file
    /// exists, else the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the result is invalid.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::load_from(cli, Path::new(defaults::CONFIG_PATH), |name| {
            std::env::var(name).ok()
        })
    }

    /// [`ValidatedConfig::load`] with an explicit default path and variable
    /// lookup.
    ///
    /// # Errors
    ///
    /// See [`ValidatedConfig::load`].
    pub fn load_from<F>(cli: &Cli, default_path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (raw, source) = match &cli.config {
            Some(path) => (
                TomlConfig::load_with(path, &lookup)?,
                ConfigSource::File(path.clone()),
            ),
            None if default_path.exists() => (
                TomlConfig::load_with(default_path, &lookup)?,
                ConfigSource::File(default_path.to_path_buf()),
            ),
            None => (env::from_env_lookup(&lookup)?, ConfigSource::Environment),
        };

        Self::from_raw(cli, &raw, source)
    }

    /// Validates raw settings and layers CLI flags on top.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn from_raw(
        cli: &Cli,
        raw: &TomlConfig,
        source: ConfigSource,
    ) -> Result<Self, ConfigError> {
        let router = resolve_router(raw)?;
        let dns = resolve_dns(raw)?;
        let records = resolve_records(&raw.records, &router.interfaces, &dns.retire)?;

        let interval_secs = raw.settings.interval.unwrap_or(defaults::INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::invalid(
                "settings.interval",
                "must be greater than 0",
            ));
        }

        let health_port = match raw.settings.health_port {
            Some(0) => {
                return Err(ConfigError::invalid(
                    "settings.health_port",
                    "must be non-zero",
                ));
            }
            port => port,
        };

        Ok(Self {
            verify: resolve_verify(raw)?,
            notify: resolve_notify(raw, &records)?,
            rate_limit: resolve_rate_limit(raw)?,
            retry_policy: build_retry_policy(raw)?,
            router,
            dns,
            records,
            interval: Duration::from_secs(interval_secs),
            dry_run: cli.dry_run || raw.settings.dry_run,
            once: cli.once,
            health_port,
            log_level: cli.log_level,
            source,
        })
    }
}

fn required(
    value: Option<&String>,
    name: &'static str,
    hint: &'static str,
) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ConfigError::missing(name, hint))
}

fn resolve_router(raw: &TomlConfig) -> Result<RouterConfig, ConfigError> {
    let section = &raw.router;
    let url_str = required(
        section.url.as_ref(),
        field::ROUTER_URL,
        "Set router.url or ROUTER_URL",
    )?;
    let url = Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
        url: url_str.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: url_str,
            reason: "scheme must be http or https".to_string(),
        });
    }

    let key = required(
        section.key.as_ref(),
        field::ROUTER_KEY,
        "Set router.key or ROUTER_KEY",
    )?;
    let secret = required(
        section.secret.as_ref(),
        field::ROUTER_SECRET,
        "Set router.secret or ROUTER_SECRET",
    )?;

    if section.interfaces.is_empty() {
        return Err(ConfigError::missing(
            field::ROUTER_INTERFACES,
            "Map at least one logical interface in [router.interfaces] or ROUTER_INTERFACES",
        ));
    }
    let interfaces = section
        .interfaces
        .iter()
        .map(|(logical, router_name)| {
            if logical.trim().is_empty() || router_name.trim().is_empty() {
                Err(ConfigError::invalid(
                    field::ROUTER_INTERFACES,
                    "interface names must be non-empty",
                ))
            } else {
                Ok(Interface::new(logical.trim(), router_name.trim()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouterConfig {
        url,
        key,
        secret,
        verify_ssl: section.verify_ssl.unwrap_or(true),
        interfaces,
    })
}

fn resolve_dns(raw: &TomlConfig) -> Result<DnsConfig, ConfigError> {
    let section = &raw.dns;
    let token = required(
        section.token.as_ref(),
        field::DNS_TOKEN,
        "Set dns.token or DNS_TOKEN",
    )?;
    let zone = required(
        section.zone.as_ref(),
        field::DNS_ZONE,
        "Set dns.zone or DNS_ZONE",
    )?;

    let ttl = section.ttl.unwrap_or(defaults::TTL);
    if ttl < defaults::MIN_TTL {
        return Err(ConfigError::invalid(
            "dns.ttl",
            format!("must be at least {}", defaults::MIN_TTL),
        ));
    }

    Ok(DnsConfig {
        token,
        zone: zone.trim_end_matches('.').to_string(),
        ttl,
        retire: section.retire.iter().map(|h| h.trim().to_string()).collect(),
    })
}

fn resolve_records(
    entries: &[RecordEntry],
    interfaces: &[Interface],
    retired: &[String],
) -> Result<Vec<Record>, ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::missing(
            field::RECORDS,
            "Add at least one [[records]] entry or DYNDNS_RECORDS",
        ));
    }

    let known: BTreeSet<&str> = interfaces.iter().map(|i| i.logical_name.as_str()).collect();
    let mut hostnames = BTreeSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let hostname = entry.hostname.trim();
        if hostname.is_empty() {
            return Err(ConfigError::InvalidRecords(
                "hostname must be non-empty".to_string(),
            ));
        }
        if !hostnames.insert(hostname) {
            return Err(ConfigError::InvalidRecords(format!(
                "duplicate hostname '{hostname}'"
            )));
        }
        if entry.interfaces.is_empty() {
            return Err(ConfigError::InvalidRecords(format!(
                "'{hostname}' references no interfaces"
            )));
        }

        let mut refs = Vec::with_capacity(entry.interfaces.len());
        for iface in entry.interfaces.iter().map(|i| i.trim()) {
            if !known.contains(iface) {
                return Err(ConfigError::InvalidRecords(format!(
                    "'{hostname}' references unknown interface '{iface}'"
                )));
            }
            if refs.contains(&iface) {
                return Err(ConfigError::InvalidRecords(format!(
                    "'{hostname}' references interface '{iface}' twice"
                )));
            }
            refs.push(iface);
        }

        records.push(Record::new(hostname, refs));
    }

    let mut retiring = BTreeSet::new();
    for hostname in retired {
        if hostname.is_empty() {
            return Err(ConfigError::InvalidRecords(
                "retired hostname must be non-empty".to_string(),
            ));
        }
        if hostnames.contains(hostname.as_str()) {
            return Err(ConfigError::InvalidRecords(format!(
                "'{hostname}' is both a record and retired"
            )));
        }
        if !retiring.insert(hostname.as_str()) {
            return Err(ConfigError::InvalidRecords(format!(
                "'{hostname}' is retired twice"
            )));
        }
    }

    Ok(records)
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::invalid(field, e.to_string()))
}

fn resolve_verify(raw: &TomlConfig) -> Result<Option<VerifyConfig>, ConfigError> {
    let delay = seconds(
        "settings.verify_delay",
        raw.settings
            .verify_delay
            .unwrap_or(defaults::VERIFY_DELAY_SECS),
    )?;

    let section = &raw.verify;
    if !section.enabled.unwrap_or(true) {
        return Ok(None);
    }

    let nameservers = section.nameservers.clone().unwrap_or_else(|| {
        HETZNER_NAMESERVERS
            .iter()
            .map(ToString::to_string)
            .collect()
    });
    if nameservers.is_empty() {
        return Err(ConfigError::invalid(
            "verify.nameservers",
            "must name at least one nameserver",
        ));
    }

    let timeout = seconds(
        "verify.timeout",
        section.timeout.unwrap_or(defaults::VERIFY_TIMEOUT_SECS),
    )?;
    if timeout.is_zero() {
        return Err(ConfigError::invalid(
            "verify.timeout",
            "must be greater than 0",
        ));
    }

    Ok(Some(VerifyConfig {
        nameservers,
        timeout,
        delay,
    }))
}

fn resolve_notify(
    raw: &TomlConfig,
    records: &[Record],
) -> Result<Option<NotifyConfig>, ConfigError> {
    let section = &raw.notify;
    if !section.enabled {
        return Ok(None);
    }

    let trigger_hostname = section
        .trigger_hostname
        .clone()
        .unwrap_or_else(|| defaults::TRIGGER_HOSTNAME.to_string());
    if !records.iter().any(|r| r.hostname == trigger_hostname) {
        return Err(ConfigError::invalid(
            "notify.trigger_hostname",
            format!("'{trigger_hostname}' is not a configured record"),
        ));
    }

    Ok(Some(NotifyConfig {
        label_selector: section
            .label_selector
            .clone()
            .unwrap_or_else(|| DEFAULT_LABEL_SELECTOR.to_string()),
        trigger_hostname,
    }))
}

fn resolve_rate_limit(raw: &TomlConfig) -> Result<RateLimitConfig, ConfigError> {
    let section = &raw.rate_limit;
    let max_requests = section
        .max_requests
        .unwrap_or(defaults::RATE_LIMIT_MAX_REQUESTS);
    let window = section.window.unwrap_or(defaults::RATE_LIMIT_WINDOW_SECS);

    if max_requests == 0 {
        return Err(ConfigError::InvalidRateLimit(
            "max_requests must be greater than 0".to_string(),
        ));
    }
    if window == 0 {
        return Err(ConfigError::InvalidRateLimit(
            "window must be greater than 0".to_string(),
        ));
    }

    Ok(RateLimitConfig {
        max_requests,
        window: Duration::from_secs(window),
    })
}

fn build_retry_policy(raw: &TomlConfig) -> Result<RetryPolicy, ConfigError> {
    let retry = &raw.retry;
    let max_attempts = retry
        .max_attempts
        .unwrap_or(defaults::RETRY_MAX_ATTEMPTS);
    let initial_delay_ms = retry
        .initial_delay_ms
        .unwrap_or(defaults::RETRY_INITIAL_DELAY_MS);
    let max_delay_ms = retry.max_delay_ms.unwrap_or(defaults::RETRY_MAX_DELAY_MS);
    let multiplier = retry.multiplier.unwrap_or(defaults::RETRY_MULTIPLIER);

    if max_attempts == 0 {
        return Err(ConfigError::InvalidRetry(
            "max_attempts must be greater than 0".to_string(),
        ));
    }

    if initial_delay_ms == 0 {
        return Err(ConfigError::InvalidRetry(
            "initial_delay_ms must be greater than 0".to_string(),
        ));
    }

    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(ConfigError::InvalidRetry(
            "multiplier must be a finite number of at least 1.0".to_string(),
        ));
    }

    if max_delay_ms < initial_delay_ms {
        return Err(ConfigError::InvalidRetry(format!(
            "max_delay_ms ({max_delay_ms}) must be >= initial_delay_ms ({initial_delay_ms})"
        )));
    }

    Ok(RetryPolicy::new()
        .with_max_attempts(max_attempts)
        .with_initial_delay(Duration::from_millis(initial_delay_ms))
        .with_max_delay(Duration::from_millis(max_delay_ms))
        .with_multiplier(multiplier)
        .with_jitter(retry.jitter.unwrap_or(true)))
}

/// Writes the configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
