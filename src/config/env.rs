//! Environment-only configuration.
//!
//! Used when no configuration file is available. Fills the same
//! [`TomlConfig`] the file would, so validation is shared.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use super::ConfigError;
use super::toml::{DnsSection, RecordEntry, RouterSection, SettingsSection, TomlConfig};

/// Environment variable names.
pub mod var {
    pub const ROUTER_URL: &str = "ROUTER_URL";
    pub const ROUTER_KEY: &str = "ROUTER_KEY";
    pub const ROUTER_SECRET: &str = "ROUTER_SECRET";
    pub const ROUTER_VERIFY_SSL: &str = "ROUTER_VERIFY_SSL";
    /// `wan1=wan,wan2=opt1`
    pub const ROUTER_INTERFACES: &str = "ROUTER_INTERFACES";
    pub const DNS_TOKEN: &str = "DNS_TOKEN";
    pub const DNS_ZONE: &str = "DNS_ZONE";
    pub const DNS_TTL: &str = "DNS_TTL";
    /// `old,legacy`
    pub const DNS_RETIRE: &str = "DNS_RETIRE";
    pub const INTERVAL: &str = "DYNDNS_INTERVAL";
    pub const DRY_RUN: &str = "DYNDNS_DRY_RUN";
    pub const HEALTH_PORT: &str = "DYNDNS_HEALTH_PORT";
    pub const VERIFY_DELAY: &str = "DYNDNS_VERIFY_DELAY";
    /// `server=wan1+wan2,www=wan1`
    pub const RECORDS: &str = "DYNDNS_RECORDS";
}

/// Builds a raw configuration from the process environment.
///
/// # Errors
///
/// Returns an error if a variable is present but malformed.
pub fn from_env() -> Result<TomlConfig, ConfigError> {
    from_env_lookup(|name| std::env::var(name).ok())
}

/// Builds a raw configuration from a custom variable lookup.
///
/// Empty values count as unset. Missing required values are left for
/// validation to report.
///
/// # Errors
///
/// Returns an error if a variable is present but malformed.
pub fn from_env_lookup<F>(lookup: F) -> Result<TomlConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(TomlConfig {
        router: RouterSection {
            url: get(var::ROUTER_URL),
            key: get(var::ROUTER_KEY),
            secret: get(var::ROUTER_SECRET),
            verify_ssl: parse_bool(var::ROUTER_VERIFY_SSL, get(var::ROUTER_VERIFY_SSL))?,
            interfaces: parse_interfaces(get(var::ROUTER_INTERFACES))?,
        },
        dns: DnsSection {
            token: get(var::DNS_TOKEN),
            zone: get(var::DNS_ZONE),
            ttl: parse_number(var::DNS_TTL, get(var::DNS_TTL))?,
            retire: split_list(get(var::DNS_RETIRE).as_deref()),
        },
        settings: SettingsSection {
            interval: parse_number(var::INTERVAL, get(var::INTERVAL))?,
            dry_run: parse_bool(var::DRY_RUN, get(var::DRY_RUN))?.unwrap_or(false),
            health_port: parse_number(var::HEALTH_PORT, get(var::HEALTH_PORT))?,
            verify_delay: parse_number(var::VERIFY_DELAY, get(var::VERIFY_DELAY))?,
        },
        records: parse_records(get(var::RECORDS))?,
        ..TomlConfig::default()
    })
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_bool(name: &'static str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    value
        .map(|v| match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(name, format!("'{v}' is not a boolean"))),
        })
        .transpose()
}

fn parse_number<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ConfigError::invalid(name, format!("'{v}': {e}")))
        })
        .transpose()
}

fn parse_interfaces(value: Option<String>) -> Result<BTreeMap<String, String>, ConfigError> {
    split_list(value.as_deref())
        .into_iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(logical, router)| (logical.trim().to_string(), router.trim().to_string()))
                .filter(|(logical, router)| !logical.is_empty() && !router.is_empty())
                .ok_or_else(|| {
                    ConfigError::invalid(
                        var::ROUTER_INTERFACES,
                        format!("'{pair}' is not 'logical=router'"),
                    )
                })
        })
        .collect()
}

fn parse_records(value: Option<String>) -> Result<Vec<RecordEntry>, ConfigError> {
    split_list(value.as_deref())
        .into_iter()
        .map(|entry| {
            let (hostname, refs) = entry.split_once('=').ok_or_else(|| {
                ConfigError::invalid(var::RECORDS, format!("'{entry}' is not 'hostname=iface+iface'"))
            })?;
            Ok(RecordEntry {
                hostname: hostname.trim().to_string(),
                interfaces: refs
                    .split('+')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            })
        })
        .collect()
}
