//! Desired state derivation.

use std::collections::BTreeMap;

use crate::dns::IpSet;
use crate::router::InterfaceObservations;

/// A managed hostname and the interfaces whose addresses it publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Hostname relative to the zone (`@` for the apex).
    pub hostname: String,
    /// Logical interface names, unique within the record.
    pub interface_refs: Vec<String>,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new<I, S>(hostname: impl Into<String>, interface_refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hostname: hostname.into(),
            interface_refs: interface_refs.into_iter().map(Into::into).collect(),
        }
    }
}

/// Hostname to the addresses it should publish this tick.
///
/// Never holds an empty set: a hostname none of whose interfaces resolved
/// is absent, which the planner treats as "leave alone".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    hosts: BTreeMap<String, IpSet>,
}

impl DesiredState {
    /// Returns the desired addresses for `hostname`, if it is present.
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<&IpSet> {
        self.hosts.get(hostname)
    }

    /// Returns true if `hostname` has desired addresses this tick.
    #[must_use]
    pub fn contains(&self, hostname: &str) -> bool {
        self.hosts.contains_key(hostname)
    }

    /// Number of hostnames present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true if no hostname is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Iterates hostnames and their sets in hostname order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IpSet)> {
        self.hosts.iter().map(|(h, ips)| (h.as_str(), ips))
    }
}

/// Builds the desired state from the records and this tick's observations.
///
/// Each hostname maps to the deduplicated addresses of its resolved
/// interfaces. Unresolved interfaces are skipped; a hostname left with no
/// address is omitted.
#[must_use]
pub fn build_desired_state(records: &[Record], observations: &InterfaceObservations) -> DesiredState {
    let hosts = records
        .iter()
        .filter_map(|record| {
            let ips: IpSet = record
                .interface_refs
                .iter()
                .filter_map(|name| observations.ip_of(name))
                .collect();
            if ips.is_empty() {
                tracing::warn!(
                    hostname = %record.hostname,
                    interfaces = ?record.interface_refs,
                    "No interface resolved, leaving hostname untouched this tick"
                );
                None
            } else {
                Some((record.hostname.clone(), ips))
            }
        })
        .collect();

    DesiredState { hosts }
}
