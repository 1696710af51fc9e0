//! Post-apply propagation checks.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::dns::IpSet;
use crate::shutdown::Shutdown;
use crate::time::{Sleeper, TokioSleeper};

use super::NameserverLookup;

/// Hetzner's authoritative nameservers.
pub const HETZNER_NAMESERVERS: [&str; 3] = [
    "helium.ns.hetzner.de",
    "hydrogen.ns.hetzner.com",
    "oxygen.ns.hetzner.com",
];

/// Outcome of checking one hostname against the authoritative servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Hostname relative to the zone.
    pub hostname: String,
    /// Addresses the provider should now publish.
    pub expected: IpSet,
    /// Answer of every server that answered.
    pub observed: BTreeMap<IpAddr, IpSet>,
    /// Servers that could not be queried.
    pub unreachable: Vec<IpAddr>,
    /// True when at least one server answered and every answer equals
    /// `expected`.
    pub matched: bool,
}

/// Confirms applied changes by querying authoritative nameservers.
///
/// Purely advisory: a mismatch is logged and returned, nothing else.
#[derive(Debug)]
pub struct Verifier<L, S = TokioSleeper> {
    lookup: L,
    sleeper: S,
    zone: String,
    nameservers: Vec<String>,
    delay: Duration,
}

impl<L> Verifier<L, TokioSleeper> {
    /// Default wait between applying a change and checking it.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    /// Creates a verifier for `zone` using the Hetzner nameservers.
    #[must_use]
    pub fn new(lookup: L, zone: impl Into<String>) -> Self {
        Self {
            lookup,
            sleeper: TokioSleeper,
            zone: zone.into(),
            nameservers: HETZNER_NAMESERVERS.iter().map(ToString::to_string).collect(),
            delay: Self::DEFAULT_DELAY,
        }
    }
}

impl<L, S> Verifier<L, S> {
    /// Sets a custom sleeper for the propagation delay.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> Verifier<L, S2> {
        Verifier {
            lookup: self.lookup,
            sleeper,
            zone: self.zone,
            nameservers: self.nameservers,
            delay: self.delay,
        }
    }

    /// Sets the nameserver hostnames to query.
    #[must_use]
    pub fn with_nameservers(mut self, nameservers: Vec<String>) -> Self {
        self.nameservers = nameservers;
        self
    }

    /// Sets the propagation delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the fully qualified, dot-terminated name of `hostname`.
    #[must_use]
    pub fn fqdn(&self, hostname: &str) -> String {
        let zone = self.zone.trim_end_matches('.');
        if hostname == "@" || hostname.is_empty() {
            format!("{zone}.")
        } else {
            format!("{hostname}.{zone}.")
        }
    }
}

impl<L: NameserverLookup, S: Sleeper> Verifier<L, S> {
    /// Waits the propagation delay, then checks `hostname` on every server.
    ///
    /// Returns `None` if a stop is requested during the delay.
    pub async fn verify(
        &self,
        hostname: &str,
        expected: &IpSet,
        shutdown: &Shutdown,
    ) -> Option<VerificationResult> {
        if shutdown.sleep(&self.sleeper, self.delay).await {
            return None;
        }

        let fqdn = self.fqdn(hostname);
        let servers = self.lookup.nameserver_addrs(&self.nameservers).await;
        let mut observed = BTreeMap::new();
        let mut unreachable = Vec::new();

        for server in servers {
            match self.lookup.query_a(server, &fqdn).await {
                Ok(ips) => {
                    observed.insert(server, ips);
                }
                Err(e) => {
                    tracing::debug!(%fqdn, error = %e, "Nameserver query failed");
                    unreachable.push(server);
                }
            }
        }

        let matched = !observed.is_empty() && observed.values().all(|ips| ips == expected);
        let result = VerificationResult {
            hostname: hostname.to_string(),
            expected: expected.clone(),
            observed,
            unreachable,
            matched,
        };
        log_result(&result, &fqdn);
        Some(result)
    }
}

fn log_result(result: &VerificationResult, fqdn: &str) {
    if result.matched {
        tracing::debug!(
            %fqdn,
            expected = ?result.expected,
            servers = result.observed.len(),
            "DNS verification passed"
        );
    } else {
        tracing::warn!(
            event = "verification_mismatch",
            hostname = %result.hostname,
            %fqdn,
            expected = ?result.expected,
            observed = ?result.observed,
            unreachable = ?result.unreachable,
            "DNS verification mismatch"
        );
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
