//! Provider-side record state and the DNS zone abstraction.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use super::DnsError;

/// A deduplicated, order-independent set of IPv4 addresses.
pub type IpSet = BTreeSet<Ipv4Addr>;

/// One A record set as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Provider-owned identifier, opaque to the reconciler.
    pub id: String,
    /// Hostname relative to the zone (`@` for the apex).
    pub hostname: String,
    /// Addresses currently published.
    pub ips: IpSet,
}

/// The provider's current record set for one hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentRecordSet {
    /// Provider-owned identifier used for updates and deletes.
    pub id: String,
    /// Addresses currently published.
    pub ips: IpSet,
}

/// Provider state of the managed hostnames, fetched fresh every tick.
///
/// A managed hostname with no records is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentState {
    records: BTreeMap<String, CurrentRecordSet>,
}

impl CurrentState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the provider's set for `hostname`, merging with any set
    /// already present for it.
    pub fn insert(&mut self, hostname: impl Into<String>, record: CurrentRecordSet) {
        self.records
            .entry(hostname.into())
            .and_modify(|existing| existing.ips.extend(record.ips.iter().copied()))
            .or_insert(record);
    }

    /// Returns the record set held for `hostname`.
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<&CurrentRecordSet> {
        self.records.get(hostname)
    }

    /// Returns the addresses held for `hostname`; empty if there are none.
    #[must_use]
    pub fn ips_of(&self, hostname: &str) -> IpSet {
        self.get(hostname)
            .map(|r| r.ips.clone())
            .unwrap_or_default()
    }

    /// Number of hostnames with records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no managed hostname has records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, CurrentRecordSet)> for CurrentState {
    fn from_iter<I: IntoIterator<Item = (String, CurrentRecordSet)>>(iter: I) -> Self {
        let mut state = Self::new();
        for (hostname, record) in iter {
            state.insert(hostname, record);
        }
        state
    }
}

/// A DNS zone whose A record sets can be listed and written.
///
/// Writes use whole-set semantics: a create or replace publishes exactly
/// the given addresses for the hostname.
pub trait DnsZone: Send + Sync {
    /// Lists every A record set in the zone.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] if the zone cannot be read.
    fn list_a_records(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RecordSet>, DnsError>> + Send;

    /// Publishes a new record set for a hostname that has none.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] if the provider does not accept the write.
    fn create_record_set(
        &self,
        hostname: &str,
        ips: &IpSet,
    ) -> impl std::future::Future<Output = Result<(), DnsError>> + Send;

    /// Replaces the addresses of an existing record set.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] if the provider does not accept the write.
    fn replace_record_set(
        &self,
        record_id: &str,
        ips: &IpSet,
    ) -> impl std::future::Future<Output = Result<(), DnsError>> + Send;

    /// Removes an existing record set.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] if the provider does not accept the delete.
    fn delete_record_set(
        &self,
        record_id: &str,
    ) -> impl std::future::Future<Output = Result<(), DnsError>> + Send;
}

impl<Z: DnsZone> DnsZone for std::sync::Arc<Z> {
    async fn list_a_records(&self) -> Result<Vec<RecordSet>, DnsError> {
        (**self).list_a_records().await
    }

    async fn create_record_set(&self, hostname: &str, ips: &IpSet) -> Result<(), DnsError> {
        (**self).create_record_set(hostname, ips).await
    }

    async fn replace_record_set(&self, record_id: &str, ips: &IpSet) -> Result<(), DnsError> {
        (**self).replace_record_set(record_id, ips).await
    }

    async fn delete_record_set(&self, record_id: &str) -> Result<(), DnsError> {
        (**self).delete_record_set(record_id).await
    }
}

/// Fetches the provider's A records and keeps those of managed hostnames.
///
/// # Errors
///
/// Returns [`DnsError`] if the zone listing fails.
pub async fn fetch_current_state<Z: DnsZone>(
    zone: &Z,
    managed: &[String],
) -> Result<CurrentState, DnsError> {
    let listed = zone.list_a_records().await?;
    let total = listed.len();

    let state: CurrentState = listed
        .into_iter()
        .filter(|set| managed.iter().any(|h| *h == set.hostname))
        .map(|set| {
            (
                set.hostname,
                CurrentRecordSet {
                    id: set.id,
                    ips: set.ips,
                },
            )
        })
        .collect();

    tracing::debug!(
        listed = total,
        managed = state.len(),
        "Fetched current DNS state"
    );
    Ok(state)
}
