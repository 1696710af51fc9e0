//! Hetzner Cloud DNS adapter (RRSet API).

use std::net::Ipv4Addr;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::transport::{ApiTransport, HttpRequest, bearer_auth};

use super::{DnsError, DnsZone, IpSet, RecordSet};

const JSON: &str = "application/json";
const PAGE_SIZE: &str = "100";

/// A zone hosted on Hetzner Cloud DNS.
///
/// The zone id is looked up by name on first use and cached for the
/// lifetime of the client.
pub struct HetznerZone<T> {
    transport: T,
    api_base: url::Url,
    auth: http::HeaderValue,
    zone: String,
    ttl: u32,
    zone_id: OnceCell<String>,
}

impl<T> HetznerZone<T> {
    /// Production API base URL.
    pub const DEFAULT_API_BASE: &'static str = "https://api.hetzner.cloud/v1";

    /// Creates a client for `zone`, publishing new record sets with `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Request`] if the token cannot be sent as a header.
    pub fn new(
        transport: T,
        api_base: url::Url,
        token: &str,
        zone: impl Into<String>,
        ttl: u32,
    ) -> Result<Self, DnsError> {
        Ok(Self {
            transport,
            api_base,
            auth: bearer_auth(token).map_err(DnsError::Request)?,
            zone: zone.into(),
            ttl,
            zone_id: OnceCell::new(),
        })
    }

    /// Returns the zone name.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    fn url(&self, segments: &[&str]) -> Result<url::Url, DnsError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| DnsError::InvalidUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        request.with_header(http::header::AUTHORIZATION, self.auth.clone())
    }
}

impl<T> std::fmt::Debug for HetznerZone<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetznerZone")
            .field("api_base", &self.api_base.as_str())
            .field("zone", &self.zone)
            .field("ttl", &self.ttl)
            .field("zone_id", &self.zone_id.get())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ZonesPage {
    #[serde(default)]
    zones: Vec<ZoneEntry>,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    id: serde_json::Value,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RrsetsPage {
    #[serde(default)]
    rrsets: Vec<RrsetEntry>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct RrsetEntry {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    records: Vec<RecordValue>,
}

#[derive(Debug, Deserialize)]
struct RecordValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next_page: Option<u32>,
}

impl RrsetsPage {
    fn next_page(&self) -> Option<u32> {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .and_then(|p| p.next_page)
    }
}

fn records_body(ips: &IpSet) -> Vec<serde_json::Value> {
    ips.iter().map(|ip| json!({ "value": ip.to_string() })).collect()
}

fn split_record_id(record_id: &str) -> Result<(&str, &str), DnsError> {
    record_id
        .rsplit_once('/')
        .filter(|(name, kind)| !name.is_empty() && !kind.is_empty())
        .ok_or_else(|| DnsError::MalformedResponse(format!("unexpected RRSet id '{record_id}'")))
}

impl<T: ApiTransport> HetznerZone<T> {
    async fn zone_id(&self) -> Result<&str, DnsError> {
        self.zone_id
            .get_or_try_init(|| self.lookup_zone_id())
            .await
            .map(String::as_str)
    }

    async fn lookup_zone_id(&self) -> Result<String, DnsError> {
        let mut url = self.url(&["zones"])?;
        url.query_pairs_mut().append_pair("name", &self.zone);

        let response = self
            .transport
            .call(self.authorized(HttpRequest::get(url)))
            .await?;
        let page: ZonesPage = response
            .json()
            .map_err(|e| DnsError::MalformedResponse(e.to_string()))?;

        let id = page
            .zones
            .into_iter()
            .find(|z| z.name == self.zone)
            .map(|z| match z.id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .ok_or_else(|| DnsError::ZoneNotFound(self.zone.clone()))?;

        tracing::debug!(zone = %self.zone, zone_id = %id, "Found zone");
        Ok(id)
    }

    async fn rrsets_page(&self, zone_id: &str, page: u32) -> Result<RrsetsPage, DnsError> {
        let mut url = self.url(&["zones", zone_id, "rrsets"])?;
        url.query_pairs_mut()
            .append_pair("type", "A")
            .append_pair("page", &page.to_string())
            .append_pair("per_page", PAGE_SIZE);

        let response = self
            .transport
            .call(self.authorized(HttpRequest::get(url)))
            .await?;
        response
            .json()
            .map_err(|e| DnsError::MalformedResponse(e.to_string()))
    }
}

impl<T: ApiTransport> DnsZone for HetznerZone<T> {
    async fn list_a_records(&self) -> Result<Vec<RecordSet>, DnsError> {
        let zone_id = self.zone_id().await?;
        let mut sets = Vec::new();
        let mut page = 1;

        loop {
            let listing = self.rrsets_page(zone_id, page).await?;
            let next = listing.next_page();

            for entry in listing.rrsets.into_iter().filter(|r| r.kind == "A") {
                let ips = entry
                    .records
                    .iter()
                    .filter_map(|r| match r.value.parse::<Ipv4Addr>() {
                        Ok(ip) => Some(ip),
                        Err(_) => {
                            tracing::warn!(
                                hostname = %entry.name,
                                value = %r.value,
                                "Ignoring A record value that is not an IPv4 address"
                            );
                            None
                        }
                    })
                    .collect();
                sets.push(RecordSet {
                    id: entry.id.unwrap_or_else(|| format!("{}/A", entry.name)),
                    hostname: entry.name,
                    ips,
                });
            }

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }

        Ok(sets)
    }

    async fn create_record_set(&self, hostname: &str, ips: &IpSet) -> Result<(), DnsError> {
        let zone_id = self.zone_id().await?;
        let url = self.url(&["zones", zone_id, "rrsets"])?;
        let body = json!({
            "name": hostname,
            "type": "A",
            "ttl": self.ttl,
            "records": records_body(ips),
        });
        let request = HttpRequest::post(url)
            .with_json(&body, JSON)
            .map_err(|e| DnsError::MalformedResponse(e.to_string()))?;

        self.transport.call(self.authorized(request)).await?;
        Ok(())
    }

    async fn replace_record_set(&self, record_id: &str, ips: &IpSet) -> Result<(), DnsError> {
        let zone_id = self.zone_id().await?;
        let (name, kind) = split_record_id(record_id)?;
        let url = self.url(&["zones", zone_id, "rrsets", name, kind, "actions", "set_records"])?;
        let body = json!({ "records": records_body(ips) });
        let request = HttpRequest::post(url)
            .with_json(&body, JSON)
            .map_err(|e| DnsError::MalformedResponse(e.to_string()))?;

        self.transport.call(self.authorized(request)).await?;
        Ok(())
    }

    async fn delete_record_set(&self, record_id: &str) -> Result<(), DnsError> {
        let zone_id = self.zone_id().await?;
        let (name, kind) = split_record_id(record_id)?;
        let url = self.url(&["zones", zone_id, "rrsets", name, kind])?;

        self.transport
            .call(self.authorized(HttpRequest::delete(url)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "hetzner_tests.rs"]
mod tests;
