//! OPNsense REST API adapter.

use std::net::Ipv4Addr;

use serde_json::Value;

use crate::transport::{ApiTransport, HttpRequest};

use super::{InterfaceSource, RouterError, RouterListing};

const INTERFACE_CONFIG_PATH: &str = "diagnostics/interface/getInterfaceConfig";

/// Reads interface addresses from an OPNsense firewall.
///
/// Authenticates with the API key/secret pair as HTTP basic auth.
pub struct OpnsenseClient<T> {
    transport: T,
    endpoint: url::Url,
    key: String,
    secret: String,
}

impl<T> OpnsenseClient<T> {
    /// Creates a client for the firewall at `base_url`.
    ///
    /// `/api` is appended to the base URL unless it already ends with it.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidUrl`] if the endpoint URL cannot be built.
    pub fn new(
        transport: T,
        base_url: &url::Url,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, RouterError> {
        Ok(Self {
            transport,
            endpoint: interface_config_url(base_url)?,
            key: key.into(),
            secret: secret.into(),
        })
    }

    /// Returns the URL queried for the interface listing.
    #[must_use]
    pub const fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

impl<T> std::fmt::Debug for OpnsenseClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpnsenseClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T: ApiTransport> InterfaceSource for OpnsenseClient<T> {
    async fn interface_listing(&self) -> Result<RouterListing, RouterError> {
        tracing::debug!(url = %self.endpoint, "Querying router interface config");
        let request =
            HttpRequest::get(self.endpoint.clone()).with_basic_auth(&self.key, &self.secret);
        let response = self.transport.call(request).await?;
        let body: Value = response
            .json()
            .map_err(|e| RouterError::MalformedResponse(e.to_string()))?;
        parse_interface_config(&body)
    }
}

fn interface_config_url(base_url: &url::Url) -> Result<url::Url, RouterError> {
    let mut base = base_url.as_str().trim_end_matches('/').to_string();
    if !base.ends_with("/api") {
        base.push_str("/api");
    }
    url::Url::parse(&format!("{base}/{INTERFACE_CONFIG_PATH}"))
        .map_err(|e| RouterError::InvalidUrl(e.to_string()))
}

/// Parses a `getInterfaceConfig` body into a listing.
///
/// The first `ipv4[].ipaddr` wins; a top-level `ipaddr` is the fallback.
/// Values that are not IPv4 literals (such as `dhcp`) count as no address.
fn parse_interface_config(body: &Value) -> Result<RouterListing, RouterError> {
    let Value::Object(interfaces) = body else {
        return Err(RouterError::MalformedResponse(
            "expected a JSON object keyed by interface name".to_string(),
        ));
    };

    Ok(interfaces
        .iter()
        .map(|(name, info)| (name.clone(), interface_ipv4(info)))
        .collect())
}

fn interface_ipv4(info: &Value) -> Option<Ipv4Addr> {
    let from_list = info
        .get("ipv4")
        .and_then(Value::as_array)
        .and_then(|addrs| addrs.iter().find_map(|a| a.get("ipaddr")));
    from_list
        .or_else(|| info.get("ipaddr"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
#[path = "opnsense_tests.rs"]
mod tests;
