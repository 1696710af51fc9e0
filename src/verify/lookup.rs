//! Direct nameserver queries.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use hickory_resolver::TokioResolver;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;

use crate::dns::IpSet;

use super::LookupError;

/// Queries authoritative nameservers directly.
pub trait NameserverLookup: Send + Sync {
    /// Resolves nameserver hostnames to addresses. Unresolvable names are
    /// dropped.
    fn nameserver_addrs(
        &self,
        names: &[String],
    ) -> impl std::future::Future<Output = Vec<IpAddr>> + Send;

    /// Asks `server` for the A records of `fqdn`.
    ///
    /// A name without A records (including NXDOMAIN) is an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the server does not give a usable answer.
    fn query_a(
        &self,
        server: IpAddr,
        fqdn: &str,
    ) -> impl std::future::Future<Output = Result<IpSet, LookupError>> + Send;
}

/// [`NameserverLookup`] backed by `hickory-resolver`.
///
/// Every query builds a resolver pointed at exactly one server with the
/// cache disabled, so answers always come from that server.
#[derive(Debug, Clone)]
pub struct HickoryLookup {
    timeout: Duration,
}

impl HickoryLookup {
    /// Default per-query timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a lookup with the given per-query timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn resolver_for(&self, server: IpAddr) -> TokioResolver {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(
            SocketAddr::new(server, 53),
            Protocol::Udp,
        ));

        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        opts.attempts = 1;
        opts.cache_size = 0;

        TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }
}

impl Default for HickoryLookup {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl NameserverLookup for HickoryLookup {
    async fn nameserver_addrs(&self, names: &[String]) -> Vec<IpAddr> {
        let mut addrs = Vec::new();
        for name in names {
            let resolved =
                tokio::time::timeout(self.timeout, tokio::net::lookup_host((name.as_str(), 53)))
                    .await;
            match resolved {
                Ok(Ok(found)) => {
                    for addr in found.filter(SocketAddr::is_ipv4) {
                        if !addrs.contains(&addr.ip()) {
                            addrs.push(addr.ip());
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(nameserver = %name, error = %e, "Could not resolve nameserver");
                }
                Err(_) => {
                    tracing::debug!(nameserver = %name, "Timed out resolving nameserver");
                }
            }
        }
        addrs
    }

    async fn query_a(&self, server: IpAddr, fqdn: &str) -> Result<IpSet, LookupError> {
        let resolver = self.resolver_for(server);
        match resolver.ipv4_lookup(fqdn).await {
            Ok(answer) => Ok(answer.iter().map(|a| a.0).collect()),
            Err(e) if e.is_no_records_found() => Ok(IpSet::new()),
            Err(e) => Err(LookupError {
                server,
                message: e.to_string(),
            }),
        }
    }
}
