//! Interface resolution against a router.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::RouterError;

/// A configured interface and, after a tick's resolution, its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Name used by records (e.g. `wan1`).
    pub logical_name: String,
    /// Name the router knows the interface by (e.g. `opt1`).
    pub provider_name: String,
    /// The interface's IPv4 this tick; `None` means resolution failed.
    pub resolved_ip: Option<Ipv4Addr>,
}

impl Interface {
    /// Creates an unresolved interface.
    #[must_use]
    pub fn new(logical_name: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            provider_name: provider_name.into(),
            resolved_ip: None,
        }
    }
}

/// Router-side interface listing: router interface name to its IPv4, if any.
pub type RouterListing = BTreeMap<String, Option<Ipv4Addr>>;

/// A source of the router's current interface listing.
pub trait InterfaceSource: Send + Sync {
    /// Fetches every interface the router currently reports.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] if the router cannot be queried or its
    /// answer cannot be understood.
    fn interface_listing(
        &self,
    ) -> impl std::future::Future<Output = Result<RouterListing, RouterError>> + Send;
}

impl<R: InterfaceSource> InterfaceSource for std::sync::Arc<R> {
    async fn interface_listing(&self) -> Result<RouterListing, RouterError> {
        (**self).interface_listing().await
    }
}

/// Result of resolving every configured interface in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceObservations {
    /// Configured interfaces in configuration order, with this tick's addresses.
    pub interfaces: Vec<Interface>,
    /// Whether the router query itself succeeded.
    pub router_ok: bool,
}

impl InterfaceObservations {
    /// Returns the resolved address of a logical interface.
    #[must_use]
    pub fn ip_of(&self, logical_name: &str) -> Option<Ipv4Addr> {
        self.interfaces
            .iter()
            .find(|i| i.logical_name == logical_name)
            .and_then(|i| i.resolved_ip)
    }

    /// Number of interfaces that resolved to an address.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.interfaces
            .iter()
            .filter(|i| i.resolved_ip.is_some())
            .count()
    }
}

/// Resolves the address of every configured interface with one router query.
///
/// An interface the router does not list, or lists without an IPv4, stays
/// unresolved and is logged as a warning. If the router query fails every
/// interface stays unresolved and `router_ok` is false.
pub async fn resolve_interfaces<R: InterfaceSource>(
    router: &R,
    configured: &[Interface],
) -> InterfaceObservations {
    let listing = match router.interface_listing().await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::error!(error = %e, "Router unavailable, all interfaces unresolved");
            return InterfaceObservations {
                interfaces: configured
                    .iter()
                    .map(|i| Interface::new(&i.logical_name, &i.provider_name))
                    .collect(),
                router_ok: false,
            };
        }
    };

    let interfaces = configured
        .iter()
        .map(|iface| {
            let resolved_ip = match listing.get(&iface.provider_name) {
                None => {
                    tracing::warn!(
                        logical_name = %iface.logical_name,
                        router_name = %iface.provider_name,
                        available = ?listing.keys().collect::<Vec<_>>(),
                        "Interface not found on router"
                    );
                    None
                }
                Some(None) => {
                    tracing::warn!(
                        logical_name = %iface.logical_name,
                        router_name = %iface.provider_name,
                        "No IPv4 address on interface"
                    );
                    None
                }
                Some(Some(ip)) => {
                    tracing::debug!(
                        logical_name = %iface.logical_name,
                        router_name = %iface.provider_name,
                        %ip,
                        "Resolved interface"
                    );
                    Some(*ip)
                }
            };
            Interface {
                logical_name: iface.logical_name.clone(),
                provider_name: iface.provider_name.clone(),
                resolved_ip,
            }
        })
        .collect();

    InterfaceObservations {
        interfaces,
        router_ok: true,
    }
}
