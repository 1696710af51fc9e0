//! wan-dyndns: dynamic DNS for multi-WAN routers.
//!
//! Each tick reads the router's interface addresses, derives the A-records
//! every managed hostname should publish, diffs them against the DNS
//! provider, applies the minimal changes, and optionally verifies them
//! against the provider's authoritative nameservers.

pub mod config;
pub mod dns;
pub mod health;
pub mod notify;
pub mod reconcile;
pub mod router;
pub mod scheduler;
pub mod shutdown;
pub mod time;
pub mod transport;
pub mod verify;

#[cfg(test)]
mod test_support;
