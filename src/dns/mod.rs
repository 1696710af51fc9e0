//! DNS provider layer.
//!
//! [`DnsZone`] abstracts a provider zone with whole-set A record writes;
//! [`fetch_current_state`] turns its listing into the [`CurrentState`] the
//! reconciler diffs against. [`HetznerZone`] talks to Hetzner Cloud DNS.

mod error;
mod hetzner;
mod state;

#[cfg(test)]
mod state_tests;

pub use error::DnsError;
pub use hetzner::HetznerZone;
pub use state::{CurrentRecordSet, CurrentState, DnsZone, IpSet, RecordSet, fetch_current_state};
