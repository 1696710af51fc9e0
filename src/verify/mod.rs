//! Propagation checks against authoritative nameservers.

mod error;
mod lookup;
mod verifier;

pub use error::LookupError;
pub use lookup::{HickoryLookup, NameserverLookup};
pub use verifier::{HETZNER_NAMESERVERS, VerificationResult, Verifier};
