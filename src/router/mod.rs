//! Router layer: discovers the current address of each WAN interface.
//!
//! [`resolve_interfaces`] turns one [`InterfaceSource`] query into per-interface
//! observations; [`OpnsenseClient`] is the OPNsense implementation.

mod error;
mod interface;
mod opnsense;


pub use error::RouterError;
pub use interface::{
    Interface, InterfaceObservations, InterfaceSource, RouterListing, resolve_interfaces,
};
pub use opnsense::OpnsenseClient;
