//! Scheduling of reconciliation ticks.
//!
//! The [`Scheduler`] is the only component with a time dimension. It runs
//! one tick per interval (or a single tick) and stops at the next
//! suspension point once a shutdown is requested.

mod phase;
mod runner;

pub use phase::TickPhase;
pub use runner::{Scheduler, SchedulerSettings, TickReport};
