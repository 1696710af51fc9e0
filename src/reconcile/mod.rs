//! Reconciliation engine: desired state, diff, plan and apply.
//!
//! One tick flows through [`build_desired_state`], [`plan`] and
//! [`apply_plan`]. Everything here except applying is pure.

mod apply;
mod desired;
mod plan;

#[cfg(test)]
mod apply_tests;

pub use apply::{AppliedOp, ApplyReport, HostnameOutcome, apply_plan};
pub use desired::{DesiredState, Record, build_desired_state};
pub use plan::{Plan, PlannedOp, ReconciliationOp, diff, plan};
