//! Diffing desired against current state.

use std::fmt;

use crate::dns::{CurrentState, IpSet};

use super::{DesiredState, Record};

/// What to do with one hostname this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOp {
    /// Provider already publishes the desired set.
    NoOp,
    /// Hostname has no records; publish `ips`.
    Create {
        /// Addresses to publish.
        ips: IpSet,
    },
    /// Replace the published set with `ips`.
    Update {
        /// Addresses to publish.
        ips: IpSet,
    },
    /// Remove the hostname's records.
    Delete,
}

impl ReconciliationOp {
    /// Returns true for any operation that writes to the provider.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }

    /// Addresses the provider should publish once the op is applied.
    #[must_use]
    pub fn target_ips(&self) -> IpSet {
        match self {
            Self::Create { ips } | Self::Update { ips } => ips.clone(),
            Self::NoOp | Self::Delete => IpSet::new(),
        }
    }
}

fn fmt_ips(f: &mut fmt::Formatter<'_>, ips: &IpSet) -> fmt::Result {
    let joined: Vec<String> = ips.iter().map(ToString::to_string).collect();
    write!(f, "{{{}}}", joined.join(", "))
}

impl fmt::Display for ReconciliationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => f.write_str("NoOp"),
            Self::Create { ips } => {
                f.write_str("Create")?;
                fmt_ips(f, ips)
            }
            Self::Update { ips } => {
                f.write_str("Update")?;
                fmt_ips(f, ips)
            }
            Self::Delete => f.write_str("Delete"),
        }
    }
}

/// Computes the operation turning `have` into `want`.
#[must_use]
pub fn diff(want: &IpSet, have: &IpSet) -> ReconciliationOp {
    if want == have {
        ReconciliationOp::NoOp
    } else if have.is_empty() {
        ReconciliationOp::Create { ips: want.clone() }
    } else if want.is_empty() {
        ReconciliationOp::Delete
    } else {
        ReconciliationOp::Update { ips: want.clone() }
    }
}

/// One hostname's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOp {
    /// Hostname the op applies to.
    pub hostname: String,
    /// The decision.
    pub op: ReconciliationOp,
    /// Addresses the provider held when the plan was made.
    pub current: IpSet,
    /// Provider id of the existing record set, if any.
    pub record_id: Option<String>,
}

/// Ordered decisions for one tick.
///
/// Live records come first in declared order, then retired hostnames in
/// declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    ops: Vec<PlannedOp>,
}

impl Plan {
    /// Returns the decisions in apply order.
    #[must_use]
    pub fn ops(&self) -> &[PlannedOp] {
        &self.ops
    }

    /// Number of decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the plan holds no decisions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of decisions that write to the provider.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.ops.iter().filter(|p| p.op.is_change()).count()
    }

    /// Returns the decision for `hostname`, if one was made.
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<&PlannedOp> {
        self.ops.iter().find(|p| p.hostname == hostname)
    }
}

/// Adjusts `op` when the provider holds a record set with no usable
/// address for the hostname.
///
/// Such a set cannot be created again, so a create becomes a replace of the
/// existing set, and an empty desired set still removes it.
fn against_existing(op: ReconciliationOp, empty_set_exists: bool) -> ReconciliationOp {
    match op {
        ReconciliationOp::Create { ips } if empty_set_exists => ReconciliationOp::Update { ips },
        ReconciliationOp::NoOp if empty_set_exists => ReconciliationOp::Delete,
        op => op,
    }
}

/// Plans this tick's operations.
///
/// Records absent from `desired` get no decision at all. Each `retired`
/// hostname is planned against an empty desired set, so it is deleted
/// while the provider still holds records for it.
#[must_use]
pub fn plan(
    records: &[Record],
    retired: &[String],
    desired: &DesiredState,
    current: &CurrentState,
) -> Plan {
    let empty = IpSet::new();
    let live = records
        .iter()
        .filter_map(|r| desired.get(&r.hostname).map(|want| (r.hostname.as_str(), want)));
    let retiring = retired.iter().map(|h| (h.as_str(), &empty));

    let ops = live
        .chain(retiring)
        .map(|(hostname, want)| {
            let existing = current.get(hostname);
            let have = existing.map(|r| r.ips.clone()).unwrap_or_default();
            PlannedOp {
                hostname: hostname.to_string(),
                op: against_existing(
                    diff(want, &have),
                    existing.is_some_and(|r| r.ips.is_empty()),
                ),
                current: have,
                record_id: existing.map(|r| r.id.clone()),
            }
        })
        .collect();

    Plan { ops }
}
