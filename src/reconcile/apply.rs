//! Applying a plan to the provider.

use crate::dns::{DnsError, DnsZone};
use crate::shutdown::Shutdown;

use super::{Plan, PlannedOp, ReconciliationOp};

/// What happened to one hostname's decision.
#[derive(Debug)]
pub enum HostnameOutcome {
    /// NoOp decision; nothing written.
    Unchanged,
    /// The write succeeded.
    Applied,
    /// Dry-run mode; the write was only logged.
    DryRun,
    /// The write failed.
    Failed(DnsError),
    /// A stop was requested before the write started.
    Skipped,
}

impl HostnameOutcome {
    /// Returns true unless the outcome is [`HostnameOutcome::Failed`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// A decision together with its outcome.
#[derive(Debug)]
pub struct AppliedOp {
    /// The decision that was acted on.
    pub planned: PlannedOp,
    /// What happened.
    pub outcome: HostnameOutcome,
}

/// Outcomes of one plan, in plan order.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// One entry per planned hostname.
    pub results: Vec<AppliedOp>,
}

impl ApplyReport {
    /// Returns the entries whose write failed.
    pub fn failures(&self) -> impl Iterator<Item = &AppliedOp> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, HostnameOutcome::Failed(_)))
    }

    /// Returns the entries whose write succeeded.
    pub fn applied(&self) -> impl Iterator<Item = &AppliedOp> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, HostnameOutcome::Applied))
    }

    /// Returns the outcome for `hostname`.
    #[must_use]
    pub fn outcome_of(&self, hostname: &str) -> Option<&HostnameOutcome> {
        self.results
            .iter()
            .find(|r| r.planned.hostname == hostname)
            .map(|r| &r.outcome)
    }

    /// Returns true if no write failed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Applies `plan` one hostname at a time, in plan order.
///
/// Every decision is logged at info level. In dry-run mode nothing is
/// written. A failed write is logged and does not stop the remaining
/// hostnames. Once `shutdown` fires, hostnames whose write has not started
/// are marked [`HostnameOutcome::Skipped`].
pub async fn apply_plan<Z: DnsZone>(
    zone: &Z,
    plan: &Plan,
    dry_run: bool,
    shutdown: &Shutdown,
) -> ApplyReport {
    let mut results = Vec::with_capacity(plan.len());

    for planned in plan.ops() {
        tracing::info!(
            hostname = %planned.hostname,
            op = %planned.op,
            current = ?planned.current,
            dry_run,
            "Reconciliation decision"
        );

        let outcome = if !planned.op.is_change() {
            HostnameOutcome::Unchanged
        } else if dry_run {
            HostnameOutcome::DryRun
        } else if shutdown.is_triggered() {
            tracing::info!(hostname = %planned.hostname, "Shutdown requested, skipping write");
            HostnameOutcome::Skipped
        } else {
            match write(zone, planned).await {
                Ok(()) => {
                    tracing::info!(hostname = %planned.hostname, op = %planned.op, "Applied");
                    HostnameOutcome::Applied
                }
                Err(e) => {
                    tracing::error!(
                        hostname = %planned.hostname,
                        op = %planned.op,
                        error = %e,
                        "Failed to apply DNS change"
                    );
                    HostnameOutcome::Failed(e)
                }
            }
        };

        results.push(AppliedOp {
            planned: planned.clone(),
            outcome,
        });
    }

    ApplyReport { results }
}

async fn write<Z: DnsZone>(zone: &Z, planned: &PlannedOp) -> Result<(), DnsError> {
    let record_id = || {
        planned.record_id.as_deref().ok_or_else(|| {
            DnsError::MalformedResponse(format!(
                "no record id known for '{}'",
                planned.hostname
            ))
        })
    };

    match &planned.op {
        ReconciliationOp::NoOp => Ok(()),
        ReconciliationOp::Create { ips } => zone.create_record_set(&planned.hostname, ips).await,
        ReconciliationOp::Update { ips } => zone.replace_record_set(record_id()?, ips).await,
        ReconciliationOp::Delete => zone.delete_record_set(record_id()?).await,
    }
}
