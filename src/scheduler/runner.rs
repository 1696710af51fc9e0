//! The reconciliation loop.

use std::time::Duration;

use tokio::sync::watch;

use crate::dns::{DnsZone, fetch_current_state};
use crate::health::HealthState;
use crate::notify::{ChangeEvent, Notifier};
use crate::reconcile::{
    ApplyReport, HostnameOutcome, Record, apply_plan, build_desired_state, plan,
};
use crate::router::{Interface, InterfaceSource, resolve_interfaces};
use crate::shutdown::Shutdown;
use crate::time::{Sleeper, TokioSleeper};
use crate::verify::{NameserverLookup, VerificationResult, Verifier};

use super::TickPhase;

/// What the scheduler reconciles and how often.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Configured interfaces in declaration order.
    pub interfaces: Vec<Interface>,
    /// Managed hostnames in declaration order.
    pub records: Vec<Record>,
    /// Hostnames whose records are to be removed.
    pub retired: Vec<String>,
    /// Time between the end of one tick and the start of the next.
    pub interval: Duration,
    /// Log decisions without writing.
    pub dry_run: bool,
    /// Hostname whose changes are forwarded to the notifier.
    pub trigger_hostname: Option<String>,
}

impl SchedulerSettings {
    fn managed_hostnames(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.hostname.clone())
            .chain(self.retired.iter().cloned())
            .collect()
    }
}

/// Everything one tick observed and did.
#[derive(Debug)]
pub struct TickReport {
    /// The router answered.
    pub router_ok: bool,
    /// The DNS provider listing succeeded.
    pub provider_ok: bool,
    /// Per-hostname outcomes, in decision order.
    pub apply: ApplyReport,
    /// Checks of every applied change.
    pub verifications: Vec<VerificationResult>,
    /// A change event was handed to the notifier.
    pub notified: bool,
}

impl TickReport {
    fn upstream_failure(router_ok: bool) -> Self {
        Self {
            router_ok,
            provider_ok: false,
            apply: ApplyReport::default(),
            verifications: Vec::new(),
            notified: false,
        }
    }

    /// Both upstreams answered.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.router_ok && self.provider_ok
    }

    /// Both upstreams answered and every write succeeded.
    ///
    /// Verification mismatches do not count.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.is_ready() && self.apply.all_succeeded()
    }
}

/// Drives reconciliation ticks.
///
/// Owns every collaborator of a tick. The rate limiter lives inside the
/// transports handed to the router and zone adapters, so both share the
/// same admission budget.
pub struct Scheduler<R, Z, L, N, S = TokioSleeper> {
    router: R,
    zone: Z,
    verifier: Option<Verifier<L, S>>,
    notifier: N,
    sleeper: S,
    settings: SchedulerSettings,
    health: HealthState,
    phase: watch::Sender<TickPhase>,
}

impl<R, Z, L, N> Scheduler<R, Z, L, N, TokioSleeper> {
    /// Creates a scheduler without verification.
    #[must_use]
    pub fn new(router: R, zone: Z, notifier: N, settings: SchedulerSettings) -> Self {
        Self {
            router,
            zone,
            verifier: None,
            notifier,
            sleeper: TokioSleeper,
            settings,
            health: HealthState::new(),
            phase: watch::Sender::new(TickPhase::Idle),
        }
    }
}

impl<R, Z, L, N, S: Clone> Scheduler<R, Z, L, N, S> {
    /// Sets the sleeper used between ticks and before verification.
    #[must_use]
    pub fn with_sleeper<S2: Clone>(self, sleeper: S2) -> Scheduler<R, Z, L, N, S2> {
        Scheduler {
            router: self.router,
            zone: self.zone,
            verifier: self.verifier.map(|v| v.with_sleeper(sleeper.clone())),
            notifier: self.notifier,
            sleeper,
            settings: self.settings,
            health: self.health,
            phase: self.phase,
        }
    }

    /// Enables post-apply verification.
    #[must_use]
    pub fn with_verifier<S2>(mut self, verifier: Verifier<L, S2>) -> Self {
        self.verifier = Some(verifier.with_sleeper(self.sleeper.clone()));
        self
    }

    /// Shares readiness with a health server.
    #[must_use]
    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }
}

impl<R, Z, L, N, S> Scheduler<R, Z, L, N, S> {
    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> TickPhase {
        *self.phase.borrow()
    }

    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    #[must_use]
    pub const fn health(&self) -> &HealthState {
        &self.health
    }

    fn enter(&self, phase: TickPhase) {
        let previous = self.phase.send_replace(phase);
        tracing::debug!(from = %previous, to = %phase, "Phase transition");
    }
}

impl<R, Z, L, N: Notifier, S> Scheduler<R, Z, L, N, S> {
    /// Waits up to `timeout` for notifications handed over by earlier ticks.
    ///
    /// Returns `false` if some were abandoned at the deadline.
    pub async fn drain_notifier(&self, timeout: Duration) -> bool {
        self.notifier.drain(timeout).await
    }
}

impl<R, Z, L, N, S> Scheduler<R, Z, L, N, S>
where
    R: InterfaceSource,
    Z: DnsZone,
    L: NameserverLookup,
    N: Notifier,
    S: Sleeper,
{
    /// Runs ticks until `shutdown` fires. Returns the number of ticks run.
    ///
    /// Tick failures are logged and never end the loop.
    pub async fn run(&self, shutdown: &Shutdown) -> u64 {
        let mut ticks = 0;
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            dry_run = self.settings.dry_run,
            "Starting reconciliation loop"
        );

        while !shutdown.is_triggered() {
            self.tick(shutdown).await;
            ticks += 1;

            self.enter(TickPhase::Sleeping);
            if shutdown.sleep(&self.sleeper, self.settings.interval).await {
                break;
            }
            self.enter(TickPhase::Idle);
        }

        self.enter(TickPhase::Terminated);
        tracing::info!(ticks, "Reconciliation loop stopped");
        ticks
    }

    /// Runs exactly one tick and terminates.
    pub async fn run_single(&self, shutdown: &Shutdown) -> TickReport {
        let report = self.tick(shutdown).await;
        self.enter(TickPhase::Terminated);
        report
    }

    /// Runs one tick: resolve, diff, apply, verify, notify.
    pub async fn tick(&self, shutdown: &Shutdown) -> TickReport {
        self.enter(TickPhase::Resolving);
        let observations = resolve_interfaces(&self.router, &self.settings.interfaces).await;
        let desired = build_desired_state(&self.settings.records, &observations);

        self.enter(TickPhase::Diffing);
        let managed = self.settings.managed_hostnames();
        let current = match fetch_current_state(&self.zone, &managed).await {
            Ok(current) => current,
            Err(e) => {
                tracing::error!(error = %e, "DNS provider unavailable, skipping apply");
                return self.finish(TickReport::upstream_failure(observations.router_ok));
            }
        };
        let plan = plan(
            &self.settings.records,
            &self.settings.retired,
            &desired,
            &current,
        );
        tracing::info!(
            hostnames = plan.len(),
            changes = plan.change_count(),
            "Reconciliation planned"
        );

        self.enter(TickPhase::Applying);
        let apply = apply_plan(&self.zone, &plan, self.settings.dry_run, shutdown).await;

        self.enter(TickPhase::Verifying);
        let verifications = self.verify_applied(&apply, shutdown).await;

        self.enter(TickPhase::Notifying);
        let notified = self.notify_trigger(&apply);

        self.finish(TickReport {
            router_ok: observations.router_ok,
            provider_ok: true,
            apply,
            verifications,
            notified,
        })
    }

    async fn verify_applied(
        &self,
        apply: &ApplyReport,
        shutdown: &Shutdown,
    ) -> Vec<VerificationResult> {
        let Some(verifier) = &self.verifier else {
            return Vec::new();
        };
        if self.settings.dry_run {
            tracing::debug!("Dry-run, skipping verification");
            return Vec::new();
        }

        let mut results = Vec::new();
        for applied in apply.applied() {
            let expected = applied.planned.op.target_ips();
            match verifier
                .verify(&applied.planned.hostname, &expected, shutdown)
                .await
            {
                Some(result) => results.push(result),
                None => {
                    tracing::info!("Shutdown requested, skipping remaining verification");
                    break;
                }
            }
        }
        results
    }

    fn notify_trigger(&self, apply: &ApplyReport) -> bool {
        let Some(trigger) = &self.settings.trigger_hostname else {
            return false;
        };
        let Some(entry) = apply
            .results
            .iter()
            .find(|r| r.planned.hostname == *trigger)
        else {
            return false;
        };
        if !matches!(
            entry.outcome,
            HostnameOutcome::Applied | HostnameOutcome::DryRun
        ) {
            return false;
        }

        self.notifier.notify(ChangeEvent {
            hostname: trigger.clone(),
            ips: entry.planned.op.target_ips(),
            dry_run: self.settings.dry_run,
        });
        true
    }

    fn finish(&self, report: TickReport) -> TickReport {
        self.health.set_ready(report.is_ready());
        let mismatches = report.verifications.iter().filter(|v| !v.matched).count();
        tracing::info!(
            router_ok = report.router_ok,
            provider_ok = report.provider_ok,
            applied = report.apply.applied().count(),
            failed = report.apply.failures().count(),
            mismatches,
            "Tick complete"
        );
        report
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
