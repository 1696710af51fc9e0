//! Application execution logic.
//!
//! Builds the adapters from validated configuration, wires them into a
//! [`Scheduler`], and drives it until a shutdown signal or, in single-run
//! mode, for one tick.

use std::time::Duration;

use thiserror::Error;
use tokio::signal;

use wan_dyndns::config::ValidatedConfig;
use wan_dyndns::dns::{DnsError, HetznerZone};
use wan_dyndns::health::{self, HealthState};
use wan_dyndns::notify::{
    ChangeEvent, DisabledNotifier, KubernetesNotifier, NotifyError, Notifier,
};
use wan_dyndns::router::{OpnsenseClient, RouterError};
use wan_dyndns::scheduler::{Scheduler, SchedulerSettings, TickReport};
use wan_dyndns::shutdown::{self, Shutdown};
use wan_dyndns::transport::{HttpError, RateLimitedClient, RateLimiter, ReqwestClient};
use wan_dyndns::verify::{HickoryLookup, Verifier};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// An HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] HttpError),

    /// The router adapter could not be built.
    #[error("Failed to set up router client: {0}")]
    Router(#[source] RouterError),

    /// The DNS provider adapter could not be built.
    #[error("Failed to set up DNS provider client: {0}")]
    Dns(#[source] DnsError),

    /// Downstream notification was enabled but cannot work here.
    #[error("Failed to set up notifier: {0}")]
    Notifier(#[source] NotifyError),

    /// The health port could not be bound.
    #[error("Failed to bind health port {port}: {source}")]
    HealthBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The single tick did not complete cleanly.
    #[error(
        "Reconciliation failed (router ok: {router_ok}, provider ok: {provider_ok}, failed writes: {failed})"
    )]
    TickFailed {
        router_ok: bool,
        provider_ok: bool,
        failed: usize,
    },
}

/// How long to wait for pending notifications before exiting.
const NOTIFY_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

type Transport = RateLimitedClient<ReqwestClient>;

type AppScheduler =
    Scheduler<OpnsenseClient<Transport>, HetznerZone<Transport>, HickoryLookup, AppNotifier>;

/// The notifier selected by configuration.
#[derive(Debug)]
enum AppNotifier {
    Kubernetes(KubernetesNotifier<ReqwestClient>),
    Disabled(DisabledNotifier),
}

impl Notifier for AppNotifier {
    fn notify(&self, event: ChangeEvent) {
        match self {
            Self::Kubernetes(notifier) => notifier.notify(event),
            Self::Disabled(notifier) => notifier.notify(event),
        }
    }

    async fn drain(&self, timeout: Duration) -> bool {
        match self {
            Self::Kubernetes(notifier) => notifier.drain(timeout).await,
            Self::Disabled(notifier) => notifier.drain(timeout).await,
        }
    }
}

/// Derives what the scheduler reconciles from configuration.
fn scheduler_settings(config: &ValidatedConfig) -> SchedulerSettings {
    SchedulerSettings {
        interfaces: config.router.interfaces.clone(),
        records: config.records.clone(),
        retired: config.dns.retire.clone(),
        interval: config.interval,
        dry_run: config.dry_run,
        trigger_hostname: config.notify.as_ref().map(|n| n.trigger_hostname.clone()),
    }
}

/// Maps a single-run report to the process outcome.
fn single_run_outcome(report: &TickReport) -> Result<(), RunError> {
    if report.succeeded() {
        Ok(())
    } else {
        Err(RunError::TickFailed {
            router_ok: report.router_ok,
            provider_ok: report.provider_ok,
            failed: report.apply.failures().count(),
        })
    }
}

/// Builds the rate-limited transports. Both share one limiter.
fn build_transports(config: &ValidatedConfig) -> Result<(Transport, Transport), RunError> {
    let limiter = RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window,
    );

    let router_http = ReqwestClient::builder()
        .verify_tls(config.router.verify_ssl)
        .build()
        .map_err(RunError::HttpClient)?;
    let dns_http = ReqwestClient::builder()
        .build()
        .map_err(RunError::HttpClient)?;

    let router = RateLimitedClient::new(router_http, limiter.clone())
        .with_retry_policy(config.retry_policy.clone());
    let dns = RateLimitedClient::new(dns_http, limiter)
        .with_retry_policy(config.retry_policy.clone());
    Ok((router, dns))
}

/// Builds the scheduler and its collaborators.
///
/// Excluded from coverage - reads the service account in notification mode.
#[cfg(not(tarpaulin_include))]
fn build_scheduler(config: &ValidatedConfig, health: HealthState) -> Result<AppScheduler, RunError> {
    let (router_transport, dns_transport) = build_transports(config)?;

    let router = OpnsenseClient::new(
        router_transport,
        &config.router.url,
        &config.router.key,
        &config.router.secret,
    )
    .map_err(RunError::Router)?;

    let api_base = url::Url::parse(HetznerZone::<Transport>::DEFAULT_API_BASE)
        .map_err(|e| RunError::HttpClient(HttpError::InvalidUrl(e.to_string())))?;
    let zone = HetznerZone::new(
        dns_transport,
        api_base,
        &config.dns.token,
        &config.dns.zone,
        config.dns.ttl,
    )
    .map_err(RunError::Dns)?;

    let notifier = match &config.notify {
        Some(notify) => AppNotifier::Kubernetes(
            KubernetesNotifier::in_cluster(&notify.label_selector).map_err(RunError::Notifier)?,
        ),
        None => AppNotifier::Disabled(DisabledNotifier),
    };

    let mut scheduler = Scheduler::new(router, zone, notifier, scheduler_settings(config))
        .with_health(health);

    if let Some(verify) = &config.verify {
        let verifier = Verifier::new(HickoryLookup::new(verify.timeout), &config.dns.zone)
            .with_nameservers(verify.nameservers.clone())
            .with_delay(verify.delay);
        scheduler = scheduler.with_verifier(verifier);
    }

    Ok(scheduler)
}

/// Executes the application until shutdown, or for one tick with `--once`.
///
/// # Errors
///
/// Returns an error if an adapter cannot be built, the health port cannot
/// be bound, or a single-run tick fails.
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires real
/// network endpoints and signal handling.
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    if config.dry_run {
        tracing::info!("Dry-run mode enabled - DNS changes will be logged but not applied");
    }

    let health = HealthState::new();
    let scheduler = build_scheduler(&config, health.clone())?;

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping...");
        trigger.trigger();
    });

    let server = match config.health_port {
        Some(port) => Some(spawn_health_server(port, health, shutdown.clone()).await?),
        None => None,
    };

    let result = if config.once {
        let report = scheduler.run_single(&shutdown).await;
        single_run_outcome(&report)
    } else {
        scheduler.run(&shutdown).await;
        Ok(())
    };

    if !scheduler.drain_notifier(NOTIFY_DRAIN_TIMEOUT).await {
        tracing::warn!("Exiting with Kubernetes updates still pending");
    }

    if let Some(server) = server {
        server.abort();
    }
    result
}

/// Binds the health port and serves until `shutdown` fires.
#[cfg(not(tarpaulin_include))]
async fn spawn_health_server(
    port: u16,
    health: HealthState,
    shutdown: Shutdown,
) -> Result<tokio::task::JoinHandle<()>, RunError> {
    let listener = health::bind(port)
        .await
        .map_err(|source| RunError::HealthBind { port, source })?;

    Ok(tokio::spawn(async move {
        if let Err(e) = health::serve(listener, health, shutdown).await {
            tracing::error!(error = %e, "Health server stopped");
        }
    }))
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
