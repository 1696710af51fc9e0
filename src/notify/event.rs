//! The event emitted to downstream collaborators.

use std::time::Duration;

use crate::dns::IpSet;

/// The trigger hostname changed (or would have, in dry-run mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Hostname whose addresses changed.
    pub hostname: String,
    /// Addresses now published for it.
    pub ips: IpSet,
    /// Whether the change was only simulated.
    pub dry_run: bool,
}

impl ChangeEvent {
    /// Comma-joined addresses in ascending order.
    #[must_use]
    pub fn joined_ips(&self) -> String {
        self.ips
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One-way sink for [`ChangeEvent`]s.
///
/// Implementations must return promptly and must not fail: they own their
/// error handling.
pub trait Notifier: Send + Sync {
    /// Hands the event over. Does not wait for it to be processed.
    fn notify(&self, event: ChangeEvent);

    /// Waits up to `timeout` for every event handed over so far to be
    /// processed. Returns `false` if work was abandoned at the deadline.
    fn drain(&self, _timeout: Duration) -> impl std::future::Future<Output = bool> + Send {
        async { true }
    }
}

/// Notifier used when downstream notification is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn notify(&self, event: ChangeEvent) {
        tracing::debug!(hostname = %event.hostname, "Notifications disabled, dropping event");
    }
}

impl<N: Notifier> Notifier for std::sync::Arc<N> {
    fn notify(&self, event: ChangeEvent) {
        (**self).notify(event);
    }

    async fn drain(&self, timeout: Duration) -> bool {
        (**self).drain(timeout).await
    }
}
