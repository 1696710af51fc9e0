//! Cooperative cancellation shared by the scheduler, the applier and the
//! health server.
//!
//! A stop request takes effect at the next suspension point that checks
//! it. Nothing checks it in the middle of a provider write.

use std::time::Duration;

use tokio::sync::watch;

use crate::time::Sleeper;

/// Sending half: requests a stop.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half: observes a stop request. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Creates a connected trigger/observer pair.
#[must_use]
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Requests a stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// An observer that is never triggered.
    #[must_use]
    pub fn never() -> Self {
        channel().1
    }

    /// Returns true once a stop has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when a stop is requested.
    ///
    /// Never completes if the trigger is dropped without firing.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleeps for `duration` unless a stop is requested first.
    ///
    /// Returns `true` if the sleep was cut short by a stop request.
    pub async fn sleep<S: Sleeper>(&self, sleeper: &S, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        tokio::select! {
            biased;
            () = self.wait() => true,
            () = sleeper.sleep(duration) => false,
        }
    }
}
