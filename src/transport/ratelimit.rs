//! Sliding-window request limiter shared by all outbound API clients.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Caps the number of requests dispatched within any window of fixed length.
///
/// Cloning yields another handle to the same limiter. Callers waiting for
/// a slot are served in lock order, which tokio's mutex keeps fair.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    max_requests: usize,
    window: Duration,
    dispatched: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Default number of requests allowed per window.
    pub const DEFAULT_MAX_REQUESTS: u32 = 30;

    /// Default window length.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

    /// Creates a limiter allowing `max_requests` per `window`.
    ///
    /// # Panics
    ///
    /// Panics if `max_requests` is zero or `window` is zero.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        assert!(max_requests >= 1, "max_requests must be at least 1");
        assert!(!window.is_zero(), "window must be non-zero");
        Self {
            inner: Arc::new(Inner {
                max_requests: max_requests as usize,
                window,
                dispatched: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
            }),
        }
    }

    /// Returns the configured window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Returns the configured number of requests per window.
    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.inner.max_requests
    }

    /// Waits until a request may be dispatched and records the dispatch.
    ///
    /// A slot counts against the window from the instant this returns,
    /// whatever the outcome of the request that uses it.
    pub async fn acquire(&self) {
        let mut dispatched = self.inner.dispatched.lock().await;
        loop {
            let now = Instant::now();
            while dispatched
                .front()
                .is_some_and(|&at| now.duration_since(at) >= self.inner.window)
            {
                dispatched.pop_front();
            }

            if dispatched.len() < self.inner.max_requests {
                dispatched.push_back(now);
                return;
            }

            if let Some(&oldest) = dispatched.front() {
                let ready_at = oldest + self.inner.window;
                tracing::debug!(
                    wait_ms = ready_at.duration_since(now).as_millis(),
                    "Rate limit reached, waiting for a free slot"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_REQUESTS, Self::DEFAULT_WINDOW)
    }
}
