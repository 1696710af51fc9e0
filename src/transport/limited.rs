//! Rate-limited, retrying transport used by the router and DNS adapters.

use crate::time::{Sleeper, TokioSleeper};

use super::{
    AttemptError, CallError, HttpClient, HttpError, HttpRequest, HttpResponse, RateLimiter,
    RetryPolicy,
};

/// Sends API requests with rate limiting and retries applied.
///
/// A successful call resolves to a 2xx response. Everything else is a
/// [`CallError`].
pub trait ApiTransport: Send + Sync {
    /// Sends `req`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Rejected`] on a non-retryable failure and
    /// [`CallError::MaxRetriesExceeded`] when every attempt failed.
    fn call(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, CallError>> + Send;
}

/// [`ApiTransport`] over an [`HttpClient`].
///
/// Every attempt, first or retry, takes one slot from the shared
/// [`RateLimiter`] before it is dispatched.
///
/// # Type Parameters
///
/// - `H`: The HTTP client implementation
/// - `S`: The sleeper used for backoff delays (defaults to [`TokioSleeper`])
#[derive(Debug, Clone)]
pub struct RateLimitedClient<H, S = TokioSleeper> {
    client: H,
    limiter: RateLimiter,
    policy: RetryPolicy,
    sleeper: S,
}

impl<H> RateLimitedClient<H, TokioSleeper> {
    /// Creates a transport with the default retry policy.
    #[must_use]
    pub fn new(client: H, limiter: RateLimiter) -> Self {
        Self {
            client,
            limiter,
            policy: RetryPolicy::default(),
            sleeper: TokioSleeper,
        }
    }
}

impl<H, S> RateLimitedClient<H, S> {
    /// Sets a custom sleeper for backoff delays.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> RateLimitedClient<H, S2> {
        RateLimitedClient {
            client: self.client,
            limiter: self.limiter,
            policy: self.policy,
            sleeper,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the shared limiter.
    #[must_use]
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl<H: HttpClient, S: Sleeper> RateLimitedClient<H, S> {
    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, AttemptError> {
        self.limiter.acquire().await;
        let response = self.client.request(request.clone()).await?;

        if response.is_success() {
            return Ok(response);
        }

        Err(AttemptError::NonSuccessStatus {
            status: response.status,
            body: response.body_text().map(ToString::to_string),
        })
    }
}

impl<H: HttpClient, S: Sleeper> ApiTransport for RateLimitedClient<H, S> {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, CallError> {
        let mut attempt = 1;
        loop {
            let error = match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(CallError::Rejected(e)),
                Err(e) => e,
            };

            if !self.policy.should_retry(attempt) {
                return Err(CallError::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.policy.backoff(attempt - 1);
            tracing::warn!(
                method = %request.method,
                path = request.url.path(),
                attempt,
                delay_ms = delay.as_millis(),
                error = %error,
                "API request failed, retrying"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Extension trait for checking if an error is retryable.
pub trait IsRetryable {
    /// Returns true if the error is potentially transient and should be retried.
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::InvalidUrl(_) | Self::Setup(_) => false,
        }
    }
}

impl IsRetryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retryable(),
            Self::NonSuccessStatus { status, .. } => {
                status.is_server_error() || *status == http::StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}
