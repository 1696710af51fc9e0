//! Outbound HTTP plumbing shared by the router, DNS and Kubernetes adapters.
//!
//! This module provides:
//! - Request/response value types ([`HttpRequest`], [`HttpResponse`])
//! - The client abstraction ([`HttpClient`]) and its reqwest implementation
//! - Backoff configuration ([`RetryPolicy`])
//! - A shared sliding-window limiter ([`RateLimiter`])
//! - The retrying, rate-limited call path ([`ApiTransport`], [`RateLimitedClient`])

mod client;
mod error;
mod limited;
mod message;
mod ratelimit;
mod retry;


pub use client::{ClientOptions, ReqwestClient};
pub use error::{AttemptError, CallError, HttpError};
pub use limited::{ApiTransport, IsRetryable, RateLimitedClient};
pub use message::{BasicAuth, HttpClient, HttpRequest, HttpResponse, bearer_auth};
pub use ratelimit::RateLimiter;
pub use retry::RetryPolicy;
