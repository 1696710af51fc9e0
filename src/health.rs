//! Liveness and readiness endpoints.
//!
//! Readiness reflects the most recent tick: the router and the DNS
//! provider must both have answered.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

use crate::shutdown::Shutdown;

/// Outcome of the last tick, shared between the scheduler and the server.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    ready: Arc<AtomicBool>,
}

impl HealthState {
    /// Creates a state that reports not ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whether the last tick reached both upstreams.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Builds the router serving `/healthz` and `/readyz`.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<HealthState>) -> (StatusCode, &'static str) {
    if state.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Binds `0.0.0.0:<port>`.
///
/// # Errors
///
/// Returns the I/O error if the port cannot be bound.
pub async fn bind(port: u16) -> std::io::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Serves the health endpoints until `shutdown` fires.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: HealthState,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Health server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;

    type Server = tokio::task::JoinHandle<std::io::Result<()>>;

    async fn start(state: HealthState) -> (String, shutdown::ShutdownTrigger, Server) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (trigger, stop) = shutdown::channel();
        let handle = tokio::spawn(serve(listener, state, stop));
        (base, trigger, handle)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn starts_not_ready() {
        assert!(!HealthState::new().is_ready());
    }

    #[test]
    fn clones_share_readiness() {
        let state = HealthState::new();
        let shared = state.clone();
        shared.set_ready(true);
        assert!(state.is_ready());
        shared.set_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn liveness_always_succeeds() {
        let (base, trigger, handle) = start(HealthState::new()).await;

        let resp = client().get(format!("{base}/healthz")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ok");

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn readiness_follows_state() {
        let state = HealthState::new();
        let (base, trigger, handle) = start(state.clone()).await;
        let client = client();

        let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.text().await.unwrap(), "not ready");

        state.set_ready(true);
        let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ready");

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (base, trigger, handle) = start(HealthState::new()).await;

        let resp = client().get(format!("{base}/metrics")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }
}
