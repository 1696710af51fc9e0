//! Kubernetes annotation updater.
//!
//! Points external-dns at the new addresses by patching the target
//! annotation on labelled Ingresses and Gateway API HTTPRoutes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinSet;

use crate::transport::{HttpClient, HttpRequest, ReqwestClient, bearer_auth};

use super::{ChangeEvent, Notifier, NotifyError};

/// Annotation read by external-dns.
pub const TARGET_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/target";

/// Default label selecting resources to update.
pub const DEFAULT_LABEL_SELECTOR: &str = "ginsys.net/apex-dns=true";

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const MERGE_PATCH: &str = "application/merge-patch+json";

struct ResourceKind {
    name: &'static str,
    group: &'static str,
    version: &'static str,
    plural: &'static str,
}

const KINDS: [ResourceKind; 2] = [
    ResourceKind {
        name: "Ingress",
        group: "networking.k8s.io",
        version: "v1",
        plural: "ingresses",
    },
    ResourceKind {
        name: "HTTPRoute",
        group: "gateway.networking.k8s.io",
        version: "v1",
        plural: "httproutes",
    },
];

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    items: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    annotations: Option<BTreeMap<String, String>>,
}

/// Counts of what one update pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Resources patched (or that would be, in dry-run mode).
    pub patched: usize,
    /// Resources that already carried the target.
    pub up_to_date: usize,
    /// Listings or patches that failed.
    pub failed: usize,
}

/// [`Notifier`] that updates Kubernetes resources in a background task.
///
/// Spawned updates are tracked until [`Notifier::drain`] collects them, so
/// a process can wait for them before its runtime shuts down.
pub struct KubernetesNotifier<H> {
    api: Arc<KubeApi<H>>,
    tasks: Mutex<JoinSet<()>>,
}

struct KubeApi<H> {
    client: H,
    api_base: url::Url,
    auth: http::HeaderValue,
    label_selector: String,
}

impl<H> std::fmt::Debug for KubernetesNotifier<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesNotifier")
            .field("api_base", &self.api.api_base.as_str())
            .field("label_selector", &self.api.label_selector)
            .finish_non_exhaustive()
    }
}

impl<H> KubernetesNotifier<H> {
    /// Creates a notifier talking to the API server at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InCluster`] if the token is not a valid header value.
    pub fn new(
        client: H,
        api_base: url::Url,
        token: &str,
        label_selector: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let auth = bearer_auth(token).map_err(|e| NotifyError::InCluster(e.to_string()))?;
        Ok(Self {
            api: Arc::new(KubeApi {
                client,
                api_base,
                auth,
                label_selector: label_selector.into(),
            }),
            tasks: Mutex::new(JoinSet::new()),
        })
    }
}

impl KubernetesNotifier<ReqwestClient> {
    /// Creates a notifier from the pod's service account.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InCluster`] when not running inside a cluster
    /// or the service account files cannot be read.
    #[cfg(not(tarpaulin_include))]
    pub fn in_cluster(label_selector: impl Into<String>) -> Result<Self, NotifyError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| NotifyError::InCluster("KUBERNETES_SERVICE_HOST not set".to_string()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };
        let api_base = url::Url::parse(&format!("https://{host}:{port}"))
            .map_err(|e| NotifyError::InCluster(e.to_string()))?;

        let read = |file: &str| {
            std::fs::read(format!("{SERVICE_ACCOUNT_DIR}/{file}"))
                .map_err(|e| NotifyError::InCluster(format!("{file}: {e}")))
        };
        let token = String::from_utf8(read("token")?)
            .map_err(|e| NotifyError::InCluster(format!("token: {e}")))?;
        let client = ReqwestClient::builder()
            .root_ca_pem(read("ca.crt")?)
            .build()?;

        Self::new(client, api_base, token.trim(), label_selector)
    }
}

impl<H: HttpClient> KubernetesNotifier<H> {
    /// Runs one update pass for `event` and waits for it to finish.
    pub async fn update_targets(&self, event: &ChangeEvent) -> UpdateSummary {
        self.api.update_targets(event).await
    }
}

impl<H: HttpClient + 'static> Notifier for KubernetesNotifier<H> {
    fn notify(&self, event: ChangeEvent) {
        let api = Arc::clone(&self.api);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let summary = api.update_targets(&event).await;
            tracing::debug!(
                hostname = %event.hostname,
                patched = summary.patched,
                up_to_date = summary.up_to_date,
                failed = summary.failed,
                "Kubernetes update finished"
            );
        });
    }

    async fn drain(&self, timeout: Duration) -> bool {
        let mut tasks =
            std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if tasks.is_empty() {
            return true;
        }

        let pending = tasks.len();
        tracing::debug!(pending, "Waiting for Kubernetes updates");
        let finished = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            tracing::warn!(
                abandoned = tasks.len(),
                timeout_secs = timeout.as_secs_f64(),
                "Kubernetes updates did not finish in time"
            );
            tasks.abort_all();
            return false;
        }
        true
    }
}

impl<H> KubeApi<H> {
    fn url(&self, segments: &[&str]) -> Result<url::Url, NotifyError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| NotifyError::InCluster(format!("unusable API URL {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl<H: HttpClient> KubeApi<H> {
    async fn update_targets(&self, event: &ChangeEvent) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        if event.ips.is_empty() {
            tracing::warn!(hostname = %event.hostname, "No addresses to publish, skipping Kubernetes update");
            return summary;
        }

        let target = event.joined_ips();
        tracing::info!(
            hostname = %event.hostname,
            %target,
            label_selector = %self.label_selector,
            dry_run = event.dry_run,
            "Updating Kubernetes resources"
        );

        for kind in &KINDS {
            if let Err(e) = self.update_kind(kind, &target, event.dry_run, &mut summary).await {
                tracing::warn!(kind = kind.name, error = %e, "Failed to list resources");
                summary.failed += 1;
            }
        }
        summary
    }

    async fn update_kind(
        &self,
        kind: &ResourceKind,
        target: &str,
        dry_run: bool,
        summary: &mut UpdateSummary,
    ) -> Result<(), NotifyError> {
        for resource in self.list(kind).await? {
            let Metadata {
                name,
                namespace,
                annotations,
            } = resource.metadata;
            let namespace = namespace.unwrap_or_else(|| "default".to_string());
            let current = annotations
                .as_ref()
                .and_then(|a| a.get(TARGET_ANNOTATION))
                .map(String::as_str);

            if current == Some(target) {
                tracing::debug!(kind = kind.name, %namespace, %name, "Annotation already up to date");
                summary.up_to_date += 1;
                continue;
            }

            tracing::info!(
                kind = kind.name,
                %namespace,
                %name,
                old = current.unwrap_or(""),
                new = target,
                dry_run,
                "Updating target annotation"
            );
            if dry_run {
                summary.patched += 1;
                continue;
            }

            match self.patch(kind, &namespace, &name, target).await {
                Ok(()) => summary.patched += 1,
                Err(e) => {
                    tracing::warn!(kind = kind.name, %namespace, %name, error = %e, "Failed to patch resource");
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn list(&self, kind: &ResourceKind) -> Result<Vec<Resource>, NotifyError> {
        let mut url = self.url(&["apis", kind.group, kind.version, kind.plural])?;
        url.query_pairs_mut()
            .append_pair("labelSelector", &self.label_selector);

        let request = HttpRequest::get(url)
            .with_header(http::header::AUTHORIZATION, self.auth.clone());
        let response = self.client.request(request).await?;
        if !response.is_success() {
            return Err(NotifyError::Status {
                operation: format!("listing {}", kind.plural),
                status: response.status,
            });
        }
        let list: ResourceList = response
            .json()
            .map_err(|e| NotifyError::MalformedResponse(e.to_string()))?;
        Ok(list.items)
    }

    async fn patch(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        name: &str,
        target: &str,
    ) -> Result<(), NotifyError> {
        let url = self.url(&[
            "apis",
            kind.group,
            kind.version,
            "namespaces",
            namespace,
            kind.plural,
            name,
        ])?;
        let body = json!({ "metadata": { "annotations": { TARGET_ANNOTATION: target } } });
        let request = HttpRequest::patch(url)
            .with_header(http::header::AUTHORIZATION, self.auth.clone())
            .with_json(&body, MERGE_PATCH)
            .map_err(|e| NotifyError::MalformedResponse(e.to_string()))?;

        let response = self.client.request(request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status {
                operation: format!("patching {}/{namespace}/{name}", kind.plural),
                status: response.status,
            })
        }
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod tests;
