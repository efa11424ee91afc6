//! Capability Prober: runs four subject-access reviews in parallel and
//! caches the result for 60s. Probe failures — API error or denial —
//! both yield `false`; capabilities fail closed.

use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use kube::api::{Api, PostParams};
use kube::Client;
use kview_core::Capabilities;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

const TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    value: Capabilities,
    fetched_at: Instant,
}

pub struct CapabilityProber {
    client_of: Box<dyn Fn() -> futures::future::BoxFuture<'static, Option<Client>> + Send + Sync>,
    cached: RwLock<Option<CacheEntry>>,
}

impl CapabilityProber {
    pub fn new<F, Fut>(client_of: F) -> Arc<CapabilityProber>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<Client>> + Send + 'static,
    {
        Arc::new(CapabilityProber {
            client_of: Box::new(move || Box::pin(client_of())),
            cached: RwLock::new(None),
        })
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Double-checked: a cache hit never takes the write lock.
    pub async fn capabilities(&self) -> Capabilities {
        if let Some(entry) = self.cached.read().await.as_ref() {
            if entry.fetched_at.elapsed() < TTL {
                return entry.value;
            }
        }

        let mut guard = self.cached.write().await;
        if let Some(entry) = guard.as_ref() {
            if entry.fetched_at.elapsed() < TTL {
                return entry.value;
            }
        }

        let value = self.probe().await;
        *guard = Some(CacheEntry {
            value,
            fetched_at: Instant::now(),
        });
        value
    }

    async fn probe(&self) -> Capabilities {
        let Some(client) = (self.client_of)().await else {
            return Capabilities::default();
        };

        let (exec, logs, port_forward, secrets) = tokio::join!(
            probe_one(client.clone(), "pods/exec", "create"),
            probe_one(client.clone(), "pods/log", "get"),
            probe_one(client.clone(), "pods/portforward", "create"),
            probe_list_secrets(client),
        );

        Capabilities {
            exec,
            logs,
            port_forward,
            secrets,
        }
    }
}

async fn probe_one(client: Client, subresource: &str, verb: &str) -> bool {
    let (resource, sub) = match subresource.split_once('/') {
        Some((r, s)) => (r, Some(s)),
        None => (subresource, None),
    };
    let review = SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                resource: Some(resource.to_string()),
                subresource: sub.map(str::to_string),
                verb: Some(verb.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };
    run_review(client, review).await
}

async fn probe_list_secrets(client: Client) -> bool {
    let review = SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                resource: Some("secrets".to_string()),
                verb: Some("list".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };
    run_review(client, review).await
}

async fn run_review(client: Client, review: SelfSubjectAccessReview) -> bool {
    let api: Api<SelfSubjectAccessReview> = Api::all(client);
    match tokio::time::timeout(Duration::from_secs(5), api.create(&PostParams::default(), &review)).await {
        Ok(Ok(result)) => result.status.map(|s| s.allowed).unwrap_or(false),
        Ok(Err(e)) => {
            warn!(error = %e, "capability probe errored, treating as denied");
            false
        }
        Err(_) => {
            warn!("capability probe timed out after 5s, treating as denied");
            false
        }
    }
}
