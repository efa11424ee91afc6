//! Cluster Client Facade: resolves credentials, owns the typed and
//! dynamic caches plus the discovery handle, and exposes the single
//! `switch_context` entry point everything else in the daemon drives
//! context changes through.

use kview_core::cache::dynamic::DynamicResourceCache;
use kview_core::cache::typed::TypedResourceCache;
use kview_core::cache::CacheEvent;
use kview_core::history::ChangeHistory;
use kview_core::resource_ref::ResourceRef;
use kview_core::topology::{ClusterStateView, TopologyBuilder};
use kview_core::CachedObject;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::event_fabric::{EventFabric, Frame, Topic};

#[derive(Debug, thiserror::Error)]
pub enum ClusterClientError {
    #[error("failed to resolve cluster credentials: {0}")]
    CredentialResolution(String),
    #[error("typed cache failed to prime: {0}")]
    TypedCache(#[from] kview_core::cache::typed::TypedCacheError),
    #[error("dynamic cache failed to prime: {0}")]
    DynamicCache(#[from] kview_core::cache::dynamic::DynamicCacheError),
}

/// One "cluster" worth of live state: the client handle plus the caches
/// built against it. Swapped out wholesale on `switch_context`.
struct ActiveCluster {
    client: Client,
    context_name: String,
    typed: Arc<TypedResourceCache>,
    dynamic: Arc<DynamicResourceCache>,
}

pub struct ClusterClientFacade {
    active: RwLock<Option<ActiveCluster>>,
    credential_path: Option<PathBuf>,
    curated_kinds: Vec<String>,
    history: Arc<ChangeHistory>,
    topology: RwLock<Option<Arc<TopologyBuilder>>>,
    fabric: Arc<EventFabric>,
    switching: AtomicBool,
}

impl ClusterClientFacade {
    pub fn new(
        credential_path: Option<PathBuf>,
        curated_kinds: Vec<String>,
        history: Arc<ChangeHistory>,
        fabric: Arc<EventFabric>,
    ) -> Arc<ClusterClientFacade> {
        Arc::new(ClusterClientFacade {
            active: RwLock::new(None),
            credential_path,
            curated_kinds,
            history,
            topology: RwLock::new(None),
            fabric,
            switching: AtomicBool::new(false),
        })
    }

    /// The topology builder needs a `ClusterStateView` over this
    /// facade's own caches, which only exist after [`Self::start`] has
    /// primed them — so it's constructed by the caller afterwards and
    /// handed back here, rather than passed into `new`.
    pub async fn attach_topology(self: &Arc<Self>, topology: Arc<TopologyBuilder>) {
        *self.topology.write().await = Some(topology);
        self.spawn_topology_wiring().await;
    }

    /// Resolution order: in-cluster token, a single user-supplied
    /// credential file, the default kubeconfig location.
    async fn build_client(&self) -> Result<(Client, String), ClusterClientError> {
        if let Ok(config) = Config::incluster() {
            let client =
                Client::try_from(config).map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
            return Ok((client, "in-cluster".to_string()));
        }

        if let Some(path) = &self.credential_path {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
            let context_name = kubeconfig
                .current_context
                .clone()
                .unwrap_or_else(|| "default".to_string());
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
            let client =
                Client::try_from(config).map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
            return Ok((client, context_name));
        }

        let kubeconfig =
            Kubeconfig::read().map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
        let context_name = kubeconfig
            .current_context
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let config = Config::infer()
            .await
            .map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
        let client = Client::try_from(config).map_err(|e| ClusterClientError::CredentialResolution(e.to_string()))?;
        Ok((client, context_name))
    }

    /// Builds the first cluster client and primes both caches. Fatal on
    /// failure — this is a bootstrap error and the process should exit.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let (client, context_name) = self.build_client().await?;
        self.install(client, context_name).await?;
        Ok(())
    }

    pub async fn context_name(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|c| c.context_name.clone())
    }

    pub async fn client(&self) -> Option<Client> {
        self.active.read().await.as_ref().map(|c| c.client.clone())
    }

    pub async fn typed(&self) -> Option<Arc<TypedResourceCache>> {
        self.active.read().await.as_ref().map(|c| c.typed.clone())
    }

    pub async fn dynamic(&self) -> Option<Arc<DynamicResourceCache>> {
        self.active.read().await.as_ref().map(|c| c.dynamic.clone())
    }

    async fn install(self: &Arc<Self>, client: Client, context_name: String) -> Result<(), ClusterClientError> {
        let (typed, _typed_rx) = TypedResourceCache::new();
        let (dynamic, _dynamic_rx) = DynamicResourceCache::new(self.curated_kinds.clone());

        typed.start(client.clone()).await?;
        dynamic.start(client.clone()).await?;

        *self.active.write().await = Some(ActiveCluster {
            client,
            context_name,
            typed,
            dynamic,
        });

        self.spawn_topology_wiring().await;
        Ok(())
    }

    /// (Re)wires the single shared invalidation channel and the two
    /// cache fan-out loops against whichever cluster is currently
    /// active. A no-op if [`Self::attach_topology`] hasn't run yet —
    /// the first `start()` during bootstrap predates it.
    async fn spawn_topology_wiring(self: &Arc<Self>) {
        let Some(topology) = self.topology.read().await.clone() else {
            return;
        };
        let Some(active) = self.active.read().await.as_ref().map(|a| (a.typed.clone(), a.dynamic.clone())) else {
            return;
        };
        let (typed, dynamic) = active;

        let (invalidate_tx, invalidate_rx) = mpsc::channel(256);
        tokio::spawn(topology.run(invalidate_rx));
        self.spawn_fanout(typed.subscribe(), "typed", invalidate_tx.clone());
        self.spawn_fanout(dynamic.subscribe(), "dynamic", invalidate_tx);
    }

    fn spawn_fanout(
        self: &Arc<Self>,
        mut rx: tokio::sync::broadcast::Receiver<CacheEvent>,
        label: &'static str,
        invalidate_tx: mpsc::Sender<CacheEvent>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let record = this.history.ingest(&event).await;
                        this.fabric
                            .publish(Topic::Change, Frame::Change(Box::new(record)))
                            .await;
                        if invalidate_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(label, skipped = n, "cache fan-out receiver lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Tears down C/D, re-resolves credentials for `context_name` (the
    /// kubeconfig must already carry that context), re-runs discovery,
    /// and rebuilds indices. Holds back `topology` emission on the Event
    /// Fabric until the new caches finish priming.
    pub async fn switch_context(self: &Arc<Self>, context_name: &str) -> anyhow::Result<()> {
        if self.switching.swap(true, Ordering::SeqCst) {
            anyhow::bail!("a context switch is already in progress");
        }
        let result = self.switch_context_inner(context_name).await;
        self.switching.store(false, Ordering::SeqCst);
        result
    }

    async fn switch_context_inner(self: &Arc<Self>, context_name: &str) -> anyhow::Result<()> {
        self.fabric
            .publish(
                Topic::ContextProgress,
                Frame::ContextProgress("tearing down current cluster state".to_string()),
            )
            .await;

        if let Some(prev) = self.active.write().await.take() {
            prev.typed.stop().await;
            prev.dynamic.stop().await;
        }

        let kubeconfig = match &self.credential_path {
            Some(path) => Kubeconfig::read_from(path)?,
            None => Kubeconfig::read()?,
        };
        let options = KubeConfigOptions {
            context: Some(context_name.to_string()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        let client = Client::try_from(config)?;

        self.fabric
            .publish(
                Topic::ContextProgress,
                Frame::ContextProgress("priming caches against new context".to_string()),
            )
            .await;

        self.install(client, context_name.to_string()).await?;

        self.fabric
            .publish(Topic::ContextProgress, Frame::ContextChanged(context_name.to_string()))
            .await;

        info!(context = context_name, "context switch complete");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterStateView for ClusterClientFacade {
    async fn all_objects(&self) -> Vec<(ResourceRef, CachedObject)> {
        let mut out = Vec::new();
        if let Some(typed) = self.typed().await {
            out.extend(typed.all_objects());
        }
        if let Some(dynamic) = self.dynamic().await {
            out.extend(dynamic.all_objects().await);
        }
        out
    }
}
