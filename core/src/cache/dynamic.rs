//! Dynamic Resource Cache: discovery-driven watches for kinds not in
//! the fixed set — primarily custom resources. A *curated set* (e.g.
//! package-release custom kinds) starts eagerly the same way the typed
//! cache does; any other discovered kind is served on demand behind an
//! LRU memo.

use crate::cache::index::KindIndex;
use crate::cache::{CacheEvent, KindAvailability, CACHE_EVENT_CHANNEL_CAPACITY};
use crate::cached_object::CachedObject;
use crate::resource_ref::{KindDescriptor, ResourceRef};

use futures::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::discovery::Discovery;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Client, ResourceExt};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DynamicCacheError {
    #[error("discovery failed: {0}")]
    Discovery(String),
    #[error("kind not found: {0}")]
    KindNotFound(String),
    #[error("cluster API error: {0}")]
    Api(String),
    #[error("watcher for kind {kind} failed fatally: {reason}")]
    WatcherFatal { kind: String, reason: String },
}

const ON_DEMAND_MEMO_CAPACITY: usize = 256;

pub struct DynamicResourceCache {
    client: RwLock<Option<Client>>,
    curated: Vec<String>,
    eager_indices: RwLock<HashMap<String, Arc<KindIndex>>>,
    availability: RwLock<HashMap<String, KindAvailability>>,
    discovered_kinds: RwLock<HashMap<String, (ApiResource, KindDescriptor)>>,
    on_demand_memo: Mutex<LruCache<String, CachedObject>>,
    tx: broadcast::Sender<CacheEvent>,
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl DynamicResourceCache {
    pub fn new(curated: Vec<String>) -> (Arc<DynamicResourceCache>, broadcast::Receiver<CacheEvent>) {
        let (tx, rx) = broadcast::channel(CACHE_EVENT_CHANNEL_CAPACITY);
        (
            Arc::new(DynamicResourceCache {
                client: RwLock::new(None),
                curated,
                eager_indices: RwLock::new(HashMap::new()),
                availability: RwLock::new(HashMap::new()),
                discovered_kinds: RwLock::new(HashMap::new()),
                on_demand_memo: Mutex::new(LruCache::new(
                    NonZeroUsize::new(ON_DEMAND_MEMO_CAPACITY).unwrap(),
                )),
                tx,
                cancel: CancellationToken::new(),
                handles: std::sync::Mutex::new(Vec::new()),
            }),
            rx,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }

    /// Re-runs discovery and starts eager watchers for the curated set.
    /// Called at startup and again on every context switch.
    pub async fn start(self: &Arc<Self>, client: Client) -> Result<(), DynamicCacheError> {
        *self.client.write().await = Some(client.clone());

        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(|e| DynamicCacheError::Discovery(e.to_string()))?;

        let mut discovered = HashMap::new();
        for group in discovery.groups() {
            for (ar, caps) in group.resources_by_stability() {
                let descriptor = KindDescriptor {
                    group: ar.group.clone(),
                    version: ar.version.clone(),
                    singular: ar.kind.clone(),
                    plural: ar.plural.clone(),
                    namespaced: caps.scope == kube::discovery::Scope::Namespaced,
                    verbs: caps.operations.iter().map(|v| v.to_string()).collect(),
                    is_custom: !ar.group.is_empty() && !ar.group.ends_with(".k8s.io"),
                };
                discovered.insert(ar.kind.clone(), (ar, descriptor));
            }
        }
        *self.discovered_kinds.write().await = discovered;

        // tear down any eager watchers from a previous context before
        // restarting them against the new discovery set.
        self.stop_eager().await;

        let discovered = self.discovered_kinds.read().await.clone();
        let mut primed_rx = Vec::new();
        for kind in &self.curated {
            let Some((ar, descriptor)) = discovered.get(kind) else {
                warn!(kind, "curated kind not found in discovery, skipping");
                continue;
            };
            if !descriptor.is_watchable() {
                warn!(kind, "curated kind lacks list/watch verbs, skipping");
                continue;
            }
            let (primed_tx, primed_done) = oneshot::channel();
            primed_rx.push(primed_done);
            self.start_eager_watch(client.clone(), ar.clone(), descriptor.clone(), primed_tx)
                .await;
        }

        for rx in primed_rx {
            match rx.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(DynamicCacheError::WatcherFatal {
                        kind: "unknown".into(),
                        reason: "watcher task dropped before priming".into(),
                    })
                }
            }
        }

        info!(curated = self.curated.len(), "dynamic resource cache primed");
        Ok(())
    }

    /// Spawns the eager watch for one curated kind. `primed_tx` fires once
    /// the watcher's initial list-then-watch batch has been applied, the
    /// same barrier `TypedResourceCache::start` uses so callers only see a
    /// cache that has finished its first sync.
    async fn start_eager_watch(
        &self,
        client: Client,
        ar: ApiResource,
        descriptor: KindDescriptor,
        primed_tx: oneshot::Sender<Result<(), DynamicCacheError>>,
    ) {
        let index = Arc::new(KindIndex::new(descriptor.singular.clone()));
        self.eager_indices
            .write()
            .await
            .insert(descriptor.singular.clone(), index.clone());
        self.availability.write().await.insert(
            descriptor.singular.clone(),
            KindAvailability {
                kind: descriptor.singular.clone(),
                namespaced: descriptor.namespaced,
                watching: true,
                skipped_reason: None,
                object_count: 0,
            },
        );

        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        let kind_name = descriptor.singular.clone();
        let handle = tokio::spawn(async move {
            let mut primed_tx = Some(primed_tx);
            let api: Api<DynamicObject> = Api::all_with(client, &ar);
            let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff());
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    next = stream.next() => {
                        match next {
                            Some(Ok(event)) => {
                                apply_event(event, &index, &tx, &kind_name);
                                if let Some(primed) = primed_tx.take() {
                                    let _ = primed.send(Ok(()));
                                }
                            }
                            Some(Err(e)) => warn!(kind = %kind_name, error = %e, "dynamic watch error, retrying"),
                            None => return,
                        }
                    }
                }
            }
        });
        self.handles.lock().unwrap().push(handle);
    }

    async fn stop_eager(&self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for h in handles {
            let _ = h.await;
        }
        self.eager_indices.write().await.clear();
    }

    pub async fn snapshot(&self, kind: &str) -> Option<Arc<crate::cache::index::KindIndexData>> {
        self.eager_indices.read().await.get(kind).map(|i| i.snapshot())
    }

    /// On-demand single-object fetch, memoised behind the LRU.
    pub async fn get_dynamic(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CachedObject>, DynamicCacheError> {
        let memo_key = format!("{kind}/{namespace}/{name}");
        if let Some(hit) = self.on_demand_memo.lock().await.get(&memo_key).cloned() {
            return Ok(Some(hit));
        }

        if let Some(idx) = self.eager_indices.read().await.get(kind) {
            if let Some(obj) = idx.snapshot().get(namespace, name) {
                return Ok(Some(obj.clone()));
            }
        }

        let (ar, descriptor) = self
            .discovered_kinds
            .read()
            .await
            .get(kind)
            .cloned()
            .ok_or_else(|| DynamicCacheError::KindNotFound(kind.to_string()))?;

        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or_else(|| DynamicCacheError::Api("client not initialised".into()))?;

        let api: Api<DynamicObject> = if descriptor.namespaced {
            Api::namespaced_with(client, namespace, &ar)
        } else {
            Api::all_with(client, &ar)
        };

        match api.get_opt(name).await {
            Ok(Some(obj)) => {
                let cached = CachedObject::from_dynamic(&obj).map_err(|e| DynamicCacheError::Api(e.to_string()))?;
                self.on_demand_memo.lock().await.put(memo_key, cached.clone());
                Ok(Some(cached))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DynamicCacheError::Api(e.to_string())),
        }
    }

    pub async fn list_dynamic(
        &self,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CachedObject>, DynamicCacheError> {
        if let Some(idx) = self.eager_indices.read().await.get(kind) {
            return Ok(idx.snapshot().list(namespace).into_iter().cloned().collect());
        }

        let (ar, descriptor) = self
            .discovered_kinds
            .read()
            .await
            .get(kind)
            .cloned()
            .ok_or_else(|| DynamicCacheError::KindNotFound(kind.to_string()))?;

        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or_else(|| DynamicCacheError::Api("client not initialised".into()))?;

        let api: Api<DynamicObject> = match (descriptor.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(client, ns, &ar),
            _ => Api::all_with(client, &ar),
        };

        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| DynamicCacheError::Api(e.to_string()))?;

        let mut out = Vec::with_capacity(list.items.len());
        for obj in list.items {
            out.push(CachedObject::from_dynamic(&obj).map_err(|e| DynamicCacheError::Api(e.to_string()))?);
        }
        Ok(out)
    }

    pub async fn available_kinds(&self) -> Vec<KindAvailability> {
        self.availability.read().await.values().cloned().collect()
    }

    /// The discovered `ApiResource` for a kind, if discovery has already
    /// seen it. Callers that need to build their own `Api<DynamicObject>`
    /// (write/delete handlers) resolve through this rather than
    /// re-running discovery themselves.
    pub async fn api_resource_for(&self, kind: &str) -> Option<ApiResource> {
        self.discovered_kinds.read().await.get(kind).map(|(ar, _)| ar.clone())
    }

    /// Every cached object across all eagerly-watched kinds; on-demand
    /// kinds contribute nothing here since they are never held in bulk.
    pub async fn all_objects(&self) -> Vec<(ResourceRef, CachedObject)> {
        self.eager_indices
            .read()
            .await
            .values()
            .flat_map(|idx| idx.all())
            .collect()
    }

    pub async fn stop(&self) {
        self.stop_eager().await;
    }
}

fn apply_event(event: Event<DynamicObject>, index: &Arc<KindIndex>, tx: &broadcast::Sender<CacheEvent>, kind_name: &str) {
    match event {
        Event::Restarted(objs) => {
            for obj in objs {
                apply_one(obj, index, tx, kind_name);
            }
        }
        Event::Applied(obj) => apply_one(obj, index, tx, kind_name),
        Event::Deleted(obj) => delete_one(obj, index, tx, kind_name),
    }
}

fn apply_one(obj: DynamicObject, index: &Arc<KindIndex>, tx: &broadcast::Sender<CacheEvent>, kind_name: &str) {
    let Ok(cached) = CachedObject::from_dynamic(&obj) else {
        return;
    };
    let reference = ResourceRef::new(kind_name, "", "", obj.namespace().unwrap_or_default(), obj.name_any());
    let before = index.snapshot().get(&reference.namespace, &reference.name).cloned();
    index.put(reference.clone(), cached.clone());
    let event = match before {
        Some(before) => CacheEvent::Update { reference, before, after: cached },
        None => CacheEvent::Add { reference, object: cached },
    };
    let _ = tx.send(event);
}

fn delete_one(obj: DynamicObject, index: &Arc<KindIndex>, tx: &broadcast::Sender<CacheEvent>, kind_name: &str) {
    let Ok(cached) = CachedObject::from_dynamic(&obj) else {
        return;
    };
    let reference = ResourceRef::new(kind_name, "", "", obj.namespace().unwrap_or_default(), obj.name_any());
    index.remove(&reference);
    let _ = tx.send(CacheEvent::Delete { reference, object: cached });
}
