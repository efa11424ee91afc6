//! Topology Builder: derives a node/edge graph from cached state
//! under two view modes and rebuilds on cache invalidation, debounced.

pub mod resources_view;
pub mod traffic_view;

use crate::cache::dynamic::DynamicResourceCache;
use crate::cache::typed::TypedResourceCache;
use crate::cache::CacheEvent;
use crate::cached_object::CachedObject;
use crate::health::{self, HealthState};
use crate::resource_ref::ResourceRef;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Resources,
    Traffic,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeRelation {
    Owns,
    Selects,
    Routes,
    Mounts,
    Scales,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub health: HealthState,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub metadata_subset: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub source_id: String,
    pub target_id: String,
    pub relation: EdgeRelation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub view_mode: ViewMode,
    pub filter_namespace: Option<String>,
}

impl Topology {
    /// Invariant: every edge endpoint exists in `nodes`.
    pub fn is_well_formed(&self) -> bool {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .all(|e| ids.contains(e.source_id.as_str()) && ids.contains(e.target_id.as_str()))
    }
}

#[derive(Clone, Debug)]
pub struct TopologySnapshot {
    pub generation: u64,
    pub topology: Arc<Topology>,
}

type SubscriptionKey = (ViewMode, Option<String>);

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Gathers every cached object across both the typed and dynamic caches;
/// kept as a trait so tests can substitute a fixed fixture.
#[async_trait::async_trait]
pub trait ClusterStateView: Send + Sync {
    async fn all_objects(&self) -> Vec<(ResourceRef, CachedObject)>;
}

pub struct CombinedClusterState {
    pub typed: Arc<TypedResourceCache>,
    pub dynamic: Arc<DynamicResourceCache>,
}

#[async_trait::async_trait]
impl ClusterStateView for CombinedClusterState {
    async fn all_objects(&self) -> Vec<(ResourceRef, CachedObject)> {
        let mut out = self.typed.all_objects();
        out.extend(self.dynamic.all_objects().await);
        out
    }
}

pub struct TopologyBuilder {
    state: Arc<dyn ClusterStateView>,
    subscriptions: RwLock<HashMap<SubscriptionKey, watch::Sender<TopologySnapshot>>>,
    generation: AtomicU64,
}

impl TopologyBuilder {
    pub fn new(state: Arc<dyn ClusterStateView>) -> Arc<TopologyBuilder> {
        Arc::new(TopologyBuilder {
            state,
            subscriptions: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        })
    }

    /// Registers (or returns the existing) subscription for `(view_mode,
    /// filter_namespace)` and triggers an immediate build so the first
    /// receive is never empty.
    pub async fn subscribe(
        self: &Arc<Self>,
        view_mode: ViewMode,
        filter_namespace: Option<String>,
    ) -> watch::Receiver<TopologySnapshot> {
        let key = (view_mode, filter_namespace.clone());
        {
            let subs = self.subscriptions.read().await;
            if let Some(tx) = subs.get(&key) {
                return tx.subscribe();
            }
        }

        let initial = self.build(view_mode, filter_namespace.clone()).await;
        let (tx, rx) = watch::channel(TopologySnapshot {
            generation: self.generation.fetch_add(1, Ordering::SeqCst),
            topology: Arc::new(initial),
        });
        self.subscriptions.write().await.insert(key, tx);
        rx
    }

    /// Runs the debounce loop: consumes cache invalidations from a merged
    /// stream and rebuilds every active subscription at most once per
    /// 200 ms window (a fixed value, not configurable).
    pub async fn run(self: Arc<Self>, mut invalidations: tokio::sync::mpsc::Receiver<CacheEvent>) {
        loop {
            let Some(first) = invalidations.recv().await else {
                debug!("topology invalidation channel closed, stopping builder");
                return;
            };
            let mut _last = first;
            loop {
                match tokio::time::timeout(DEBOUNCE_WINDOW, invalidations.recv()).await {
                    Ok(Some(next)) => _last = next,
                    Ok(None) => {
                        self.rebuild_all().await;
                        return;
                    }
                    Err(_elapsed) => break,
                }
            }
            self.rebuild_all().await;
        }
    }

    async fn rebuild_all(self: &Arc<Self>) {
        let keys: Vec<SubscriptionKey> = self.subscriptions.read().await.keys().cloned().collect();
        for (view_mode, filter_namespace) in keys {
            let topology = self.build(view_mode, filter_namespace.clone()).await;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            let subs = self.subscriptions.read().await;
            if let Some(tx) = subs.get(&(view_mode, filter_namespace)) {
                let _ = tx.send(TopologySnapshot {
                    generation,
                    topology: Arc::new(topology),
                });
            }
        }
    }

    async fn build(&self, view_mode: ViewMode, filter_namespace: Option<String>) -> Topology {
        let mut objects = self.state.all_objects().await;
        if let Some(ns) = &filter_namespace {
            objects.retain(|(r, _)| r.is_cluster_scoped() || &r.namespace == ns);
        }

        let nodes: Vec<TopologyNode> = objects.iter().map(|(r, o)| to_node(r, o)).collect();
        let mut edges = match view_mode {
            ViewMode::Resources => resources_view::build_edges(&objects),
            ViewMode::Traffic => traffic_view::build_edges(&objects),
        };
        edges.extend(shared_edges(&objects));
        edges.sort_by(|a, b| {
            (a.source_id.as_str(), a.target_id.as_str())
                .cmp(&(b.source_id.as_str(), b.target_id.as_str()))
        });
        edges.dedup();

        // Only keep edges whose endpoints survived the namespace filter.
        let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        edges.retain(|e| node_ids.contains(e.source_id.as_str()) && node_ids.contains(e.target_id.as_str()));

        let mut nodes = nodes;
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        Topology {
            nodes,
            edges,
            view_mode,
            filter_namespace,
        }
    }
}

/// Edges emitted in both view modes: `mounts` from pods to config maps,
/// secrets, and PVCs, and `owns` from replica-set-like to pod for
/// consistency.
fn shared_edges(objects: &[(ResourceRef, CachedObject)]) -> Vec<TopologyEdge> {
    let by_name = resources_view::owner_lookup(objects);
    let mut edges = Vec::new();
    for (r, obj) in objects {
        if r.kind != "Pod" {
            continue;
        }
        for mount_ref in resources_view::pod_mount_targets(r, obj) {
            edges.push(TopologyEdge {
                source_id: r.node_id(),
                target_id: mount_ref,
                relation: EdgeRelation::Mounts,
            });
        }
        if let Some(edge) = resources_view::controller_owner_edge(r, obj, &by_name) {
            edges.push(edge);
        }
    }
    edges
}

fn to_node(r: &ResourceRef, obj: &CachedObject) -> TopologyNode {
    let labels = obj
        .labels()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    let annotations = obj
        .annotations()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    TopologyNode {
        id: r.node_id(),
        kind: r.kind.clone(),
        name: r.name.clone(),
        namespace: r.namespace.clone(),
        status: obj
            .nested_str(&["status", "phase"])
            .unwrap_or("")
            .to_string(),
        health: health::evaluate(&r.kind, obj),
        labels,
        annotations,
        metadata_subset: obj
            .nested_field(&["metadata"])
            .cloned()
            .unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixtureState(Vec<(ResourceRef, CachedObject)>);

    #[async_trait::async_trait]
    impl ClusterStateView for FixtureState {
        async fn all_objects(&self) -> Vec<(ResourceRef, CachedObject)> {
            self.0.clone()
        }
    }

    fn pod(ns: &str, name: &str, owner_rs: &str) -> (ResourceRef, CachedObject) {
        (
            ResourceRef::new("Pod", "", "v1", ns, name),
            CachedObject::from_value(json!({
                "metadata": {
                    "ownerReferences": [{"kind": "ReplicaSet", "name": owner_rs, "controller": true}]
                },
                "status": {"phase": "Running", "containerStatuses": [{"ready": true}]}
            })),
        )
    }

    #[tokio::test]
    async fn build_is_idempotent_and_well_formed() {
        let objects = vec![pod("a", "web-1", "web-rs")];
        let builder = TopologyBuilder::new(Arc::new(FixtureState(objects)));
        let t1 = builder.build(ViewMode::Resources, None).await;
        let t2 = builder.build(ViewMode::Resources, None).await;
        assert!(t1.is_well_formed());
        assert_eq!(t1.nodes, t2.nodes);
        assert_eq!(t1.edges, t2.edges);
    }

    #[tokio::test]
    async fn namespace_filter_drops_other_namespaces() {
        let objects = vec![pod("a", "p1", "rs"), pod("b", "p2", "rs")];
        let builder = TopologyBuilder::new(Arc::new(FixtureState(objects)));
        let t = builder.build(ViewMode::Resources, Some("a".to_string())).await;
        assert!(t.nodes.iter().all(|n| n.namespace == "a"));
    }
}
