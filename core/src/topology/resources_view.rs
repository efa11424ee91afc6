//! Resources view: edges follow `ownerReferences` straight down the
//! controller chain (deployment-like → replica-set → pod, cron-like →
//! job → pod), plus the `mounts` edges shared with the traffic view.

use crate::cached_object::CachedObject;
use crate::resource_ref::ResourceRef;
use crate::topology::{EdgeRelation, TopologyEdge};
use std::collections::HashMap;

/// Kinds a `ReplicaSet`/`Job`/pod's `ownerReferences` entry may point at
/// that we also hold in cache, so the owner edge can be resolved to a
/// concrete node id rather than left dangling.
const CONTROLLER_KINDS: &[&str] = &[
    "ReplicaSet",
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "Job",
    "CronJob",
];

pub fn build_edges(objects: &[(ResourceRef, CachedObject)]) -> Vec<TopologyEdge> {
    let by_name = owner_lookup(objects);
    objects
        .iter()
        .filter_map(|(r, obj)| controller_owner_edge(r, obj, &by_name))
        .collect()
}

/// `(kind, namespace, name) -> ResourceRef` index used to resolve an
/// `ownerReferences` entry to a concrete node id.
pub fn owner_lookup(objects: &[(ResourceRef, CachedObject)]) -> HashMap<(&str, &str, &str), &ResourceRef> {
    objects
        .iter()
        .map(|(r, _)| ((r.kind.as_str(), r.namespace.as_str(), r.name.as_str()), r))
        .collect()
}

/// The `owns` edge from `obj`'s controlling owner to `obj` itself, if the
/// owner is one of the known controller kinds and is present in `by_name`.
/// Shared between the resources view (every kind) and the traffic view
/// (restricted to pods) so both emit the same `owns` edges for consistency.
pub fn controller_owner_edge(
    r: &ResourceRef,
    obj: &CachedObject,
    by_name: &HashMap<(&str, &str, &str), &ResourceRef>,
) -> Option<TopologyEdge> {
    let owner = obj.controller_owner()?;
    let owner_kind = owner.get("kind").and_then(|v| v.as_str())?;
    if !CONTROLLER_KINDS.contains(&owner_kind) {
        return None;
    }
    let owner_name = owner.get("name").and_then(|v| v.as_str())?;
    let owner_ref = by_name.get(&(owner_kind, r.namespace.as_str(), owner_name))?;
    Some(TopologyEdge {
        source_id: owner_ref.node_id(),
        target_id: r.node_id(),
        relation: EdgeRelation::Owns,
    })
}

/// `configMap`/`secret`/`persistentVolumeClaim` volumes referenced by a
/// pod spec, resolved to node ids for the shared `mounts` edge set. Pods
/// that reference a volume not currently cached simply emit no edge for
/// it — edges only ever point at nodes present in the snapshot.
pub fn pod_mount_targets(reference: &ResourceRef, obj: &CachedObject) -> Vec<String> {
    let Some(volumes) = obj
        .nested_field(&["spec", "volumes"])
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };

    let mut targets = Vec::new();
    for volume in volumes {
        if let Some(name) = volume
            .get("configMap")
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str())
        {
            targets.push(format!("ConfigMap/{}/{}", reference.namespace, name));
        }
        if let Some(name) = volume
            .get("secret")
            .and_then(|v| v.get("secretName"))
            .and_then(|v| v.as_str())
        {
            targets.push(format!("Secret/{}/{}", reference.namespace, name));
        }
        if let Some(name) = volume
            .get("persistentVolumeClaim")
            .and_then(|v| v.get("claimName"))
            .and_then(|v| v.as_str())
        {
            targets.push(format!("PersistentVolumeClaim/{}/{}", reference.namespace, name));
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owns_edge_links_replicaset_to_pod() {
        let rs = ResourceRef::new("ReplicaSet", "apps", "v1", "app", "web-rs");
        let rs_obj = CachedObject::from_value(json!({}));
        let pod = ResourceRef::new("Pod", "", "v1", "app", "web-1");
        let pod_obj = CachedObject::from_value(json!({
            "metadata": {"ownerReferences": [{"kind": "ReplicaSet", "name": "web-rs", "controller": true}]}
        }));
        let edges = build_edges(&[(rs.clone(), rs_obj), (pod.clone(), pod_obj)]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_id, rs.node_id());
        assert_eq!(edges[0].target_id, pod.node_id());
        assert_eq!(edges[0].relation, EdgeRelation::Owns);
    }

    #[test]
    fn mount_targets_collect_all_volume_kinds() {
        let r = ResourceRef::new("Pod", "", "v1", "app", "web-1");
        let obj = CachedObject::from_value(json!({
            "spec": {
                "volumes": [
                    {"configMap": {"name": "app-config"}},
                    {"secret": {"secretName": "app-tls"}},
                    {"persistentVolumeClaim": {"claimName": "data"}}
                ]
            }
        }));
        let targets = pod_mount_targets(&r, &obj);
        assert_eq!(
            targets,
            vec![
                "ConfigMap/app/app-config".to_string(),
                "Secret/app/app-tls".to_string(),
                "PersistentVolumeClaim/app/data".to_string(),
            ]
        );
    }
}
