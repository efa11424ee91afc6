//! The fixed kind set the Typed Resource Cache starts one watcher per.
//! Grouped by role for readability; the cache itself
//! just iterates the flat list.

use crate::resource_ref::KindDescriptor;

/// Returns the fixed set with `verbs` optimistically filled in as fully
/// capable (`list`, `watch`, `get`); the cluster client facade corrects
/// this per-kind against live discovery before the typed cache starts any
/// watcher — graceful degradation instead of a hard failure.
pub fn fixed_kind_set() -> Vec<KindDescriptor> {
    let full_verbs = || vec!["list".into(), "watch".into(), "get".into()];
    let mut kinds = Vec::new();
    let mut push = |group: &str, version: &str, singular: &str, plural: &str, namespaced: bool| {
        kinds.push(KindDescriptor {
            group: group.into(),
            version: version.into(),
            singular: singular.into(),
            plural: plural.into(),
            namespaced,
            verbs: full_verbs(),
            is_custom: false,
        });
    };

    // Workloads
    push("apps", "v1", "Deployment", "deployments", true);
    push("apps", "v1", "ReplicaSet", "replicasets", true);
    push("", "v1", "Pod", "pods", true);
    push("batch", "v1", "Job", "jobs", true);
    push("batch", "v1", "CronJob", "cronjobs", true);
    push("apps", "v1", "StatefulSet", "statefulsets", true);
    push("apps", "v1", "DaemonSet", "daemonsets", true);

    // Networking
    push("", "v1", "Service", "services", true);
    push("networking.k8s.io", "v1", "Ingress", "ingresses", true);

    // Configuration (secrets mirrored metadata-only, see redaction note below)
    push("", "v1", "ConfigMap", "configmaps", true);
    push("", "v1", "Secret", "secrets", true);

    // Storage
    push("", "v1", "PersistentVolumeClaim", "persistentvolumeclaims", true);

    // Scaling
    push(
        "autoscaling",
        "v2",
        "HorizontalPodAutoscaler",
        "horizontalpodautoscalers",
        true,
    );

    // Cluster
    push("", "v1", "Node", "nodes", false);
    push("", "v1", "Namespace", "namespaces", false);
    push("", "v1", "Event", "events", true);

    kinds
}

/// Kinds whose bodies are stripped down to metadata before caching.
/// `Secret` is metadata-only; this is consulted by the typed
/// watcher's normaliser before the object is stored.
pub fn is_metadata_only(kind: &str) -> bool {
    kind == "Secret"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_set_covers_every_expected_kind() {
        let kinds: Vec<_> = fixed_kind_set().into_iter().map(|k| k.singular).collect();
        for expected in [
            "Deployment",
            "ReplicaSet",
            "Pod",
            "Job",
            "CronJob",
            "Service",
            "Ingress",
            "ConfigMap",
            "Secret",
            "PersistentVolumeClaim",
            "HorizontalPodAutoscaler",
            "Node",
            "Namespace",
            "Event",
        ] {
            assert!(kinds.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn cluster_scoped_kinds_are_not_namespaced() {
        let kinds = fixed_kind_set();
        let node = kinds.iter().find(|k| k.singular == "Node").unwrap();
        assert!(!node.namespaced);
        let pod = kinds.iter().find(|k| k.singular == "Pod").unwrap();
        assert!(pod.namespaced);
    }
}
