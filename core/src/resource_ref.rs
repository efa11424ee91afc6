//! Resource identity: the `(kind, group, version, namespace, name)` tuple
//! used to key every cache lookup, change record, and topology node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a single object in the cluster. `namespace` is empty for
/// cluster-scoped kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub group: String,
    pub version: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(
        kind: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> ResourceRef {
        ResourceRef {
            kind: kind.into(),
            group: group.into(),
            version: version.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The `kind/namespace/name` identifier used as `TopologyNode::id`.
    pub fn node_id(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}/{}", self.kind, self.name)
        } else {
            format!("{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_id())
    }
}

/// Describes a kind as discovered from the cluster's API discovery
/// documents (or statically, for the fixed kind set).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDescriptor {
    pub group: String,
    pub version: String,
    pub singular: String,
    pub plural: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
    pub is_custom: bool,
}

impl KindDescriptor {
    pub fn has_verb(&self, verb: &str) -> bool {
        self.verbs.iter().any(|v| v == verb)
    }

    /// A kind is mirrorable only if it supports both `list` and `watch`.
    pub fn is_watchable(&self) -> bool {
        self.has_verb("list") && self.has_verb("watch")
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_omits_namespace_for_cluster_scoped() {
        let r = ResourceRef::new("Node", "", "v1", "", "worker-1");
        assert_eq!(r.node_id(), "Node/worker-1");
    }

    #[test]
    fn node_id_includes_namespace() {
        let r = ResourceRef::new("Pod", "", "v1", "app", "web-abc123");
        assert_eq!(r.node_id(), "Pod/app/web-abc123");
    }

    #[test]
    fn watchable_requires_list_and_watch() {
        let mut d = KindDescriptor {
            group: String::new(),
            version: "v1".into(),
            singular: "pod".into(),
            plural: "pods".into(),
            namespaced: true,
            verbs: vec!["list".into(), "get".into()],
            is_custom: false,
        };
        assert!(!d.is_watchable());
        d.verbs.push("watch".into());
        assert!(d.is_watchable());
    }
}
