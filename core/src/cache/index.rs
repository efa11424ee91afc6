//! Per-kind index with a lock-free snapshot read path: a single writer
//! (the kind's own watcher task) swaps in a fresh
//! `Arc` under a short write lock; readers take a read lock just long
//! enough to clone the `Arc`, then read the snapshot without contention.

use crate::cached_object::CachedObject;
use crate::resource_ref::ResourceRef;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Default)]
pub struct KindIndexData {
    by_namespace_name: HashMap<(String, String), CachedObject>,
    uid_to_ref: HashMap<String, ResourceRef>,
}

impl KindIndexData {
    pub fn get(&self, namespace: &str, name: &str) -> Option<&CachedObject> {
        self.by_namespace_name
            .get(&(namespace.to_string(), name.to_string()))
    }

    pub fn get_by_uid(&self, uid: &str) -> Option<&ResourceRef> {
        self.uid_to_ref.get(uid)
    }

    pub fn list(&self, namespace: Option<&str>) -> Vec<&CachedObject> {
        self.by_namespace_name
            .iter()
            .filter(|((ns, _), _)| namespace.map(|n| n == ns).unwrap_or(true))
            .map(|(_, obj)| obj)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_namespace_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace_name.is_empty()
    }
}

/// Single-writer, many-reader index for one kind.
pub struct KindIndex {
    kind: String,
    snapshot: RwLock<Arc<KindIndexData>>,
}

impl KindIndex {
    pub fn new(kind: impl Into<String>) -> KindIndex {
        KindIndex {
            kind: kind.into(),
            snapshot: RwLock::new(Arc::new(KindIndexData::default())),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All `(ResourceRef, CachedObject)` pairs currently held, reference
    /// reconstructed from this index's kind plus the `(namespace, name)`
    /// key — used by the Topology Builder to gather cluster-wide state.
    pub fn all(&self) -> Vec<(ResourceRef, CachedObject)> {
        let snap = self.snapshot();
        snap.by_namespace_name
            .iter()
            .map(|((ns, name), obj)| {
                (
                    ResourceRef::new(self.kind.clone(), "", "", ns.clone(), name.clone()),
                    obj.clone(),
                )
            })
            .collect()
    }

    /// Cheap: clones the `Arc`, not the underlying map.
    pub fn snapshot(&self) -> Arc<KindIndexData> {
        self.snapshot.read().expect("index lock poisoned").clone()
    }

    fn mutate(&self, f: impl FnOnce(&mut KindIndexData)) {
        let mut guard = self.snapshot.write().expect("index lock poisoned");
        let mut next = (**guard).clone();
        f(&mut next);
        *guard = Arc::new(next);
    }

    pub fn put(&self, reference: ResourceRef, object: CachedObject) {
        self.mutate(|data| {
            if let Some(uid) = object.uid() {
                data.uid_to_ref.insert(uid.to_string(), reference.clone());
            }
            data.by_namespace_name
                .insert((reference.namespace, reference.name), object);
        });
    }

    pub fn remove(&self, reference: &ResourceRef) {
        self.mutate(|data| {
            data.by_namespace_name
                .remove(&(reference.namespace.clone(), reference.name.clone()));
            if let Some(uid) = data
                .uid_to_ref
                .iter()
                .find(|(_, r)| *r == reference)
                .map(|(uid, _)| uid.clone())
            {
                data.uid_to_ref.remove(&uid);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_roundtrips() {
        let idx = KindIndex::new("Pod");
        let r = ResourceRef::new("Pod", "", "v1", "app", "web-1");
        let obj = CachedObject::from_value(json!({"metadata": {"uid": "u1"}}));
        idx.put(r.clone(), obj.clone());
        let snap = idx.snapshot();
        assert_eq!(snap.get("app", "web-1"), Some(&obj));
        assert_eq!(snap.get_by_uid("u1"), Some(&r));
    }

    #[test]
    fn remove_deletes_both_indices() {
        let idx = KindIndex::new("Pod");
        let r = ResourceRef::new("Pod", "", "v1", "app", "web-1");
        idx.put(r.clone(), CachedObject::from_value(json!({"metadata": {"uid": "u1"}})));
        idx.remove(&r);
        let snap = idx.snapshot();
        assert!(snap.get("app", "web-1").is_none());
        assert!(snap.get_by_uid("u1").is_none());
    }

    #[test]
    fn snapshot_is_stable_after_concurrent_write() {
        let idx = KindIndex::new("Pod");
        let r = ResourceRef::new("Pod", "", "v1", "app", "web-1");
        idx.put(r.clone(), CachedObject::from_value(json!({})));
        let snap = idx.snapshot();
        idx.put(
            ResourceRef::new("Pod", "", "v1", "app", "web-2"),
            CachedObject::from_value(json!({})),
        );
        assert_eq!(snap.len(), 1, "prior snapshot must not see later writes");
    }
}
