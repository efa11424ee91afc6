//! The object shapes the cache holds, and the `nested_field` accessor the
//! change-history diff engine and topology builder both read through.
//!
//! Custom resources arrive as arbitrary nested mappings; rather than
//! modelling every typed kind separately we keep
//! everything behind one `serde_json::Value` and expose typed-kind
//! convenience constructors on top.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use kube::Resource;
use serde_json::Value;

/// A single cached cluster object, normalised to its JSON representation.
///
/// Invariants: UID is unique and immutable for the object's
/// lifetime; `resourceVersion` is monotone per object; deletions are
/// observed exactly once by the cache that owns this object.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedObject {
    raw: Value,
}

impl CachedObject {
    pub fn from_value(raw: Value) -> CachedObject {
        CachedObject { raw }
    }

    pub fn from_typed<K>(obj: &K) -> Result<CachedObject, serde_json::Error>
    where
        K: serde::Serialize,
    {
        Ok(CachedObject {
            raw: serde_json::to_value(obj)?,
        })
    }

    pub fn from_dynamic(obj: &DynamicObject) -> Result<CachedObject, serde_json::Error> {
        Ok(CachedObject {
            raw: serde_json::to_value(obj)?,
        })
    }

    /// Strips `data`/`stringData` off a Secret before it ever enters an
    /// index, leaving only metadata and `type`. Called by the typed cache
    /// for every Secret event; a no-op on anything already metadata-only.
    pub fn redact_secret_data(mut self) -> CachedObject {
        if let Value::Object(map) = &mut self.raw {
            map.remove("data");
            map.remove("stringData");
        }
        self
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn uid(&self) -> Option<&str> {
        self.nested_str(&["metadata", "uid"])
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.nested_str(&["metadata", "resourceVersion"])
    }

    pub fn name(&self) -> Option<&str> {
        self.nested_str(&["metadata", "name"])
    }

    pub fn namespace(&self) -> Option<&str> {
        self.nested_str(&["metadata", "namespace"])
    }

    pub fn labels(&self) -> Option<&serde_json::Map<String, Value>> {
        self.raw
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(Value::as_object)
    }

    pub fn annotations(&self) -> Option<&serde_json::Map<String, Value>> {
        self.raw
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(Value::as_object)
    }

    /// The first `ownerReferences` entry whose `controller` flag is true.
    pub fn controller_owner(&self) -> Option<&Value> {
        self.raw
            .get("metadata")
            .and_then(|m| m.get("ownerReferences"))
            .and_then(Value::as_array)
            .and_then(|refs| refs.iter().find(|r| r.get("controller") == Some(&Value::Bool(true))))
    }

    /// Walk a dotted JSON path; absent at any hop yields `None` rather than
    /// an error — callers treat "absent" and "null" identically.
    pub fn nested_field(&self, path: &[&str]) -> Option<&Value> {
        let mut cur = &self.raw;
        for segment in path {
            cur = cur.get(segment)?;
        }
        Some(cur)
    }

    pub fn nested_str(&self, path: &[&str]) -> Option<&str> {
        self.nested_field(path).and_then(Value::as_str)
    }

    pub fn nested_bool(&self, path: &[&str]) -> Option<bool> {
        self.nested_field(path).and_then(Value::as_bool)
    }

    pub fn nested_i64(&self, path: &[&str]) -> Option<i64> {
        self.nested_field(path).and_then(Value::as_i64)
    }
}

/// Build the synthetic `ObjectMeta` a `kube::Api` call needs from a
/// `CachedObject`'s raw JSON — used when re-issuing update/delete calls
/// against the cluster from the HTTP surface.
pub fn object_meta_of(obj: &CachedObject) -> ObjectMeta {
    serde_json::from_value(
        obj.raw
            .get("metadata")
            .cloned()
            .unwrap_or(Value::Object(Default::default())),
    )
    .unwrap_or_default()
}

/// Minimal shape used to request the object's meta back out as a
/// `kube::Resource`-shaped value when callers need `.meta()` ergonomics.
pub fn resource_name_of<K: Resource>(obj: &K) -> String {
    obj.meta().name.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CachedObject {
        CachedObject::from_value(json!({
            "metadata": {
                "uid": "abc-123",
                "name": "web-1",
                "namespace": "app",
                "resourceVersion": "42",
                "labels": {"app": "web"},
                "ownerReferences": [
                    {"kind": "ReplicaSet", "name": "web-rs", "controller": false},
                    {"kind": "ReplicaSet", "name": "web-rs-2", "controller": true},
                ]
            },
            "status": {"readyReplicas": 3}
        }))
    }

    #[test]
    fn nested_field_reads_through_path() {
        let obj = sample();
        assert_eq!(obj.nested_i64(&["status", "readyReplicas"]), Some(3));
        assert_eq!(obj.nested_field(&["status", "missing"]), None);
        assert_eq!(obj.nested_field(&["missingTop"]), None);
    }

    #[test]
    fn controller_owner_picks_controller_flag() {
        let obj = sample();
        let owner = obj.controller_owner().unwrap();
        assert_eq!(owner.get("name").unwrap(), "web-rs-2");
    }

    #[test]
    fn basic_accessors() {
        let obj = sample();
        assert_eq!(obj.uid(), Some("abc-123"));
        assert_eq!(obj.name(), Some("web-1"));
        assert_eq!(obj.namespace(), Some("app"));
        assert_eq!(obj.resource_version(), Some("42"));
    }
}
