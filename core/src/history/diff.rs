//! Field-level diff restricted to the meaningful paths of a kind: spec,
//! significant status fields, labels, annotations. `managedFields` and the
//! resource-version string are excluded.

use crate::cached_object::CachedObject;
use crate::change::{Diff, FieldDiff};
use serde_json::Value;

const EXCLUDED_TOP_LEVEL_STATUS_PATHS: &[&str] = &["managedFields"];

/// Paths considered for diffing, relative to the object root. `spec`,
/// `status`, `metadata.labels`, `metadata.annotations` cover every kind in
/// the fixed set; custom resources fall back to the same set and simply
/// produce no diff entries for paths they lack.
const MEANINGFUL_ROOTS: &[&str] = &["spec", "status", "metadata"];

pub fn compute(before: &CachedObject, after: &CachedObject, kind: &str) -> Diff {
    let mut fields = Vec::new();
    for root in MEANINGFUL_ROOTS {
        let before_val = before.raw().get(root);
        let after_val = after.raw().get(root);
        walk(root, before_val, after_val, &mut fields);
    }
    let summary = summarize(kind, after, &fields);
    Diff { fields, summary }
}

fn walk(path: &str, before: Option<&Value>, after: Option<&Value>, out: &mut Vec<FieldDiff>) {
    if is_excluded(path) {
        return;
    }
    match (before, after) {
        (Some(Value::Object(b)), Some(Value::Object(a))) => {
            let mut keys: Vec<&String> = b.keys().chain(a.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                // `metadata` is only meaningful for `labels`/`annotations`;
                // skip everything else under it (uid, name, resourceVersion...).
                if path == "metadata" && key != "labels" && key != "annotations" {
                    continue;
                }
                let child_path = format!("{path}.{key}");
                walk(&child_path, b.get(key), a.get(key), out);
            }
        }
        (b, a) if b == a => {}
        (b, a) => out.push(FieldDiff {
            json_path: path.to_string(),
            before: b.cloned(),
            after: a.cloned(),
        }),
    }
}

fn is_excluded(path: &str) -> bool {
    EXCLUDED_TOP_LEVEL_STATUS_PATHS
        .iter()
        .any(|excluded| path == *excluded || path.starts_with(&format!("{excluded}.")))
        || path == "metadata.resourceVersion"
}

fn summarize(kind: &str, after: &CachedObject, fields: &[FieldDiff]) -> String {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => {
            let ready = after.nested_i64(&["status", "readyReplicas"]).unwrap_or(0);
            let desired = after.nested_i64(&["spec", "replicas"]).unwrap_or(0);
            format!("{ready}/{desired} ready")
        }
        "Pod" => {
            let phase = after.nested_str(&["status", "phase"]).unwrap_or("Unknown");
            format!("phase={phase}")
        }
        _ => fields
            .first()
            .map(|f| format!("{} changed", f.json_path))
            .unwrap_or_else(|| "no meaningful change".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_reports_status_change_and_excludes_resource_version() {
        let before = CachedObject::from_value(json!({
            "metadata": {"resourceVersion": "1", "labels": {"app": "web"}},
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 3}
        }));
        let after = CachedObject::from_value(json!({
            "metadata": {"resourceVersion": "2", "labels": {"app": "web"}},
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 1}
        }));

        let diff = compute(&before, &after, "Deployment");
        assert_eq!(diff.fields.len(), 1);
        assert_eq!(diff.fields[0].json_path, "status.readyReplicas");
        assert_eq!(diff.fields[0].before, Some(json!(3)));
        assert_eq!(diff.fields[0].after, Some(json!(1)));
        assert_eq!(diff.summary, "1/3 ready");
    }

    #[test]
    fn diff_ignores_managed_fields() {
        let before = CachedObject::from_value(json!({"metadata": {"managedFields": [{"x": 1}]}}));
        let after = CachedObject::from_value(json!({"metadata": {"managedFields": [{"x": 2}]}}));
        let diff = compute(&before, &after, "ConfigMap");
        assert!(diff.fields.is_empty());
    }

    #[test]
    fn pod_summary_quotes_phase() {
        let before = CachedObject::from_value(json!({"status": {"phase": "Pending"}}));
        let after = CachedObject::from_value(json!({"status": {"phase": "Running"}}));
        let diff = compute(&before, &after, "Pod");
        assert_eq!(diff.summary, "phase=Running");
    }
}
