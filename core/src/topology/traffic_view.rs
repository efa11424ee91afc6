//! Traffic view: edges follow network reachability rather than ownership
//! — ingress → service via backend references, service → pod via label
//! selector intersection, and autoscaler → target via `scaleTargetRef`.

use crate::cached_object::CachedObject;
use crate::resource_ref::ResourceRef;
use crate::topology::{EdgeRelation, TopologyEdge};
use std::collections::HashMap;

pub fn build_edges(objects: &[(ResourceRef, CachedObject)]) -> Vec<TopologyEdge> {
    let mut edges = Vec::new();
    edges.extend(ingress_to_service_edges(objects));
    edges.extend(service_to_pod_edges(objects));
    edges.extend(autoscaler_edges(objects));
    edges
}

fn ingress_to_service_edges(objects: &[(ResourceRef, CachedObject)]) -> Vec<TopologyEdge> {
    let services: HashMap<(&str, &str), &ResourceRef> = objects
        .iter()
        .filter(|(r, _)| r.kind == "Service")
        .map(|(r, _)| ((r.namespace.as_str(), r.name.as_str()), r))
        .collect();

    let mut edges = Vec::new();
    for (r, obj) in objects {
        if r.kind != "Ingress" {
            continue;
        }
        for backend_service in ingress_backend_service_names(obj) {
            if let Some(service_ref) = services.get(&(r.namespace.as_str(), backend_service.as_str())) {
                edges.push(TopologyEdge {
                    source_id: r.node_id(),
                    target_id: service_ref.node_id(),
                    relation: EdgeRelation::Routes,
                });
            }
        }
    }
    edges
}

fn ingress_backend_service_names(obj: &CachedObject) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(name) = obj.nested_str(&["spec", "defaultBackend", "service", "name"]) {
        names.push(name.to_string());
    }
    let Some(rules) = obj.nested_field(&["spec", "rules"]).and_then(|v| v.as_array()) else {
        return names;
    };
    for rule in rules {
        let Some(paths) = rule
            .get("http")
            .and_then(|h| h.get("paths"))
            .and_then(|p| p.as_array())
        else {
            continue;
        };
        for path in paths {
            if let Some(name) = path
                .get("backend")
                .and_then(|b| b.get("service"))
                .and_then(|s| s.get("name"))
                .and_then(|v| v.as_str())
            {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn service_to_pod_edges(objects: &[(ResourceRef, CachedObject)]) -> Vec<TopologyEdge> {
    let pods: Vec<(&ResourceRef, &CachedObject)> = objects
        .iter()
        .filter(|(r, _)| r.kind == "Pod")
        .map(|(r, o)| (r, o))
        .collect();

    let mut edges = Vec::new();
    for (r, obj) in objects {
        if r.kind != "Service" {
            continue;
        }
        let Some(selector) = obj
            .nested_field(&["spec", "selector"])
            .and_then(|v| v.as_object())
        else {
            continue;
        };
        if selector.is_empty() {
            continue;
        }
        for (pod_ref, pod_obj) in &pods {
            if pod_ref.namespace != r.namespace {
                continue;
            }
            if matches_selector(pod_obj, selector) {
                edges.push(TopologyEdge {
                    source_id: r.node_id(),
                    target_id: pod_ref.node_id(),
                    relation: EdgeRelation::Selects,
                });
            }
        }
    }
    edges
}

fn matches_selector(obj: &CachedObject, selector: &serde_json::Map<String, serde_json::Value>) -> bool {
    let Some(labels) = obj.labels() else {
        return false;
    };
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

fn autoscaler_edges(objects: &[(ResourceRef, CachedObject)]) -> Vec<TopologyEdge> {
    let targets: HashMap<(&str, &str, &str), &ResourceRef> = objects
        .iter()
        .map(|(r, _)| ((r.kind.as_str(), r.namespace.as_str(), r.name.as_str()), r))
        .collect();

    let mut edges = Vec::new();
    for (r, obj) in objects {
        if r.kind != "HorizontalPodAutoscaler" {
            continue;
        }
        let Some(kind) = obj.nested_str(&["spec", "scaleTargetRef", "kind"]) else {
            continue;
        };
        let Some(name) = obj.nested_str(&["spec", "scaleTargetRef", "name"]) else {
            continue;
        };
        if let Some(target_ref) = targets.get(&(kind, r.namespace.as_str(), name)) {
            edges.push(TopologyEdge {
                source_id: r.node_id(),
                target_id: target_ref.node_id(),
                relation: EdgeRelation::Scales,
            });
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_selects_matching_pod_only() {
        let service = ResourceRef::new("Service", "", "v1", "app", "web-svc");
        let service_obj = CachedObject::from_value(json!({"spec": {"selector": {"app": "web"}}}));
        let matching_pod = ResourceRef::new("Pod", "", "v1", "app", "web-1");
        let matching_obj = CachedObject::from_value(json!({"metadata": {"labels": {"app": "web"}}}));
        let other_pod = ResourceRef::new("Pod", "", "v1", "app", "db-1");
        let other_obj = CachedObject::from_value(json!({"metadata": {"labels": {"app": "db"}}}));

        let edges = build_edges(&[
            (service.clone(), service_obj),
            (matching_pod.clone(), matching_obj),
            (other_pod, other_obj),
        ]);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_id, service.node_id());
        assert_eq!(edges[0].target_id, matching_pod.node_id());
        assert_eq!(edges[0].relation, EdgeRelation::Selects);
    }

    #[test]
    fn autoscaler_scales_edge_resolves_target() {
        let hpa = ResourceRef::new("HorizontalPodAutoscaler", "autoscaling", "v2", "app", "web-hpa");
        let hpa_obj = CachedObject::from_value(json!({
            "spec": {"scaleTargetRef": {"kind": "Deployment", "name": "web"}}
        }));
        let deployment = ResourceRef::new("Deployment", "apps", "v1", "app", "web");
        let deployment_obj = CachedObject::from_value(json!({}));

        let edges = build_edges(&[(hpa.clone(), hpa_obj), (deployment.clone(), deployment_obj)]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, EdgeRelation::Scales);
        assert_eq!(edges[0].target_id, deployment.node_id());
    }
}
