//! Health rules: a pure function of a kind and its `CachedObject`,
//! shared by the Change History Engine (for `ChangeRecord::health_state`)
//! and the Topology Builder (for `TopologyNode::health`).

use crate::cached_object::CachedObject;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

const CRASH_REASONS: &[&str] = &["CrashLoopBackOff", "ImagePullBackOff", "ErrImagePull"];

/// Evaluate the health rule for `kind` against `obj`. `kind` is the
/// singular, capitalised kind name (`"Pod"`, `"Deployment"`, ...); kinds
/// not named in the table fall through to the "others" rule.
pub fn evaluate(kind: &str, obj: &CachedObject) -> HealthState {
    match kind {
        "Pod" => pod_health(obj),
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => replica_bearing_health(kind, obj),
        "Node" => node_health(obj),
        _ => others_health(obj),
    }
}

fn pod_health(obj: &CachedObject) -> HealthState {
    let phase = obj.nested_str(&["status", "phase"]).unwrap_or("");

    if has_crash_looping_container(obj) {
        return HealthState::Unhealthy;
    }

    match phase {
        "Running" if all_containers_ready(obj) => HealthState::Healthy,
        "Running" => HealthState::Degraded,
        "Pending" => HealthState::Degraded,
        "Failed" | "Unknown" => HealthState::Unhealthy,
        _ => HealthState::Unknown,
    }
}

fn all_containers_ready(obj: &CachedObject) -> bool {
    match obj.nested_field(&["status", "containerStatuses"]).and_then(|v| v.as_array()) {
        Some(statuses) if !statuses.is_empty() => statuses
            .iter()
            .all(|s| s.get("ready").and_then(|v| v.as_bool()).unwrap_or(false)),
        _ => false,
    }
}

fn has_crash_looping_container(obj: &CachedObject) -> bool {
    let Some(statuses) = obj
        .nested_field(&["status", "containerStatuses"])
        .and_then(|v| v.as_array())
    else {
        return false;
    };
    statuses.iter().any(|s| {
        s.get("state")
            .and_then(|st| st.get("waiting"))
            .and_then(|w| w.get("reason"))
            .and_then(|r| r.as_str())
            .map(|r| CRASH_REASONS.contains(&r))
            .unwrap_or(false)
    })
}

/// Deployment-like, StatefulSet, DaemonSet, and ReplicaSet at the top
/// level all share this rule: compare
/// ready replicas to desired replicas.
fn replica_bearing_health(kind: &str, obj: &CachedObject) -> HealthState {
    let desired = desired_replicas(kind, obj);
    let ready = obj.nested_i64(&["status", "readyReplicas"]).unwrap_or(0);
    let updated = obj.nested_i64(&["status", "updatedReplicas"]).unwrap_or(desired);

    if ready == 0 && desired > 0 {
        HealthState::Unhealthy
    } else if ready == desired && updated >= desired {
        HealthState::Healthy
    } else if (ready > 0 && ready < desired) || updated < desired {
        HealthState::Degraded
    } else {
        HealthState::Unknown
    }
}

fn desired_replicas(kind: &str, obj: &CachedObject) -> i64 {
    match kind {
        "DaemonSet" => obj
            .nested_i64(&["status", "desiredNumberScheduled"])
            .unwrap_or(0),
        _ => obj.nested_i64(&["spec", "replicas"]).unwrap_or(1),
    }
}

fn node_health(obj: &CachedObject) -> HealthState {
    let conditions = obj
        .nested_field(&["status", "conditions"])
        .and_then(|v| v.as_array());

    let condition_true = |conditions: &Vec<serde_json::Value>, ty: &str| {
        conditions
            .iter()
            .find(|c| c.get("type").and_then(|t| t.as_str()) == Some(ty))
            .and_then(|c| c.get("status"))
            .and_then(|s| s.as_str())
            == Some("True")
    };

    let Some(conditions) = conditions else {
        return HealthState::Unknown;
    };

    let cordoned = obj.nested_bool(&["spec", "unschedulable"]).unwrap_or(false);

    if condition_true(conditions, "Ready") && !cordoned {
        HealthState::Healthy
    } else if ["DiskPressure", "MemoryPressure", "PIDPressure", "NetworkUnavailable"]
        .iter()
        .any(|ty| condition_true(conditions, ty))
    {
        HealthState::Degraded
    } else {
        HealthState::Unhealthy
    }
}

fn others_health(obj: &CachedObject) -> HealthState {
    let Some(conditions) = obj
        .nested_field(&["status", "conditions"])
        .and_then(|v| v.as_array())
    else {
        return HealthState::Unknown;
    };

    let positive = conditions.iter().any(|c| {
        let ty = c.get("type").and_then(|t| t.as_str());
        let status = c.get("status").and_then(|s| s.as_str());
        matches!(ty, Some("Ready") | Some("Available")) && status == Some("True")
    });

    if positive {
        HealthState::Healthy
    } else {
        HealthState::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deployment_health_transition_matches_scenario_1() {
        let before = CachedObject::from_value(json!({
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 3, "updatedReplicas": 3}
        }));
        assert_eq!(evaluate("Deployment", &before), HealthState::Healthy);

        let after = CachedObject::from_value(json!({
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 1, "updatedReplicas": 3}
        }));
        assert_eq!(evaluate("Deployment", &after), HealthState::Degraded);
    }

    #[test]
    fn deployment_zero_ready_is_unhealthy() {
        let obj = CachedObject::from_value(json!({
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 0}
        }));
        assert_eq!(evaluate("Deployment", &obj), HealthState::Unhealthy);
    }

    #[test]
    fn pod_crash_loop_is_unhealthy_even_if_running() {
        let obj = CachedObject::from_value(json!({
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {"ready": false, "state": {"waiting": {"reason": "CrashLoopBackOff"}}}
                ]
            }
        }));
        assert_eq!(evaluate("Pod", &obj), HealthState::Unhealthy);
    }

    #[test]
    fn pod_pending_is_degraded() {
        let obj = CachedObject::from_value(json!({"status": {"phase": "Pending"}}));
        assert_eq!(evaluate("Pod", &obj), HealthState::Degraded);
    }

    #[test]
    fn node_cordoned_is_not_healthy_even_if_ready() {
        let obj = CachedObject::from_value(json!({
            "spec": {"unschedulable": true},
            "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        }));
        assert_eq!(evaluate("Node", &obj), HealthState::Unhealthy);
    }

    #[test]
    fn unknown_kind_without_conditions_is_unknown() {
        let obj = CachedObject::from_value(json!({}));
        assert_eq!(evaluate("ConfigMap", &obj), HealthState::Unknown);
    }
}
