//! ClusterEvent: a read-through projection of the cluster's native
//! event kind, passed through the HTTP surface (`/events`) and the raw
//! event topic on the Event Fabric without being cached or diffed.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ClusterEventType {
    Normal,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvolvedObjectRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    #[serde(rename = "type")]
    pub event_type: ClusterEventType,
    pub reason: String,
    pub message: String,
    pub involved_ref: InvolvedObjectRef,
    pub count: i32,
    pub first_ts: chrono::DateTime<chrono::Utc>,
    pub last_ts: chrono::DateTime<chrono::Utc>,
    pub source: String,
}
