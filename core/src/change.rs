//! ChangeRecord data model. The diff engine that populates `diff` lives
//! in `history::diff`; this module is the record shape and the identifiers
//! used to query and order it.

use crate::health::HealthState;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Update,
    Delete,
}

/// One `(json_path, before, after)` triple. `before`/`after` are `None`
/// when the path did not exist on that side (added or removed field).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub json_path: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub fields: Vec<FieldDiff>,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Globally monotone across the whole history, never reused.
    pub id: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub operation: Operation,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    /// First `ownerReferences` entry whose `controller` flag is true, if any.
    pub owner: Option<String>,
    pub health_state: Option<HealthState>,
    pub diff: Option<Diff>,
    pub raw_object_version: Option<String>,
}

impl ChangeRecord {
    pub fn node_id(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}/{}", self.kind, self.name)
        } else {
            format!("{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Filter parameters for `ChangeHistory::query`.
#[derive(Clone, Debug, Default)]
pub struct ChangeQuery {
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub namespace: Option<String>,
    pub kind: Option<String>,
    pub include_routine: bool,
    pub include_raw_events: bool,
    pub limit: Option<usize>,
}
