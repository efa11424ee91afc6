//! Change History Engine: normalises cache deltas into semantic
//! `ChangeRecord`s, keeps a bounded circular buffer, and optionally
//! appends a JSON-delimited log for recall (never for authoritative
//! persistence).

pub mod diff;

use crate::cache::CacheEvent;
use crate::cached_object::CachedObject;
use crate::change::{ChangeQuery, ChangeRecord, Operation};
use crate::cluster_event::ClusterEvent;
use crate::health;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

pub const DEFAULT_CAPACITY: usize = 1000;

/// `(kind, name_suffix)` patterns treated as routine noise and excluded
/// from queries unless `include_routine` is set.
const ROUTINE_PATTERNS: &[(&str, &str)] = &[
    ("Lease", ""),
    ("Endpoints", ""),
    ("EndpointSlice", ""),
    ("ConfigMap", "-leader-election"),
    ("ConfigMap", "-lock"),
];

pub fn is_routine(kind: &str, name: &str) -> bool {
    ROUTINE_PATTERNS
        .iter()
        .any(|(k, suffix)| *k == kind && (suffix.is_empty() || name.ends_with(suffix)))
}

pub struct ChangeHistory {
    capacity: usize,
    buffer: Mutex<VecDeque<ChangeRecord>>,
    raw_events: Mutex<VecDeque<ClusterEvent>>,
    next_id: AtomicU64,
    persist_path: Option<PathBuf>,
}

impl ChangeHistory {
    pub fn new(capacity: usize, persist_path: Option<PathBuf>) -> ChangeHistory {
        ChangeHistory {
            capacity: capacity.max(1),
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            raw_events: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            persist_path,
        }
    }

    /// Normalise one cache delta into a `ChangeRecord` and append it.
    pub async fn ingest(&self, event: &CacheEvent) -> ChangeRecord {
        let reference = event.reference();
        let (operation, before, after) = match event {
            CacheEvent::Add { object, .. } => (Operation::Add, None, Some(object)),
            CacheEvent::Update { before, after, .. } => (Operation::Update, Some(before), Some(after)),
            CacheEvent::Delete { object, .. } => (Operation::Delete, Some(object), None),
        };

        let subject: &CachedObject = after.or(before).expect("at least one side present");
        let health_state = Some(health::evaluate(&reference.kind, subject));
        let owner = subject
            .controller_owner()
            .and_then(|o| o.get("name"))
            .and_then(|n| n.as_str())
            .map(|s| s.to_string());

        let diff = match (before, after) {
            (Some(b), Some(a)) => Some(diff::compute(b, a, &reference.kind)),
            _ => None,
        };

        let record = ChangeRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            timestamp: chrono::Utc::now(),
            operation,
            kind: reference.kind.clone(),
            namespace: reference.namespace.clone(),
            name: reference.name.clone(),
            owner,
            health_state,
            diff,
            raw_object_version: subject.resource_version().map(|s| s.to_string()),
        };

        self.append(record.clone()).await;
        record
    }

    async fn append(&self, record: ChangeRecord) {
        {
            let mut buf = self.buffer.lock().await;
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(record.clone());
        }
        if let Some(path) = &self.persist_path {
            if let Err(e) = append_jsonl(path, &record).await {
                warn!(error = %e, "failed to append change record to persistence log");
            }
        }
    }

    pub async fn ingest_raw_event(&self, event: ClusterEvent) {
        let mut events = self.raw_events.lock().await;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn query(&self, q: &ChangeQuery) -> (Vec<ChangeRecord>, Vec<ClusterEvent>) {
        let buf = self.buffer.lock().await;
        let mut changes: Vec<ChangeRecord> = buf
            .iter()
            .filter(|r| q.since.map(|s| r.id > s).unwrap_or(true))
            .filter(|r| q.until.map(|u| r.id <= u).unwrap_or(true))
            .filter(|r| q.namespace.as_deref().map(|ns| r.namespace == ns).unwrap_or(true))
            .filter(|r| q.kind.as_deref().map(|k| r.kind == k).unwrap_or(true))
            .filter(|r| q.include_routine || !is_routine(&r.kind, &r.name))
            .cloned()
            .collect();

        if let Some(limit) = q.limit {
            if changes.len() > limit {
                let start = changes.len() - limit;
                changes = changes.split_off(start);
            }
        }

        let raw_events = if q.include_raw_events {
            self.raw_events.lock().await.iter().cloned().collect()
        } else {
            Vec::new()
        };

        (changes, raw_events)
    }

    pub async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }
}

async fn append_jsonl(path: &PathBuf, record: &ChangeRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let mut line = serde_json::to_string(record).map_err(|e| {
        error!(error = %e, "failed to serialise change record");
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    })?;
    line.push('\n');
    file.write_all(line.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_ref::ResourceRef;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> CachedObject {
        CachedObject::from_value(v)
    }

    #[tokio::test]
    async fn ingest_assigns_monotone_ids_and_diffs() {
        let history = ChangeHistory::new(10, None);
        let r = ResourceRef::new("Deployment", "apps", "v1", "app", "web");
        let e1 = CacheEvent::Add {
            reference: r.clone(),
            object: obj(json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 3}})),
        };
        let rec1 = history.ingest(&e1).await;
        let e2 = CacheEvent::Update {
            reference: r.clone(),
            before: obj(json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 3}})),
            after: obj(json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 1}})),
        };
        let rec2 = history.ingest(&e2).await;
        assert!(rec2.id > rec1.id);
        assert_eq!(rec2.health_state, Some(crate::health::HealthState::Degraded));
        assert!(rec2.diff.is_some());
    }

    #[tokio::test]
    async fn ring_buffer_is_bounded() {
        let history = ChangeHistory::new(2, None);
        let r = ResourceRef::new("Pod", "", "v1", "app", "p");
        for i in 0..5 {
            let e = CacheEvent::Add {
                reference: r.clone(),
                object: obj(json!({"n": i})),
            };
            history.ingest(&e).await;
        }
        assert_eq!(history.len().await, 2);
    }

    #[tokio::test]
    async fn routine_changes_filtered_by_default() {
        let history = ChangeHistory::new(10, None);
        let r = ResourceRef::new("Lease", "coordination.k8s.io", "v1", "kube-system", "leader");
        history
            .ingest(&CacheEvent::Add {
                reference: r,
                object: obj(json!({})),
            })
            .await;
        let (changes, _) = history.query(&ChangeQuery::default()).await;
        assert!(changes.is_empty());
        let (changes, _) = history
            .query(&ChangeQuery {
                include_routine: true,
                ..Default::default()
            })
            .await;
        assert_eq!(changes.len(), 1);
    }
}
