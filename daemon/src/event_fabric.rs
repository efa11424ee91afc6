//! Event Fabric: the single fan-out bus with five topics. Producers post
//! non-blockingly — a full subscriber queue drops the oldest queued frame
//! of the same topic for that subscriber rather than blocking or
//! dropping the new one, and the SSE framing means the next `topology`
//! frame is a full snapshot anyway so correctness survives the drop.

use kview_core::topology::TopologySnapshot;
use kview_core::ChangeRecord;
use kview_core::ClusterEvent;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::interval;

pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Topology,
    Change,
    RawEvent,
    ContextProgress,
    Heartbeat,
}

impl Topic {
    pub fn name(&self) -> &'static str {
        match self {
            Topic::Topology => "topology",
            Topic::Change => "change",
            Topic::RawEvent => "raw_event",
            Topic::ContextProgress => "context_progress",
            Topic::Heartbeat => "heartbeat",
        }
    }
}

#[derive(Clone)]
pub enum Frame {
    Topology(Arc<TopologySnapshot>),
    Change(Box<ChangeRecord>),
    RawEvent(Box<ClusterEvent>),
    ContextProgress(String),
    ContextChanged(String),
    Heartbeat,
}

#[derive(Serialize)]
struct HeartbeatPayload {
    ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct ContextProgressPayload<'a> {
    phase: &'a str,
}

#[derive(Serialize)]
struct ContextChangedPayload<'a> {
    context: &'a str,
}

impl Frame {
    /// The SSE `event:` name this frame is published under. Distinct
    /// from `Topic::name()` only for the two `context_progress` variants.
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::Topology(_) => "topology",
            Frame::Change(_) => "change",
            Frame::RawEvent(_) => "raw_event",
            Frame::ContextProgress(_) => "context_progress",
            Frame::ContextChanged(_) => "context_changed",
            Frame::Heartbeat => "heartbeat",
        }
    }

    pub fn data(&self) -> String {
        match self {
            Frame::Topology(snap) => serde_json::to_string(snap.topology.as_ref()).unwrap_or_default(),
            Frame::Change(record) => serde_json::to_string(record).unwrap_or_default(),
            Frame::RawEvent(event) => serde_json::to_string(event).unwrap_or_default(),
            Frame::ContextProgress(phase) => {
                serde_json::to_string(&ContextProgressPayload { phase }).unwrap_or_default()
            }
            Frame::ContextChanged(context) => {
                serde_json::to_string(&ContextChangedPayload { context }).unwrap_or_default()
            }
            Frame::Heartbeat => serde_json::to_string(&HeartbeatPayload { ts: chrono::Utc::now() }).unwrap_or_default(),
        }
    }
}

/// A subscriber's mailbox: a plain `VecDeque` behind a mutex rather than
/// a channel, so a full queue can actually evict its *front* (oldest)
/// entry — `tokio::sync::mpsc` has no such primitive, only reject-new.
struct QueueInner {
    frames: Mutex<VecDeque<Frame>>,
    notify: Notify,
    closed: AtomicBool,
}

struct Subscriber {
    id: u64,
    topic_filter: Vec<Topic>,
    queue: Arc<QueueInner>,
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.queue.closed.store(true, Ordering::Release);
        self.queue.notify.notify_waiters();
    }
}

/// The receiving half of a subscriber's mailbox. Closes (`recv` returns
/// `None`) once the matching [`Subscriber`] entry is dropped from the
/// fabric's table, e.g. via [`EventFabric::unregister`].
pub struct SubscriberReceiver {
    queue: Arc<QueueInner>,
}

impl SubscriberReceiver {
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            {
                let mut frames = self.queue.frames.lock().await;
                if let Some(frame) = frames.pop_front() {
                    return Some(frame);
                }
                if self.queue.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.queue.notify.notified().await;
        }
    }
}

pub struct Subscription {
    pub id: u64,
    pub receiver: SubscriberReceiver,
}

pub struct EventFabric {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    drops: AtomicU64,
}

impl EventFabric {
    pub fn new() -> Arc<EventFabric> {
        Arc::new(EventFabric {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            drops: AtomicU64::new(0),
        })
    }

    /// Admits a new subscriber interested in `topics`. Each subscriber
    /// holds its own bounded mailbox; registration itself is
    /// copy-on-write (the whole `Vec` is cloned-and-swapped under the
    /// write lock).
    pub async fn register(self: &Arc<Self>, topics: Vec<Topic>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::new(QueueInner {
            frames: Mutex::new(VecDeque::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        let mut subs = self.subscribers.write().await;
        let mut next: Vec<Subscriber> = subs.drain(..).collect();
        next.push(Subscriber {
            id,
            topic_filter: topics,
            queue: queue.clone(),
        });
        *subs = next;
        Subscription {
            id,
            receiver: SubscriberReceiver { queue },
        }
    }

    pub async fn unregister(&self, id: u64) {
        let mut subs = self.subscribers.write().await;
        subs.retain(|s| s.id != id);
    }

    /// Posts `frame` under `topic` to every subscriber interested in it.
    /// Never blocks: a full mailbox has its oldest frame evicted before
    /// the new one is pushed.
    pub async fn publish(&self, topic: Topic, frame: Frame) {
        let subs = self.subscribers.read().await;
        for sub in subs.iter() {
            if !sub.topic_filter.contains(&topic) {
                continue;
            }
            let mut frames = sub.queue.frames.lock().await;
            if frames.len() >= SUBSCRIBER_QUEUE_CAPACITY {
                frames.pop_front();
                self.drops.fetch_add(1, Ordering::Relaxed);
            }
            frames.push_back(frame.clone());
            drop(frames);
            sub.queue.notify.notify_waiters();
        }
    }

    pub fn dropped_frame_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Spawns the 15s-per-subscriber heartbeat loop; runs for the life of
    /// the process.
    pub fn spawn_heartbeat(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                this.publish(Topic::Heartbeat, Frame::Heartbeat).await;
            }
        });
    }
}

/// A tiny bounded replay buffer of recent `change` records, used to
/// satisfy the one-shot `?since=` backfill a reconnecting subscriber
/// issues after missing frames to a full queue.
pub struct ChangeReplayBuffer {
    records: RwLock<VecDeque<ChangeRecord>>,
    capacity: usize,
}

impl ChangeReplayBuffer {
    pub fn new(capacity: usize) -> ChangeReplayBuffer {
        ChangeReplayBuffer {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub async fn push(&self, record: ChangeRecord) {
        let mut buf = self.records.write().await;
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(record);
    }

    pub async fn since(&self, since_id: u64) -> Vec<ChangeRecord> {
        self.records.read().await.iter().filter(|r| r.id > since_id).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_only_receives_registered_topics() {
        let fabric = EventFabric::new();
        let mut sub = fabric.register(vec![Topic::Heartbeat]).await;
        fabric.publish(Topic::Change, Frame::Change(Box::new(sample_record()))).await;
        fabric.publish(Topic::Heartbeat, Frame::Heartbeat).await;
        let frame = sub.receiver.recv().await.unwrap();
        assert_eq!(frame.event_name(), "heartbeat");
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let fabric = EventFabric::new();
        let sub = fabric.register(vec![Topic::Heartbeat]).await;
        fabric.unregister(sub.id).await;
        fabric.publish(Topic::Heartbeat, Frame::Heartbeat).await;
        assert!(fabric.subscribers.read().await.is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_oldest_not_newest() {
        let fabric = EventFabric::new();
        let mut sub = fabric.register(vec![Topic::Change]).await;
        for i in 0..(SUBSCRIBER_QUEUE_CAPACITY + 1) as u64 {
            let mut record = sample_record();
            record.id = i;
            fabric.publish(Topic::Change, Frame::Change(Box::new(record))).await;
        }
        assert_eq!(fabric.dropped_frame_count(), 1);
        let first = sub.receiver.recv().await.unwrap();
        let Frame::Change(record) = first else { panic!("expected a change frame") };
        // id 0 was the oldest and should have been evicted; id 1 survives.
        assert_eq!(record.id, 1);
    }

    fn sample_record() -> ChangeRecord {
        ChangeRecord {
            id: 1,
            timestamp: chrono::Utc::now(),
            operation: kview_core::Operation::Add,
            kind: "Pod".into(),
            namespace: "app".into(),
            name: "web".into(),
            owner: None,
            health_state: None,
            diff: None,
            raw_object_version: None,
        }
    }
}
