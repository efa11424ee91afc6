//! The Resource Cache: watch-based mirrors of cluster state.
//!
//! `typed` covers the fixed kind set; `dynamic` covers discovery-driven
//! kinds (primarily custom resources). Both publish the same `CacheEvent`
//! stream that the Change History Engine and Topology Builder subscribe
//! to, and both expose the same per-kind COW index from `index`.

pub mod dynamic;
pub mod index;
pub mod typed;

use crate::cached_object::CachedObject;
use crate::resource_ref::ResourceRef;
use serde::Serialize;

/// One cache delta, in the order the watcher observed it. Per
/// `(kind, uid)` these are serialised in arrival order; no ordering
/// guarantee holds across kinds.
#[derive(Clone, Debug)]
pub enum CacheEvent {
    Add {
        reference: ResourceRef,
        object: CachedObject,
    },
    Update {
        reference: ResourceRef,
        before: CachedObject,
        after: CachedObject,
    },
    Delete {
        reference: ResourceRef,
        object: CachedObject,
    },
}

impl CacheEvent {
    pub fn reference(&self) -> &ResourceRef {
        match self {
            CacheEvent::Add { reference, .. } => reference,
            CacheEvent::Update { reference, .. } => reference,
            CacheEvent::Delete { reference, .. } => reference,
        }
    }
}

/// Reported by both caches so `GET /health` can show per-kind counts and
/// `GET /api-resources` can show which kinds actually mirrored.
#[derive(Clone, Debug, Default, Serialize)]
pub struct KindAvailability {
    pub kind: String,
    pub namespaced: bool,
    pub watching: bool,
    pub skipped_reason: Option<String>,
    pub object_count: usize,
}

/// The channel capacity used for the internal cache->consumers fan-out.
/// Generous relative to the Event Fabric's per-subscriber 64, because this
/// is an in-process broadcast with exactly two consumers (history, topology)
/// rather than an arbitrary number of browser clients.
pub const CACHE_EVENT_CHANNEL_CAPACITY: usize = 4096;
