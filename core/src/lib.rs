//! Domain library for the cluster mirror: resource model, the typed and
//! dynamic resource caches, the change-history engine, and the topology
//! builder. No HTTP, no sessions — those live in the `kviewd` daemon crate
//! that wraps this one.

pub mod cache;
pub mod cached_object;
pub mod capabilities;
pub mod change;
pub mod cluster_event;
pub mod health;
pub mod history;
pub mod kinds;
pub mod resource_ref;
pub mod session;
pub mod topology;

pub use cached_object::CachedObject;
pub use capabilities::{Capabilities, Capability};
pub use change::{ChangeRecord, Operation};
pub use cluster_event::ClusterEvent;
pub use health::HealthState;
pub use resource_ref::{KindDescriptor, ResourceRef};
pub use session::{Session, SessionKind, SessionState};
pub use topology::{Topology, TopologyEdge, TopologyNode, ViewMode};
