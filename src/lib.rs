//! Janet Sync
//!
//! Per-object network movement synchronisation for moving vehicles: every
//! simulation tick it decides which minimal update each observer needs so
//! clients can interpolate motion without full snapshots.
//!
//! ## Architecture
//!
//! ```text
//! SyncAgent  (agent.rs)                 ← tick loop, tokio channels
//!   └── SyncScheduler  (scheduler.rs)   ← cadence, ordering, commit
//!         ├── PositionDeltaEncoder      (encoder.rs)
//!         ├── MetadataDiffTracker       (metadata.rs)
//!         ├── VisibilitySubscriptionManager (visibility.rs)
//!         └── GroupCadenceCoordinator   (group.rs)
//! ```
//!
//! The physics collaborator writes each object's live state between ticks;
//! the scheduler owns the last-synced snapshot and is the only writer of it.

// Engine modules are always available (no server feature needed).
pub mod arena;
pub mod encoder;
pub mod error;
pub mod group;
pub mod ingress;
pub mod metadata;
pub mod mirror;
pub mod object;
pub mod protocol;
pub mod scheduler;
pub mod transport;
pub mod types;
pub mod visibility;

// Async runtime integration requires the `server` feature.
#[cfg(feature = "server")]
pub mod agent;

#[cfg(feature = "server")]
pub use agent::{MotionSource, SyncAgent, SyncAgentConfig};
#[cfg(feature = "server")]
pub use transport::ChannelTransport;

pub use arena::ObjectId;
pub use encoder::PositionDeltaEncoder;
pub use error::{MirrorError, SyncError, TransportError};
pub use group::{CoupledGroup, GroupCadenceCoordinator};
pub use ingress::CommandSender;
pub use metadata::MetadataDiffTracker;
pub use mirror::ObserverMirror;
pub use object::{ObjectDescriptor, TrackedObject};
pub use protocol::{Movement, SyncMessage};
pub use scheduler::{SyncScheduler, TickReport};
pub use transport::{MemoryTransport, Transport};
pub use types::{
    FixedVec3, GroupId, LiveState, ObserverId, Orientation, PackedRotation, RelativeDelta,
    RenderKind, SyncConfig, SyncStats, SyncedState, Vec3,
};
pub use visibility::{Observer, VisibilityDelta, VisibilitySubscriptionManager};
