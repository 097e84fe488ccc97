//! Tracked objects: live state from physics plus the last-synced snapshot.

use crate::arena::ObjectId;
use crate::metadata::MetadataDiffTracker;
use crate::types::{GroupId, LiveState, Orientation, RenderKind, SyncedState, Vec3};

/// Everything the physics collaborator supplies when it spawns a vehicle.
#[derive(Debug, Clone)]
pub struct ObjectDescriptor {
    pub render_kind: RenderKind,
    pub live: LiveState,
    pub metadata: serde_json::Value,
    /// Overrides the configured default cadence.
    pub sync_interval: Option<u32>,
}

impl ObjectDescriptor {
    pub fn new(render_kind: RenderKind, position: Vec3) -> Self {
        Self {
            render_kind,
            live: LiveState {
                position,
                ..Default::default()
            },
            metadata: serde_json::Value::Null,
            sync_interval: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.live.orientation = orientation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.live.velocity = velocity;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_sync_interval(mut self, ticks: u32) -> Self {
        self.sync_interval = Some(ticks);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    id: ObjectId,
    render_kind: RenderKind,
    /// Written by physics between ticks.
    pub live: LiveState,
    pub(crate) synced: SyncedState,
    pub(crate) ticks_since_teleport: u32,
    pub(crate) metadata: MetadataDiffTracker,
    pub(crate) group: Option<GroupId>,
    pub(crate) sync_interval: u32,
    pub(crate) last_sync_tick: Option<u64>,
    pub(crate) respawn_pending: bool,
    pub(crate) unrenderable_logged: bool,
}

impl TrackedObject {
    /// The initial snapshot is the live state itself; nothing has been sent
    /// yet, so nothing can disagree with it.
    pub(crate) fn new(id: ObjectId, descriptor: ObjectDescriptor, default_interval: u32) -> Self {
        let ObjectDescriptor {
            render_kind,
            live,
            metadata,
            sync_interval,
        } = descriptor;
        Self {
            id,
            render_kind,
            live,
            synced: SyncedState::from_live(&live),
            ticks_since_teleport: 0,
            metadata: MetadataDiffTracker::new(metadata),
            group: None,
            sync_interval: sync_interval.unwrap_or(default_interval).max(1),
            last_sync_tick: None,
            respawn_pending: false,
            unrenderable_logged: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn render_kind(&self) -> RenderKind {
        self.render_kind
    }

    pub fn synced(&self) -> &SyncedState {
        &self.synced
    }

    pub fn ticks_since_teleport(&self) -> u32 {
        self.ticks_since_teleport
    }

    pub fn metadata(&self) -> &MetadataDiffTracker {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataDiffTracker {
        &mut self.metadata
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn sync_interval(&self) -> u32 {
        self.sync_interval
    }

    pub fn set_sync_interval(&mut self, ticks: u32) {
        self.sync_interval = ticks.max(1);
    }

    /// Tick of the most recent sync pass, `None` until the first one.
    pub fn last_sync_tick(&self) -> Option<u64> {
        self.last_sync_tick
    }

    /// Due under the object's own cadence, ignoring its group.
    pub fn is_independently_due(&self, tick: u64) -> bool {
        match self.last_sync_tick {
            None => true,
            Some(last) => tick >= last.saturating_add(u64::from(self.sync_interval)),
        }
    }
}
