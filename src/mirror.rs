//! `ObserverMirror` – what a well-behaved client would hold after applying
//! the message stream addressed to it.
//!
//! Applying a message the client could not have interpreted (a delta for an
//! object it was never told about, a second spawn) is an error, which makes
//! the mirror a checker for the ordering guarantees of the scheduler.

use crate::arena::ObjectId;
use crate::error::MirrorError;
use crate::protocol::{Movement, SyncMessage};
use crate::types::{FixedVec3, PackedRotation, RenderKind, Vec3};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Sub-records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MirroredObject {
    pub render_kind: RenderKind,
    pub position: FixedVec3,
    pub rotation: PackedRotation,
    /// Last received velocity, used for extrapolation between updates.
    pub velocity: Vec3,
    pub metadata: serde_json::Value,
}

impl MirroredObject {
    pub fn world_position(&self) -> Vec3 {
        self.position.to_world()
    }

    /// Dead-reckon `elapsed_ticks` beyond the last known state.
    pub fn extrapolated(&self, elapsed_ticks: f64) -> Vec3 {
        let p = self.world_position();
        Vec3::new(
            p.x + self.velocity.x * elapsed_ticks,
            p.y + self.velocity.y * elapsed_ticks,
            p.z + self.velocity.z * elapsed_ticks,
        )
    }
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ObserverMirror {
    objects: BTreeMap<ObjectId, MirroredObject>,
    spawns: u64,
    despawns: u64,
    applied: u64,
}

impl ObserverMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, message: &SyncMessage) -> Result<(), MirrorError> {
        match message {
            SyncMessage::Spawn(m) => {
                if self.objects.contains_key(&m.object_id) {
                    return Err(MirrorError::DuplicateSpawn(m.object_id));
                }
                self.objects.insert(
                    m.object_id,
                    MirroredObject {
                        render_kind: m.render_kind,
                        position: m.position,
                        rotation: m.rotation,
                        velocity: Vec3::zero(),
                        metadata: m.metadata.clone(),
                    },
                );
                self.spawns += 1;
            }
            SyncMessage::Despawn(m) => {
                self.objects
                    .remove(&m.object_id)
                    .ok_or(MirrorError::UnknownObject {
                        object: m.object_id,
                        kind: "despawn",
                    })?;
                self.despawns += 1;
            }
            SyncMessage::Movement(m) => {
                let object = self.known(m.object_id, "movement")?;
                match m.movement {
                    Movement::RelativeMove { delta } => {
                        object.position = object.position.offset(delta);
                    }
                    Movement::RelativeLook { rotation } => {
                        object.rotation = rotation;
                    }
                    Movement::RelativeMoveLook { delta, rotation } => {
                        object.position = object.position.offset(delta);
                        object.rotation = rotation;
                    }
                    Movement::Teleport { position, rotation } => {
                        object.position = position;
                        object.rotation = rotation;
                    }
                }
            }
            SyncMessage::Velocity(m) => {
                self.known(m.object_id, "velocity")?.velocity = m.velocity;
            }
            SyncMessage::Metadata(m) => {
                self.known(m.object_id, "metadata")?.metadata = m.metadata.clone();
            }
        }
        self.applied += 1;
        Ok(())
    }

    fn known(
        &mut self,
        object: ObjectId,
        kind: &'static str,
    ) -> Result<&mut MirroredObject, MirrorError> {
        self.objects
            .get_mut(&object)
            .ok_or(MirrorError::UnknownObject { object, kind })
    }

    pub fn get(&self, object: ObjectId) -> Option<&MirroredObject> {
        self.objects.get(&object)
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawns
    }

    pub fn despawn_count(&self) -> u64 {
        self.despawns
    }

    pub fn applied_count(&self) -> u64 {
        self.applied
    }
}
