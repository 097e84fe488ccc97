//! `sync.*` wire protocol.
//!
//! This module owns **every message that crosses the transport boundary**
//! between the sync engine and an observer. The concrete byte layout belongs
//! to the transport; here the messages are a closed tagged union.
//!
//! ## Design rules
//!
//! 1. Every type is `Serialize + Deserialize` with snake_case tags.
//! 2. Positions and rotations travel in wire resolution ([`FixedVec3`],
//!    [`PackedRotation`]), never as raw floats.
//! 3. A `Spawn` for an object always precedes any other message for that
//!    object on the same observer channel, and nothing follows a `Despawn`
//!    until the next `Spawn`.

use crate::arena::ObjectId;
use crate::types::{FixedVec3, PackedRotation, RelativeDelta, RenderKind, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Every outbound message is wrapped in this envelope by framed transports.
///
/// The `session` field lets multiplexed clients distinguish worlds.
/// The `frame` field is the scheduler tick that produced the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent<T> {
    pub session: String,
    pub frame: u64,
    pub payload: T,
}

impl<T> SyncEvent<T> {
    pub fn new(session: impl Into<String>, frame: u64, payload: T) -> Self {
        Self {
            session: session.into(),
            frame,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Object lifecycle
// ---------------------------------------------------------------------------

/// An object became visible to the receiving observer.
///
/// Position and rotation are the last-synced values; later relative moves
/// are deltas from exactly these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpawned {
    pub object_id: ObjectId,
    pub render_kind: RenderKind,
    pub position: FixedVec3,
    pub rotation: PackedRotation,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// The object left the observer's view or was destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRemoved {
    pub object_id: ObjectId,
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Smallest sufficient encoding of one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Movement {
    RelativeMove {
        delta: RelativeDelta,
    },
    /// Carries the new absolute rotation; "relative" refers to position.
    RelativeLook {
        rotation: PackedRotation,
    },
    RelativeMoveLook {
        delta: RelativeDelta,
        rotation: PackedRotation,
    },
    Teleport {
        position: FixedVec3,
        rotation: PackedRotation,
    },
}

impl Movement {
    pub fn is_teleport(&self) -> bool {
        matches!(self, Movement::Teleport { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMovement {
    pub object_id: ObjectId,
    pub movement: Movement,
}

/// Velocity hint for client-side extrapolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectVelocity {
    pub object_id: ObjectId,
    pub velocity: Vec3,
}

/// Auxiliary attributes changed; `metadata` is the full current blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub object_id: ObjectId,
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Tagged union
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    Spawn(ObjectSpawned),
    Despawn(ObjectRemoved),
    Movement(ObjectMovement),
    Velocity(ObjectVelocity),
    Metadata(ObjectMetadata),
}

impl SyncMessage {
    pub fn object_id(&self) -> ObjectId {
        match self {
            SyncMessage::Spawn(m) => m.object_id,
            SyncMessage::Despawn(m) => m.object_id,
            SyncMessage::Movement(m) => m.object_id,
            SyncMessage::Velocity(m) => m.object_id,
            SyncMessage::Metadata(m) => m.object_id,
        }
    }

    /// Bus subject this message is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            SyncMessage::Spawn(_) => subjects::OBJECT_SPAWNED,
            SyncMessage::Despawn(_) => subjects::OBJECT_REMOVED,
            SyncMessage::Movement(_) => subjects::OBJECT_MOVEMENT,
            SyncMessage::Velocity(_) => subjects::OBJECT_VELOCITY,
            SyncMessage::Metadata(_) => subjects::OBJECT_METADATA,
        }
    }
}

// ---------------------------------------------------------------------------
// Observer session commands (network side → simulation thread)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ObserverCommand {
    Join { id: u64, x: f64, y: f64, z: f64 },
    Leave { id: u64 },
    Move { id: u64, x: f64, y: f64, z: f64 },
}

impl ObserverCommand {
    pub fn subject(&self) -> &'static str {
        match self {
            ObserverCommand::Join { .. } => subjects::mgmt::OBSERVER_JOIN,
            ObserverCommand::Leave { .. } => subjects::mgmt::OBSERVER_LEAVE,
            ObserverCommand::Move { .. } => subjects::mgmt::OBSERVER_MOVE,
        }
    }
}

// ---------------------------------------------------------------------------
// Subject helpers
// ---------------------------------------------------------------------------

/// All bus subjects used by the sync protocol, as constants.
pub mod subjects {
    pub const OBJECT_SPAWNED: &str = "sync.object.spawned";
    pub const OBJECT_REMOVED: &str = "sync.object.removed";
    pub const OBJECT_MOVEMENT: &str = "sync.object.movement";
    pub const OBJECT_VELOCITY: &str = "sync.object.velocity";
    pub const OBJECT_METADATA: &str = "sync.object.metadata";

    /// Session management commands (network side → sync engine).
    pub mod mgmt {
        pub const OBSERVER_JOIN: &str = "sync.observer.join";
        pub const OBSERVER_LEAVE: &str = "sync.observer.leave";
        pub const OBSERVER_MOVE: &str = "sync.observer.move";
    }
}
