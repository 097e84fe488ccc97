//! Error types for the sync engine.

use crate::arena::ObjectId;
use crate::types::{GroupId, ObserverId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("unknown observer {0}")]
    UnknownObserver(ObserverId),

    #[error("{object} already belongs to {group}")]
    AlreadyGrouped { object: ObjectId, group: GroupId },

    #[error("{0} listed more than once in a group")]
    DuplicateMember(ObjectId),

    #[error("a coupled group needs at least one member")]
    EmptyGroup,

    /// The physics collaborator handed over a NaN or infinite value.
    #[error("{object} has a non-finite live state")]
    InvalidLiveState { object: ObjectId },
}

/// Per-observer send failure. Never fatal to a tick.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} is disconnected")]
    Disconnected(ObserverId),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message stream that a client could not have applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MirrorError {
    #[error("{kind} for {object} which was never spawned")]
    UnknownObject { object: ObjectId, kind: &'static str },

    #[error("{0} spawned twice without a despawn")]
    DuplicateSpawn(ObjectId),
}

pub type Result<T> = std::result::Result<T, SyncError>;
