//! MetadataDiffTracker – per-object auxiliary attribute blob with a dirty flag.
//!
//! The blob is opaque here; only whether it was touched matters.

use crate::arena::ObjectId;
use crate::protocol::{ObjectMetadata, SyncMessage};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct MetadataDiffTracker {
    current: Value,
    last_broadcast: Value,
    dirty: bool,
}

impl MetadataDiffTracker {
    /// Start from a blob that observers will receive with the spawn.
    pub fn new(initial: Value) -> Self {
        Self {
            current: initial.clone(),
            last_broadcast: initial,
            dirty: false,
        }
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    /// The blob observers already hold; carried by spawn messages.
    pub fn last_broadcast(&self) -> &Value {
        &self.last_broadcast
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set(&mut self, blob: Value) {
        self.current = blob;
        self.dirty = true;
    }

    /// Mutate the blob in place; always marks it dirty.
    pub fn update(&mut self, f: impl FnOnce(&mut Value)) {
        f(&mut self.current);
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_diff(&mut self, object_id: ObjectId) -> Option<SyncMessage> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.last_broadcast = self.current.clone();
        Some(SyncMessage::Metadata(ObjectMetadata {
            object_id,
            metadata: self.current.clone(),
        }))
    }
}
