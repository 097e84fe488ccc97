//! GroupCadenceCoordinator – lock-step sync for rigidly coupled objects.
//!
//! Members of a coupled group (e.g. the carts of one train) that were synced
//! on different ticks drift apart on the client because each one is
//! interpolated on its own schedule. If any member is due, every member is.

use crate::arena::ObjectId;
use crate::error::{Result, SyncError};
use crate::types::GroupId;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoupledGroup {
    pub id: GroupId,
    members: Vec<ObjectId>,
}

impl CoupledGroup {
    pub fn members(&self) -> &[ObjectId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct GroupCadenceCoordinator {
    groups: BTreeMap<GroupId, CoupledGroup>,
    membership: HashMap<ObjectId, GroupId>,
    next_id: u32,
}

impl GroupCadenceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_group(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.groups.insert(
            id,
            CoupledGroup {
                id,
                members: Vec::new(),
            },
        );
        debug!("Created {}", id);
        id
    }

    /// Append `object` to `group`. An object must leave its current group
    /// before it can join another.
    pub fn add_member(&mut self, group: GroupId, object: ObjectId) -> Result<()> {
        if let Some(&current) = self.membership.get(&object) {
            return Err(SyncError::AlreadyGrouped {
                object,
                group: current,
            });
        }
        let g = self
            .groups
            .get_mut(&group)
            .ok_or(SyncError::UnknownGroup(group))?;
        g.members.push(object);
        self.membership.insert(object, group);
        debug!("{} joined {}", object, group);
        Ok(())
    }

    /// Remove `object` from whatever group holds it. Empty groups are
    /// dropped from the registry.
    pub fn remove_member(&mut self, object: ObjectId) -> Option<GroupId> {
        let group = self.membership.remove(&object)?;
        if let Some(g) = self.groups.get_mut(&group) {
            g.members.retain(|m| *m != object);
            if g.members.is_empty() {
                self.groups.remove(&group);
                debug!("Dissolved empty {}", group);
            }
        }
        debug!("{} left {}", object, group);
        Some(group)
    }

    /// Remove a whole group, returning its former members.
    pub fn dissolve(&mut self, group: GroupId) -> Result<Vec<ObjectId>> {
        let g = self
            .groups
            .remove(&group)
            .ok_or(SyncError::UnknownGroup(group))?;
        for m in &g.members {
            self.membership.remove(m);
        }
        debug!("Dissolved {}", group);
        Ok(g.members)
    }

    pub fn group_of(&self, object: ObjectId) -> Option<GroupId> {
        self.membership.get(&object).copied()
    }

    pub fn group(&self, group: GroupId) -> Option<&CoupledGroup> {
        self.groups.get(&group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // -----------------------------------------------------------------------
    // Cadence
    // -----------------------------------------------------------------------

    /// Whether `object` syncs this tick, given each object's own cadence.
    pub fn is_due(&self, object: ObjectId, independently_due: impl Fn(ObjectId) -> bool) -> bool {
        match self.membership.get(&object).and_then(|g| self.groups.get(g)) {
            Some(g) => g.members.iter().any(|m| independently_due(*m)),
            None => independently_due(object),
        }
    }

    /// Extend `due` so that it contains every member of every group that
    /// has at least one member in it.
    pub fn propagate_due(&self, due: &mut BTreeSet<ObjectId>) {
        for g in self.groups.values() {
            if g.members.iter().any(|m| due.contains(m)) {
                due.extend(g.members.iter().copied());
            }
        }
    }
}
