//! VisibilitySubscriptionManager – which objects each observer can see.
//!
//! Each recomputation makes an observer's subscription set exactly the set of
//! objects within the visibility radius and reports the transitions so the
//! scheduler can emit spawns and despawns.

use crate::arena::ObjectId;
use crate::types::{ObserverId, Vec3};
use log::info;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct Observer {
    pub id: ObserverId,
    pub position: Vec3,
    subscribed: BTreeSet<ObjectId>,
}

impl Observer {
    pub fn new(id: ObserverId, position: Vec3) -> Self {
        Self {
            id,
            position,
            subscribed: BTreeSet::new(),
        }
    }

    pub fn subscribed_objects(&self) -> &BTreeSet<ObjectId> {
        &self.subscribed
    }

    pub fn is_subscribed(&self, object: ObjectId) -> bool {
        self.subscribed.contains(&object)
    }
}

/// Transitions produced by one recomputation, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    pub spawns: Vec<ObjectId>,
    pub despawns: Vec<ObjectId>,
}

impl VisibilityDelta {
    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.despawns.is_empty()
    }
}

pub struct VisibilitySubscriptionManager {
    radius_sq: f64,
    observers: BTreeMap<ObserverId, Observer>,
}

impl VisibilitySubscriptionManager {
    /// A negative radius is treated as zero.
    pub fn new(radius: f64) -> Self {
        let radius = radius.max(0.0);
        Self {
            radius_sq: radius * radius,
            observers: BTreeMap::new(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius_sq.sqrt()
    }

    // -----------------------------------------------------------------------
    // Observer management
    // -----------------------------------------------------------------------

    /// Returns `false` if the observer was already registered (its position
    /// is updated in that case).
    pub fn add_observer(&mut self, id: ObserverId, position: Vec3) -> bool {
        if let Some(existing) = self.observers.get_mut(&id) {
            existing.position = position;
            return false;
        }
        info!("{} joined at {}", id, position);
        self.observers.insert(id, Observer::new(id, position));
        true
    }

    /// Remove an observer. Its client-side state goes away with the channel,
    /// so no despawns are reported.
    pub fn remove_observer(&mut self, id: ObserverId) -> Option<Observer> {
        let removed = self.observers.remove(&id);
        if removed.is_some() {
            info!("{} left", id);
        }
        removed
    }

    pub fn set_observer_position(&mut self, id: ObserverId, position: Vec3) -> bool {
        match self.observers.get_mut(&id) {
            Some(o) => {
                o.position = position;
                true
            }
            None => false,
        }
    }

    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.observers.get(&id)
    }

    pub fn observers(&self) -> impl Iterator<Item = &Observer> {
        self.observers.values()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn is_subscribed(&self, observer: ObserverId, object: ObjectId) -> bool {
        self.observers
            .get(&observer)
            .is_some_and(|o| o.is_subscribed(object))
    }

    /// Observers currently subscribed to `object`, in ascending id order.
    pub fn subscribers_of(&self, object: ObjectId) -> Vec<ObserverId> {
        self.observers
            .values()
            .filter(|o| o.is_subscribed(object))
            .map(|o| o.id)
            .collect()
    }

    /// Forget everything `observer` was subscribed to. The next
    /// recomputation treats every visible object as newly visible.
    pub fn drop_subscriptions(&mut self, observer: ObserverId) -> Vec<ObjectId> {
        match self.observers.get_mut(&observer) {
            Some(o) => std::mem::take(&mut o.subscribed).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Remove `object` from every subscription set; returns the observers
    /// that had it.
    pub fn forget_object(&mut self, object: ObjectId) -> Vec<ObserverId> {
        self.observers
            .values_mut()
            .filter_map(|o| o.subscribed.remove(&object).then_some(o.id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Recomputation
    // -----------------------------------------------------------------------

    /// Recompute one observer's subscriptions against `objects`.
    ///
    /// Returns `None` for an unknown observer.
    pub fn update(
        &mut self,
        observer: ObserverId,
        objects: &[(ObjectId, Vec3)],
    ) -> Option<VisibilityDelta> {
        let radius_sq = self.radius_sq;
        let obs = self.observers.get_mut(&observer)?;

        let visible: BTreeSet<ObjectId> = objects
            .iter()
            .filter(|(_, pos)| obs.position.distance_squared(pos) <= radius_sq)
            .map(|(id, _)| *id)
            .collect();

        let delta = VisibilityDelta {
            spawns: visible.difference(&obs.subscribed).copied().collect(),
            despawns: obs.subscribed.difference(&visible).copied().collect(),
        };
        obs.subscribed = visible;
        Some(delta)
    }

    /// Recompute every observer. Observers with no transitions are omitted.
    pub fn update_all(&mut self, objects: &[(ObjectId, Vec3)]) -> Vec<(ObserverId, VisibilityDelta)> {
        let ids: Vec<ObserverId> = self.observers.keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.update(id, objects).map(|d| (id, d)))
            .filter(|(_, d)| !d.is_empty())
            .collect()
    }
}
