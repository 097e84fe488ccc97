//! SyncScheduler – once per simulation tick, decides which objects sync,
//! recomputes observer visibility, and delivers the resulting messages.
//!
//! ## Per-tick order
//!
//! ```text
//!  validate live state            (non-finite → error, nothing mutated)
//!  drain observer commands
//!  ticks_since_teleport += 1      (every object)
//!  due set                        (own cadence ∪ group lock-step)
//!  pending respawns               (despawn + spawn to current subscribers)
//!  visibility → spawns
//!  per object: velocity, and if due movement + metadata → subscribers
//!  visibility → despawns
//!  drop subscriptions of observers whose send failed
//! ```

use crate::arena::{ObjectArena, ObjectId};
use crate::encoder::PositionDeltaEncoder;
use crate::error::{Result, SyncError};
use crate::group::{CoupledGroup, GroupCadenceCoordinator};
use crate::ingress::{CommandQueue, CommandSender};
use crate::object::{ObjectDescriptor, TrackedObject};
use crate::protocol::{
    ObjectMovement, ObjectRemoved, ObjectSpawned, ObjectVelocity, ObserverCommand, SyncMessage,
};
use crate::transport::Transport;
use crate::types::{
    FixedVec3, GroupId, LiveState, ObserverId, SyncConfig, SyncStats, SyncedState, Vec3,
};
use crate::visibility::{Observer, VisibilitySubscriptionManager};
use log::{debug, warn};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// Summary of a single [`SyncScheduler::tick`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick number that produced this report.
    pub tick: u64,
    /// Objects that received a position/orientation sync pass.
    pub synced_objects: usize,
    /// Spawn messages delivered (respawns included).
    pub spawns: usize,
    /// Despawn messages delivered for objects leaving view.
    pub despawns: usize,
    /// Every message delivered, of any kind.
    pub messages: usize,
    /// Observers whose channel failed; their subscriptions were dropped.
    pub failed_observers: Vec<ObserverId>,
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Delivers messages for one tick. Once a send to an observer fails,
/// nothing more is sent to it until the next tick.
struct Outbox<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    failed: BTreeSet<ObserverId>,
    delivered: usize,
}

impl<'a, T: Transport + ?Sized> Outbox<'a, T> {
    fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            failed: BTreeSet::new(),
            delivered: 0,
        }
    }

    fn send(&mut self, observer: ObserverId, message: &SyncMessage) -> bool {
        if self.failed.contains(&observer) {
            return false;
        }
        match self.transport.send(observer, message) {
            Ok(()) => {
                self.delivered += 1;
                true
            }
            Err(e) => {
                warn!("Send of {} to {} failed: {}", message.subject(), observer, e);
                self.failed.insert(observer);
                false
            }
        }
    }

    /// Spawn followed, if the object is moving, by its velocity.
    fn spawn(&mut self, observer: ObserverId, object: &mut TrackedObject) -> bool {
        if !object.render_kind().is_renderable() {
            if !object.unrenderable_logged {
                warn!("{} has no supported render kind; not spawning it", object.id());
                object.unrenderable_logged = true;
            }
            return false;
        }
        if !self.send(observer, &spawn_message(object)) {
            return false;
        }
        if !object.synced.velocity.is_zero() {
            self.send(
                observer,
                &SyncMessage::Velocity(ObjectVelocity {
                    object_id: object.id(),
                    velocity: object.synced.velocity,
                }),
            );
        }
        true
    }
}

fn spawn_message(object: &TrackedObject) -> SyncMessage {
    SyncMessage::Spawn(ObjectSpawned {
        object_id: object.id(),
        render_kind: object.render_kind(),
        position: object.synced.position,
        rotation: object.synced.rotation,
        metadata: object.metadata.last_broadcast().clone(),
    })
}

fn despawn_message(object_id: ObjectId) -> SyncMessage {
    SyncMessage::Despawn(ObjectRemoved { object_id })
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct SyncScheduler {
    config: SyncConfig,
    encoder: PositionDeltaEncoder,
    visibility: VisibilitySubscriptionManager,
    groups: GroupCadenceCoordinator,
    objects: ObjectArena<TrackedObject>,
    commands: CommandQueue,
    tick: u64,
    messages_sent: u64,
    send_failures: u64,
}

impl SyncScheduler {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            encoder: PositionDeltaEncoder::new(&config),
            visibility: VisibilitySubscriptionManager::new(config.visibility_radius),
            groups: GroupCadenceCoordinator::new(),
            objects: ObjectArena::new(),
            commands: CommandQueue::new(),
            tick: 0,
            messages_sent: 0,
            send_failures: 0,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Number of the last completed tick (0 before the first).
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    // -----------------------------------------------------------------------
    // Object lifecycle
    // -----------------------------------------------------------------------

    /// Start tracking a new object. Observers learn about it on the next
    /// tick's visibility pass.
    pub fn spawn_object(&mut self, descriptor: ObjectDescriptor) -> ObjectId {
        let interval = self.config.default_sync_interval;
        let id = self
            .objects
            .insert_with(|id| TrackedObject::new(id, descriptor, interval));
        debug!("Tracking {}", id);
        id
    }

    /// Stop tracking an object, despawning it for every subscriber now.
    pub fn destroy_object<T: Transport + ?Sized>(
        &mut self,
        id: ObjectId,
        transport: &mut T,
    ) -> Result<TrackedObject> {
        let object = self.objects.remove(id).ok_or(SyncError::UnknownObject(id))?;
        self.groups.remove_member(id);

        let subscribers = self.visibility.forget_object(id);
        if object.render_kind().is_renderable() {
            let mut out = Outbox::new(transport);
            for observer in subscribers {
                out.send(observer, &despawn_message(id));
            }
            self.absorb(out);
        }
        debug!("Stopped tracking {}", id);
        Ok(object)
    }

    pub fn object(&self, id: ObjectId) -> Option<&TrackedObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut TrackedObject> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &TrackedObject)> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Physics hook: overwrite an object's live state.
    pub fn set_live(&mut self, id: ObjectId, live: LiveState) -> Result<()> {
        let object = self.objects.get_mut(id).ok_or(SyncError::UnknownObject(id))?;
        object.live = live;
        Ok(())
    }

    /// Property hook: replace the metadata blob and mark it dirty.
    pub fn set_metadata(&mut self, id: ObjectId, blob: serde_json::Value) -> Result<()> {
        let object = self.objects.get_mut(id).ok_or(SyncError::UnknownObject(id))?;
        object.metadata.set(blob);
        Ok(())
    }

    /// On the next tick, resync `id` silently and send despawn + spawn to
    /// every observer that can see it, discarding all client-side state.
    pub fn request_respawn(&mut self, id: ObjectId) -> Result<()> {
        let object = self.objects.get_mut(id).ok_or(SyncError::UnknownObject(id))?;
        object.respawn_pending = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Couple `members` into a new group. Fails without side effects if the
    /// list is empty or repeats an id, or if any member is unknown or already
    /// grouped.
    pub fn create_group(&mut self, members: &[ObjectId]) -> Result<GroupId> {
        if members.is_empty() {
            return Err(SyncError::EmptyGroup);
        }
        let mut seen = BTreeSet::new();
        for &m in members {
            if !seen.insert(m) {
                return Err(SyncError::DuplicateMember(m));
            }
            let object = self.objects.get(m).ok_or(SyncError::UnknownObject(m))?;
            if let Some(group) = object.group {
                return Err(SyncError::AlreadyGrouped { object: m, group });
            }
        }
        let group = self.groups.create_group();
        for &m in members {
            self.join_group(group, m)?;
        }
        Ok(group)
    }

    pub fn join_group(&mut self, group: GroupId, id: ObjectId) -> Result<()> {
        let object = self.objects.get_mut(id).ok_or(SyncError::UnknownObject(id))?;
        self.groups.add_member(group, id)?;
        object.group = Some(group);
        Ok(())
    }

    pub fn leave_group(&mut self, id: ObjectId) -> Option<GroupId> {
        let group = self.groups.remove_member(id)?;
        if let Some(object) = self.objects.get_mut(id) {
            object.group = None;
        }
        Some(group)
    }

    pub fn dissolve_group(&mut self, group: GroupId) -> Result<Vec<ObjectId>> {
        let members = self.groups.dissolve(group)?;
        for &m in &members {
            if let Some(object) = self.objects.get_mut(m) {
                object.group = None;
            }
        }
        Ok(members)
    }

    pub fn group(&self, group: GroupId) -> Option<&CoupledGroup> {
        self.groups.group(group)
    }

    /// Whether `id` gets a sync pass on `tick`, group lock-step included.
    pub fn is_due(&self, id: ObjectId, tick: u64) -> bool {
        self.groups.is_due(id, |m| {
            self.objects
                .get(m)
                .is_some_and(|o| o.is_independently_due(tick))
        })
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Handle for network threads; commands apply at the start of a tick.
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    pub fn add_observer(&mut self, id: ObserverId, position: Vec3) -> bool {
        self.visibility.add_observer(id, position)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.visibility.remove_observer(id).is_some()
    }

    pub fn move_observer(&mut self, id: ObserverId, position: Vec3) -> Result<()> {
        if self.visibility.set_observer_position(id, position) {
            Ok(())
        } else {
            Err(SyncError::UnknownObserver(id))
        }
    }

    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.visibility.observer(id)
    }

    pub fn visibility(&self) -> &VisibilitySubscriptionManager {
        &self.visibility
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            tracked_objects: self.objects.len(),
            observers: self.visibility.observer_count(),
            groups: self.groups.len(),
            total_ticks: self.tick,
            messages_sent: self.messages_sent,
            send_failures: self.send_failures,
        }
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Advance synchronization by one simulation tick.
    ///
    /// Only a non-finite live state aborts the tick, and it does so before
    /// anything is mutated or sent. Send failures are absorbed.
    pub fn tick<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<TickReport> {
        self.validate_live_state()?;
        self.apply_commands();

        self.tick += 1;
        let tick = self.tick;
        transport.begin_tick(tick);

        let mut out = Outbox::new(transport);
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        for object in self.objects.values_mut() {
            object.ticks_since_teleport = object.ticks_since_teleport.saturating_add(1);
        }

        let due = self.collect_due(tick);
        report.spawns += self.process_respawns(&mut out);

        // Visibility first, so every spawn precedes this tick's deltas.
        let positions: Vec<(ObjectId, Vec3)> = self
            .objects
            .iter()
            .map(|(id, o)| (id, o.live.position))
            .collect();
        let transitions = self.visibility.update_all(&positions);

        for (observer, delta) in &transitions {
            for &id in &delta.spawns {
                if let Some(object) = self.objects.get_mut(id) {
                    if out.spawn(*observer, object) {
                        report.spawns += 1;
                    }
                }
            }
        }

        for id in self.objects.ids() {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            let is_due = due.contains(&id);
            let mut next = object.synced;
            let mut messages = Vec::new();

            if is_due {
                if let Some(movement) = self.encoder.encode(
                    &mut next,
                    &mut object.live,
                    &mut object.ticks_since_teleport,
                ) {
                    messages.push(SyncMessage::Movement(ObjectMovement {
                        object_id: id,
                        movement,
                    }));
                }
            }
            if let Some(velocity) = self.encoder.encode_velocity(&mut next, &object.live) {
                messages.push(SyncMessage::Velocity(ObjectVelocity {
                    object_id: id,
                    velocity,
                }));
            }
            if is_due {
                messages.extend(object.metadata.take_diff(id));
                object.last_sync_tick = Some(tick);
                report.synced_objects += 1;
            }

            if object.render_kind().is_renderable() && !messages.is_empty() {
                for observer in self.visibility.subscribers_of(id) {
                    for message in &messages {
                        out.send(observer, message);
                    }
                }
            }
            object.synced = next;
        }

        for (observer, delta) in &transitions {
            for &id in &delta.despawns {
                let renderable = self
                    .objects
                    .get(id)
                    .is_some_and(|o| o.render_kind().is_renderable());
                if renderable && out.send(*observer, &despawn_message(id)) {
                    report.despawns += 1;
                }
            }
        }

        report.messages = out.delivered;
        report.failed_observers = self.absorb(out);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Tick helpers
    // -----------------------------------------------------------------------

    fn validate_live_state(&self) -> Result<()> {
        match self.objects.iter().find(|(_, o)| !o.live.is_finite()) {
            Some((object, _)) => Err(SyncError::InvalidLiveState { object }),
            None => Ok(()),
        }
    }

    fn apply_commands(&mut self) {
        for command in self.commands.drain() {
            match command {
                ObserverCommand::Join { id, x, y, z } => {
                    self.visibility.add_observer(ObserverId(id), Vec3::new(x, y, z));
                }
                ObserverCommand::Leave { id } => {
                    self.visibility.remove_observer(ObserverId(id));
                }
                ObserverCommand::Move { id, x, y, z } => {
                    let observer = ObserverId(id);
                    if !self
                        .visibility
                        .set_observer_position(observer, Vec3::new(x, y, z))
                    {
                        debug!("Ignoring move for unknown {}", observer);
                    }
                }
            }
        }
    }

    fn collect_due(&self, tick: u64) -> BTreeSet<ObjectId> {
        let mut due: BTreeSet<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, o)| o.is_independently_due(tick))
            .map(|(id, _)| id)
            .collect();
        self.groups.propagate_due(&mut due);
        due
    }

    /// Returns the number of spawns delivered.
    fn process_respawns<T: Transport + ?Sized>(&mut self, out: &mut Outbox<'_, T>) -> usize {
        let mut spawns = 0;
        for id in self.objects.ids() {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            if !object.respawn_pending {
                continue;
            }
            object.respawn_pending = false;

            object.live.position = FixedVec3::from_world(object.live.position).to_world();
            object.synced = SyncedState::from_live(&object.live);
            object.ticks_since_teleport = 0;

            if !object.render_kind().is_renderable() {
                continue;
            }
            for observer in self.visibility.subscribers_of(id) {
                if out.send(observer, &despawn_message(id)) && out.spawn(observer, object) {
                    spawns += 1;
                }
            }
            debug!("Respawned {}", id);
        }
        spawns
    }

    /// Fold a finished outbox into the counters and drop the subscriptions
    /// of every observer that failed.
    fn absorb<T: Transport + ?Sized>(&mut self, out: Outbox<'_, T>) -> Vec<ObserverId> {
        self.messages_sent += out.delivered as u64;
        self.send_failures += out.failed.len() as u64;
        for &observer in &out.failed {
            let dropped = self.visibility.drop_subscriptions(observer);
            warn!(
                "Dropped {} subscriptions of {} after a failed send",
                dropped.len(),
                observer
            );
        }
        out.failed.into_iter().collect()
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}
