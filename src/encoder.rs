//! PositionDeltaEncoder – picks the smallest movement message that moves an
//! observer's view of an object from the last-synced snapshot to the live one.
//!
//! ```text
//!   max |d| < dead zone, look < dead zone     → nothing
//!   max |d| < 128 and no resync due          → relative move / look / move+look
//!   otherwise                                → absolute teleport (counter reset)
//! ```
//!
//! The synced snapshot is always advanced to what was actually sent, so
//! quantization error never compounds across ticks.

use crate::protocol::Movement;
use crate::types::{FixedVec3, LiveState, RelativeDelta, SyncConfig, SyncedState, Vec3};

#[derive(Debug, Clone)]
pub struct PositionDeltaEncoder {
    move_dead_zone: i32,
    look_dead_zone: u8,
    max_relative_delta: i32,
    resync_interval_ticks: u32,
    velocity_epsilon_sq: f64,
}

impl PositionDeltaEncoder {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            move_dead_zone: config.move_dead_zone,
            look_dead_zone: config.look_dead_zone,
            // A relative move is one signed byte per axis.
            max_relative_delta: config.max_relative_delta.clamp(1, 128),
            resync_interval_ticks: config.resync_interval_ticks,
            velocity_epsilon_sq: config.velocity_epsilon_sq,
        }
    }

    /// Encode the position/orientation change since `synced`.
    ///
    /// On a teleport `live.position` is snapped to its quantized value and
    /// `ticks_since_teleport` is reset. Inputs must be finite.
    pub fn encode(
        &self,
        synced: &mut SyncedState,
        live: &mut LiveState,
        ticks_since_teleport: &mut u32,
    ) -> Option<Movement> {
        let target = FixedVec3::from_world(live.position);
        let (dx, dy, dz) = target.delta_from(synced.position);
        let largest = dx
            .unsigned_abs()
            .max(dy.unsigned_abs())
            .max(dz.unsigned_abs());

        let rotation = live.orientation.pack();
        let moved = largest >= self.move_dead_zone.unsigned_abs();
        let looked = rotation.max_delta(synced.rotation) >= self.look_dead_zone;

        let relative = if largest < self.max_relative_delta.unsigned_abs()
            && *ticks_since_teleport <= self.resync_interval_ticks
        {
            RelativeDelta::from_components(dx, dy, dz)
        } else {
            None
        };

        let Some(delta) = relative else {
            live.position = target.to_world();
            synced.position = target;
            synced.rotation = rotation;
            *ticks_since_teleport = 0;
            return Some(Movement::Teleport {
                position: target,
                rotation,
            });
        };

        let movement = match (moved, looked) {
            (true, true) => Movement::RelativeMoveLook { delta, rotation },
            (true, false) => Movement::RelativeMove { delta },
            (false, true) => Movement::RelativeLook { rotation },
            (false, false) => return None,
        };

        if moved {
            synced.position = synced.position.offset(delta);
        }
        if looked {
            synced.rotation = rotation;
        }
        Some(movement)
    }

    /// Velocity is checked every tick, independent of sync cadence.
    pub fn encode_velocity(&self, synced: &mut SyncedState, live: &LiveState) -> Option<Vec3> {
        let changed = live.velocity.distance_squared(&synced.velocity) > self.velocity_epsilon_sq;
        let started_or_stopped = live.velocity.is_zero() != synced.velocity.is_zero();
        if !changed && !started_or_stopped {
            return None;
        }
        synced.velocity = live.velocity;
        Some(live.velocity)
    }
}

impl Default for PositionDeltaEncoder {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}
