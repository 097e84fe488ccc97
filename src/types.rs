//! Core sync types shared across all modules.

use serde::{Deserialize, Serialize};

/// Wire position resolution: integer steps per world unit.
pub const POSITION_SCALE: f64 = 32.0;

/// Wire rotation resolution: steps per full turn.
pub const ANGLE_STEPS: f32 = 256.0;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn distance_squared(&self, other: &Vec3) -> f64 {
        (*self - *other).length_squared()
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Quantized wire forms
// ---------------------------------------------------------------------------

/// Position in wire resolution (1/32 world unit per step).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct FixedVec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl FixedVec3 {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Quantize a world-space position. Inputs must be finite.
    pub fn from_world(pos: Vec3) -> Self {
        Self {
            x: quantize(pos.x),
            y: quantize(pos.y),
            z: quantize(pos.z),
        }
    }

    pub fn to_world(self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) / POSITION_SCALE,
            f64::from(self.y) / POSITION_SCALE,
            f64::from(self.z) / POSITION_SCALE,
        )
    }

    /// Component-wise `self - base`.
    pub fn delta_from(self, base: FixedVec3) -> (i32, i32, i32) {
        (
            self.x.wrapping_sub(base.x),
            self.y.wrapping_sub(base.y),
            self.z.wrapping_sub(base.z),
        )
    }

    pub fn offset(self, delta: RelativeDelta) -> Self {
        Self {
            x: self.x.wrapping_add(i32::from(delta.dx)),
            y: self.y.wrapping_add(i32::from(delta.dy)),
            z: self.z.wrapping_add(i32::from(delta.dz)),
        }
    }
}

impl std::fmt::Display for FixedVec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

fn quantize(v: f64) -> i32 {
    (v * POSITION_SCALE).round() as i32
}

/// Compact relative move, one signed byte per axis.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct RelativeDelta {
    pub dx: i8,
    pub dy: i8,
    pub dz: i8,
}

impl RelativeDelta {
    pub fn new(dx: i8, dy: i8, dz: i8) -> Self {
        Self { dx, dy, dz }
    }

    /// Returns `None` when any component falls outside the signed byte range.
    pub fn from_components(dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self {
            dx: i8::try_from(dx).ok()?,
            dy: i8::try_from(dy).ok()?,
            dz: i8::try_from(dz).ok()?,
        })
    }
}

/// Yaw/pitch in degrees as produced by the physics collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }

    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite()
    }

    pub fn pack(&self) -> PackedRotation {
        PackedRotation {
            yaw: pack_angle(self.yaw),
            pitch: pack_angle(self.pitch),
        }
    }
}

fn pack_angle(degrees: f32) -> u8 {
    // Wraps to a full turn; the low byte of the step count is the wire angle.
    let steps = (degrees * ANGLE_STEPS / 360.0).round() as i32;
    (steps & 0xFF) as u8
}

/// Yaw/pitch in wire resolution (1/256 turn per step).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct PackedRotation {
    pub yaw: u8,
    pub pitch: u8,
}

impl PackedRotation {
    pub fn new(yaw: u8, pitch: u8) -> Self {
        Self { yaw, pitch }
    }

    pub fn to_orientation(self) -> Orientation {
        Orientation::new(
            f32::from(self.yaw as i8) * 360.0 / ANGLE_STEPS,
            f32::from(self.pitch as i8) * 360.0 / ANGLE_STEPS,
        )
    }

    /// Largest of the yaw/pitch distances, taking the short way around.
    pub fn max_delta(self, other: PackedRotation) -> u8 {
        let yaw = (self.yaw.wrapping_sub(other.yaw) as i8).unsigned_abs();
        let pitch = (self.pitch.wrapping_sub(other.pitch) as i8).unsigned_abs();
        yaw.max(pitch)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Client-side visual kind. Zero is reserved for "no supported visual".
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderKind(pub u16);

impl RenderKind {
    pub const NONE: RenderKind = RenderKind(0);

    pub fn is_renderable(self) -> bool {
        self != Self::NONE
    }
}

// ---------------------------------------------------------------------------
// Per-object state
// ---------------------------------------------------------------------------

/// State written by the physics collaborator between ticks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct LiveState {
    pub position: Vec3,
    pub orientation: Orientation,
    pub velocity: Vec3,
}

impl LiveState {
    pub fn new(position: Vec3, orientation: Orientation, velocity: Vec3) -> Self {
        Self {
            position,
            orientation,
            velocity,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite() && self.velocity.is_finite()
    }
}

/// What observers were last told, in wire resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct SyncedState {
    pub position: FixedVec3,
    pub rotation: PackedRotation,
    pub velocity: Vec3,
}

impl SyncedState {
    /// Snapshot matching `live` exactly, as if it had just been broadcast.
    pub fn from_live(live: &LiveState) -> Self {
        Self {
            position: FixedVec3::from_world(live.position),
            rotation: live.orientation.pack(),
            velocity: live.velocity,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub tracked_objects: usize,
    pub observers: usize,
    pub groups: usize,
    pub total_ticks: u64,
    pub messages_sent: u64,
    pub send_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum positional change (wire steps) worth sending.
    pub move_dead_zone: i32,
    /// Minimum yaw/pitch change (wire steps) worth sending.
    pub look_dead_zone: u8,
    /// Deltas at or beyond this fall back to a teleport. Clamped to 128.
    pub max_relative_delta: i32,
    /// Force a teleport once this many ticks pass without one.
    pub resync_interval_ticks: u32,
    /// Squared velocity change that triggers a velocity message.
    pub velocity_epsilon_sq: f64,
    /// Observer visibility radius in world units.
    pub visibility_radius: f64,
    /// Ticks between sync passes for objects without an explicit cadence.
    pub default_sync_interval: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            move_dead_zone: 4,
            look_dead_zone: 4,
            max_relative_delta: 128,
            resync_interval_ticks: 400,
            velocity_epsilon_sq: 0.0004,
            visibility_radius: 16.0,
            default_sync_interval: 1,
        }
    }
}
