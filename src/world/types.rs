//! Shared value types
//!
//! Identity tokens, positions, transforms and rendered block states used as
//! keys and values throughout the engine.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Connected client identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

/// Stable identity token for a source entity
///
/// Identifies an entity in the authoritative store; holding one never keeps
/// the entity alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Identifier of an active portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortalId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block position in the world
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockPos {
    /// X coordinate
    pub x: i32,
    /// Y (height) coordinate
    pub y: i32,
    /// Z coordinate
    pub z: i32,
}

impl BlockPos {
    /// Origin of the world
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    /// Create a new block position
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Offset this position by the given deltas
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Check if within an axis-aligned box around a center (inclusive)
    pub fn within_box(&self, center: &BlockPos, radius_horizontal: i32, radius_vertical: i32) -> bool {
        (self.x - center.x).abs() <= radius_horizontal
            && (self.z - center.z).abs() <= radius_horizontal
            && (self.y - center.y).abs() <= radius_vertical
    }
}

impl Add for BlockPos {
    type Output = BlockPos;

    fn add(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for BlockPos {
    type Output = BlockPos;

    fn sub(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Entity-granularity position or offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Largest absolute component
    pub fn max_abs_component(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Entity transform: position plus look direction in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position
    pub position: Vec3,
    /// Yaw in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
}

impl Transform {
    /// Create a new transform
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    /// Create a transform at a position with no rotation
    pub fn at(position: Vec3) -> Self {
        Self::new(position, 0.0, 0.0)
    }

    /// Same transform shifted by an offset
    pub fn shifted(&self, offset: Vec3) -> Self {
        Self {
            position: self.position + offset,
            ..*self
        }
    }
}

/// Visual identity of a block at a position
///
/// Two states are equal iff they render identically. `UNLOADED` stands in
/// for positions whose chunk is not loaded and never equals a loaded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderedBlockState {
    /// Material id
    pub material: u16,
    /// Variant within the material (color, wood type, ...)
    pub variant: u8,
    /// Orientation / facing
    pub orientation: u8,
    /// Whether the containing chunk was loaded
    pub loaded: bool,
}

impl RenderedBlockState {
    /// State reported for unloaded or missing chunks
    pub const UNLOADED: RenderedBlockState = RenderedBlockState {
        material: 0,
        variant: 0,
        orientation: 0,
        loaded: false,
    };

    /// Empty (air) block in a loaded chunk
    pub const AIR: RenderedBlockState = RenderedBlockState {
        material: 0,
        variant: 0,
        orientation: 0,
        loaded: true,
    };

    /// Create a loaded block state
    pub const fn new(material: u16, variant: u8, orientation: u8) -> Self {
        Self {
            material,
            variant,
            orientation,
            loaded: true,
        }
    }

    /// Create a loaded block state with default variant and orientation
    pub const fn of(material: u16) -> Self {
        Self::new(material, 0, 0)
    }

    /// Check if this state came from an unloaded chunk
    pub fn is_unloaded(&self) -> bool {
        !self.loaded
    }

    /// Packed id for transport adapters (material in the high bits)
    pub fn combined_id(&self) -> u32 {
        ((self.material as u32) << 16) | ((self.variant as u32) << 8) | self.orientation as u32
    }
}

impl Default for RenderedBlockState {
    fn default() -> Self {
        Self::AIR
    }
}
