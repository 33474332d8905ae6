//! Logical client operations
//!
//! Every state change the engine sends to a client is one `Operation`.
//! Transport adapters translate these into concrete packets; nothing in the
//! engine depends on a wire format.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world::{BlockPos, EntityId, EquipmentSlot, ItemStack, RenderedBlockState, Transform, Vec3};

/// Version of the operation set; bumped whenever a variant changes shape
pub const OPERATION_VERSION: u16 = 1;

/// Discrete angle steps per full turn
pub const ANGLE_STEPS: u32 = 256;

/// Rotation quantized to 1/256 of a full turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Angle(pub u8);

impl Angle {
    /// Quantize an angle in degrees, wrapping into a single turn
    pub fn from_degrees(degrees: f32) -> Self {
        let steps = (degrees * ANGLE_STEPS as f32 / 360.0) as i64;
        Angle(steps.rem_euclid(ANGLE_STEPS as i64) as u8)
    }

    /// Degrees represented by this step (0 <= d < 360)
    pub fn to_degrees(self) -> f32 {
        self.0 as f32 * 360.0 / ANGLE_STEPS as f32
    }
}

/// Small position change sent as a relative move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeDelta {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl RelativeDelta {
    pub const fn new(dx: f64, dy: f64, dz: f64) -> Self {
        Self { dx, dy, dz }
    }

    /// Delta between two positions
    pub fn between(from: Vec3, to: Vec3) -> Self {
        let d = to - from;
        Self {
            dx: d.x,
            dy: d.y,
            dz: d.z,
        }
    }

    /// Check if every axis is strictly below `threshold` in magnitude
    pub fn fits_within(&self, threshold: f64) -> bool {
        self.dx.abs() < threshold && self.dy.abs() < threshold && self.dz.abs() < threshold
    }
}

/// A logical state change for one client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Override the client's view of a set of blocks
    BlockChanges(BTreeMap<BlockPos, RenderedBlockState>),
    /// Show an entity at a transform
    SpawnEntity {
        entity: EntityId,
        transform: Transform,
    },
    /// Remove an entity from the client's view
    DestroyEntity { entity: EntityId },
    /// Move a shown entity by a small delta
    MoveEntity {
        entity: EntityId,
        delta: RelativeDelta,
    },
    /// Place a shown entity at an absolute transform
    TeleportEntity {
        entity: EntityId,
        transform: Transform,
    },
    /// Update head rotation and look direction
    RotateEntity {
        entity: EntityId,
        yaw: Angle,
        pitch: Angle,
    },
    /// Set one or more equipment slots in one batch
    SetEquipment {
        entity: EntityId,
        slots: Vec<(EquipmentSlot, ItemStack)>,
    },
}

/// Operation kind, used for statistics and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    BlockChanges,
    Spawn,
    Destroy,
    Move,
    Teleport,
    Rotate,
    Equipment,
}

impl OperationKind {
    /// Get a human-readable name for the kind
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::BlockChanges => "block_changes",
            OperationKind::Spawn => "spawn",
            OperationKind::Destroy => "destroy",
            OperationKind::Move => "move",
            OperationKind::Teleport => "teleport",
            OperationKind::Rotate => "rotate",
            OperationKind::Equipment => "equipment",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Operation {
    /// Kind of this operation
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::BlockChanges(_) => OperationKind::BlockChanges,
            Operation::SpawnEntity { .. } => OperationKind::Spawn,
            Operation::DestroyEntity { .. } => OperationKind::Destroy,
            Operation::MoveEntity { .. } => OperationKind::Move,
            Operation::TeleportEntity { .. } => OperationKind::Teleport,
            Operation::RotateEntity { .. } => OperationKind::Rotate,
            Operation::SetEquipment { .. } => OperationKind::Equipment,
        }
    }

    /// Entity this operation targets, if any
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Operation::BlockChanges(_) => None,
            Operation::SpawnEntity { entity, .. }
            | Operation::DestroyEntity { entity }
            | Operation::MoveEntity { entity, .. }
            | Operation::TeleportEntity { entity, .. }
            | Operation::RotateEntity { entity, .. }
            | Operation::SetEquipment { entity, .. } => Some(*entity),
        }
    }
}
