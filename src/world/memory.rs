//! In-memory world
//!
//! A thread-safe `WorldView` backed by concurrent maps. Blocks that were
//! never set read as air; blocks in unloaded chunks read as unloaded.

use dashmap::{DashMap, DashSet};
use tracing::trace;

use super::equipment::EquipmentLoadout;
use super::types::{BlockPos, EntityId, RenderedBlockState, Transform, Vec3};
use super::WorldView;

/// Chunk edge length in blocks
pub const CHUNK_SIZE: i32 = 16;

/// Authoritative record of one entity
#[derive(Debug, Clone)]
struct EntityRecord {
    transform: Transform,
    equipment: Option<EquipmentLoadout>,
}

/// In-memory authoritative world
#[derive(Debug, Default)]
pub struct InMemoryWorld {
    /// Explicitly set blocks
    blocks: DashMap<BlockPos, RenderedBlockState>,
    /// Chunk columns (chunk x, chunk z) that are not loaded
    unloaded_chunks: DashSet<(i32, i32)>,
    /// Live entities
    entities: DashMap<EntityId, EntityRecord>,
}

impl InMemoryWorld {
    /// Create an empty world with every chunk loaded
    pub fn new() -> Self {
        Self::default()
    }

    fn chunk_of(pos: BlockPos) -> (i32, i32) {
        (pos.x.div_euclid(CHUNK_SIZE), pos.z.div_euclid(CHUNK_SIZE))
    }

    /// Set the block at a position
    pub fn set_block(&self, pos: BlockPos, state: RenderedBlockState) {
        trace!(pos = %pos, material = state.material, "Block set");
        self.blocks.insert(pos, state);
    }

    /// Mark the chunk containing `pos` as unloaded
    pub fn unload_chunk_at(&self, pos: BlockPos) {
        self.unloaded_chunks.insert(Self::chunk_of(pos));
    }

    /// Mark the chunk containing `pos` as loaded
    pub fn load_chunk_at(&self, pos: BlockPos) {
        self.unloaded_chunks.remove(&Self::chunk_of(pos));
    }

    /// Add or replace an entity
    pub fn spawn_entity(
        &self,
        entity: EntityId,
        transform: Transform,
        equipment: Option<EquipmentLoadout>,
    ) {
        self.entities.insert(
            entity,
            EntityRecord {
                transform,
                equipment,
            },
        );
    }

    /// Remove an entity; later queries treat it as invalid
    pub fn despawn_entity(&self, entity: EntityId) -> bool {
        self.entities.remove(&entity).is_some()
    }

    /// Replace the transform of an existing entity
    pub fn set_transform(&self, entity: EntityId, transform: Transform) -> bool {
        match self.entities.get_mut(&entity) {
            Some(mut record) => {
                record.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Move an existing entity by a delta, keeping its rotation
    pub fn move_entity(&self, entity: EntityId, delta: Vec3) -> bool {
        match self.entities.get_mut(&entity) {
            Some(mut record) => {
                record.transform.position = record.transform.position + delta;
                true
            }
            None => false,
        }
    }

    /// Replace the equipment of an existing entity
    pub fn set_equipment(&self, entity: EntityId, equipment: Option<EquipmentLoadout>) -> bool {
        match self.entities.get_mut(&entity) {
            Some(mut record) => {
                record.equipment = equipment;
                true
            }
            None => false,
        }
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl WorldView for InMemoryWorld {
    fn rendered_state(&self, pos: BlockPos) -> RenderedBlockState {
        if self.unloaded_chunks.contains(&Self::chunk_of(pos)) {
            return RenderedBlockState::UNLOADED;
        }
        self.blocks
            .get(&pos)
            .map(|state| *state)
            .unwrap_or(RenderedBlockState::AIR)
    }

    fn authoritative_transform(&self, entity: EntityId) -> Option<Transform> {
        self.entities.get(&entity).map(|record| record.transform)
    }

    fn equipment(&self, entity: EntityId) -> Option<EquipmentLoadout> {
        self.entities.get(&entity).and_then(|record| record.equipment)
    }
}
