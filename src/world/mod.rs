//! World module
//!
//! The read-only view of authoritative world state that the engine queries:
//! - Shared value types (positions, transforms, block states, ids)
//! - Equipment slots and loadouts
//! - The `WorldView` collaborator trait
//! - An in-memory world used by tests and the demo binary

pub mod equipment;
pub mod memory;
pub mod types;

pub use equipment::{EquipmentLoadout, EquipmentSlot, ItemStack, EQUIPMENT_SLOT_COUNT};
pub use memory::InMemoryWorld;
pub use types::{BlockPos, ClientId, EntityId, PortalId, RenderedBlockState, Transform, Vec3};

/// Read access to authoritative world state
///
/// Implementations must be safe for concurrent readers: sessions of
/// different clients query the same world from different threads.
pub trait WorldView: Send + Sync {
    /// Current rendered state at a position.
    ///
    /// Never fails: unloaded chunks report `RenderedBlockState::UNLOADED`.
    fn rendered_state(&self, pos: BlockPos) -> RenderedBlockState;

    /// Authoritative transform of an entity, `None` if it no longer exists
    fn authoritative_transform(&self, entity: EntityId) -> Option<Transform>;

    /// Visible equipment, `None` for entity kinds that cannot equip
    fn equipment(&self, entity: EntityId) -> Option<EquipmentLoadout>;

    /// Whether the entity currently exists and can be shown
    fn is_valid(&self, entity: EntityId) -> bool {
        self.authoritative_transform(entity).is_some()
    }
}

impl<W: WorldView + ?Sized> WorldView for std::sync::Arc<W> {
    fn rendered_state(&self, pos: BlockPos) -> RenderedBlockState {
        (**self).rendered_state(pos)
    }

    fn authoritative_transform(&self, entity: EntityId) -> Option<Transform> {
        (**self).authoritative_transform(entity)
    }

    fn equipment(&self, entity: EntityId) -> Option<EquipmentLoadout> {
        (**self).equipment(entity)
    }

    fn is_valid(&self, entity: EntityId) -> bool {
        (**self).is_valid(entity)
    }
}
