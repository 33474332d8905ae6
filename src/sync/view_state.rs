//! Entity view state
//!
//! The last-communicated view of one replicated entity: projected position,
//! quantized rotation and equipment. Comparing a stored state with a freshly
//! captured one yields an `EntityViewDelta` describing exactly which
//! operations the client needs.

use crate::protocol::{Angle, Operation, RelativeDelta};
use crate::world::{EntityId, EquipmentLoadout, EquipmentSlot, ItemStack, Transform, Vec3, WorldView};

use super::update_flags::ViewUpdateFlags;

/// Default relative-move threshold in world units (exclusive)
pub const RELATIVE_MOVE_THRESHOLD: f64 = 8.0;

/// How a position change is communicated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Movement {
    /// Small move relative to the last sent position
    Relative(RelativeDelta),
    /// Absolute placement, valid for any distance
    Teleport(Transform),
}

/// What the client was last told about one replicated entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityViewState {
    entity: EntityId,
    /// Authoritative transform shifted by the session offset
    transform: Transform,
    yaw: Angle,
    pitch: Angle,
    /// `None` for entity kinds that cannot equip
    equipment: Option<EquipmentLoadout>,
}

impl EntityViewState {
    /// Capture the current view of an entity as seen through `offset`.
    ///
    /// Returns `None` if the entity no longer exists or is no longer valid,
    /// even when the world still reports a last known transform for it.
    pub fn capture<W: WorldView + ?Sized>(
        entity: EntityId,
        world: &W,
        offset: Vec3,
    ) -> Option<Self> {
        if !world.is_valid(entity) {
            return None;
        }
        let transform = world.authoritative_transform(entity)?;
        Some(Self::from_parts(
            entity,
            transform.shifted(offset),
            world.equipment(entity),
        ))
    }

    /// Build a state from an already projected transform
    pub fn from_parts(
        entity: EntityId,
        transform: Transform,
        equipment: Option<EquipmentLoadout>,
    ) -> Self {
        Self {
            entity,
            transform,
            yaw: Angle::from_degrees(transform.yaw),
            pitch: Angle::from_degrees(transform.pitch),
            equipment,
        }
    }

    /// Source entity
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Last sent projected transform
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Last sent projected position
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Last sent quantized rotation
    pub fn rotation(&self) -> (Angle, Angle) {
        (self.yaw, self.pitch)
    }

    /// Last sent equipment
    pub fn equipment(&self) -> Option<&EquipmentLoadout> {
        self.equipment.as_ref()
    }

    /// Operation that spawns this view on a client
    pub fn spawn_operation(&self) -> Operation {
        Operation::SpawnEntity {
            entity: self.entity,
            transform: self.transform,
        }
    }

    /// Operation that sets every equipment slot, if the entity can equip
    pub fn full_equipment_operation(&self) -> Option<Operation> {
        self.equipment.map(|loadout| Operation::SetEquipment {
            entity: self.entity,
            slots: loadout.entries(),
        })
    }

    /// Compare against a newer capture of the same entity
    pub fn diff(&self, next: &EntityViewState, move_threshold: f64) -> EntityViewDelta {
        let mut delta = EntityViewDelta {
            entity: self.entity,
            flags: ViewUpdateFlags::NONE,
            movement: None,
            rotation: None,
            equipment: Vec::new(),
        };

        if next.transform.position != self.transform.position {
            delta.flags |= ViewUpdateFlags::POSITION;
            let relative = RelativeDelta::between(self.transform.position, next.transform.position);
            delta.movement = Some(if relative.fits_within(move_threshold) {
                Movement::Relative(relative)
            } else {
                Movement::Teleport(next.transform)
            });
        }

        if next.yaw != self.yaw || next.pitch != self.pitch {
            delta.flags |= ViewUpdateFlags::ROTATION;
            delta.rotation = Some((next.yaw, next.pitch));
        }

        // A kind that cannot equip compares as an empty loadout
        let before = self.equipment.unwrap_or_default();
        let after = next.equipment.unwrap_or_default();
        let changed = after.changed_since(&before);
        if !changed.is_empty() {
            delta.flags |= ViewUpdateFlags::EQUIPMENT;
            delta.equipment = changed;
        }

        delta
    }

    /// Record that the position in `next` was sent
    pub(crate) fn apply_position(&mut self, next: &EntityViewState) {
        self.transform.position = next.transform.position;
    }

    /// Record that the rotation in `next` was sent
    pub(crate) fn apply_rotation(&mut self, next: &EntityViewState) {
        self.transform.yaw = next.transform.yaw;
        self.transform.pitch = next.transform.pitch;
        self.yaw = next.yaw;
        self.pitch = next.pitch;
    }

    /// Record that the equipment in `next` was sent
    pub(crate) fn apply_equipment(&mut self, next: &EntityViewState) {
        self.equipment = next.equipment;
    }
}

/// Differences between a stored view and a fresh capture
#[derive(Debug, Clone, PartialEq)]
pub struct EntityViewDelta {
    pub entity: EntityId,
    pub flags: ViewUpdateFlags,
    pub movement: Option<Movement>,
    pub rotation: Option<(Angle, Angle)>,
    /// Changed slots only, in slot order
    pub equipment: Vec<(EquipmentSlot, ItemStack)>,
}

impl EntityViewDelta {
    /// Check if nothing needs to be sent
    pub fn is_empty(&self) -> bool {
        !self.flags.has_update()
    }

    /// Operation for the position change, if any
    pub fn movement_operation(&self) -> Option<Operation> {
        self.movement.map(|movement| match movement {
            Movement::Relative(delta) => Operation::MoveEntity {
                entity: self.entity,
                delta,
            },
            Movement::Teleport(transform) => Operation::TeleportEntity {
                entity: self.entity,
                transform,
            },
        })
    }

    /// Operation for the rotation change, if any
    pub fn rotation_operation(&self) -> Option<Operation> {
        self.rotation.map(|(yaw, pitch)| Operation::RotateEntity {
            entity: self.entity,
            yaw,
            pitch,
        })
    }

    /// Single batched operation for all changed slots, if any
    pub fn equipment_operation(&self) -> Option<Operation> {
        if self.equipment.is_empty() {
            return None;
        }
        Some(Operation::SetEquipment {
            entity: self.entity,
            slots: self.equipment.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::InMemoryWorld;

    fn state_at(x: f64, yaw: f32) -> EntityViewState {
        EntityViewState::from_parts(
            EntityId(1),
            Transform::new(Vec3::new(x, 64.0, 0.0), yaw, 0.0),
            None,
        )
    }

    #[test]
    fn test_capture_applies_offset() {
        let world = InMemoryWorld::new();
        let equipment = EquipmentLoadout::new().with(EquipmentSlot::Head, ItemStack::new(86, 1));
        world.spawn_entity(
            EntityId(3),
            Transform::new(Vec3::new(1.0, 2.0, 3.0), 45.0, 0.0),
            Some(equipment),
        );

        let state = EntityViewState::capture(EntityId(3), &world, Vec3::new(100.0, 0.0, -10.0))
            .expect("entity exists");
        assert_eq!(state.position(), Vec3::new(101.0, 2.0, -7.0));
        assert_eq!(state.rotation(), (Angle(32), Angle(0)));
        assert_eq!(state.equipment(), Some(&equipment));

        assert!(EntityViewState::capture(EntityId(4), &world, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_unchanged_diff_is_empty() {
        let state = state_at(0.0, 0.0);
        let delta = state.diff(&state.clone(), RELATIVE_MOVE_THRESHOLD);
        assert!(delta.is_empty());
        assert!(delta.movement_operation().is_none());
        assert!(delta.rotation_operation().is_none());
        assert!(delta.equipment_operation().is_none());
    }

    #[test]
    fn test_threshold_boundary() {
        let before = state_at(0.0, 0.0);

        let delta = before.diff(&state_at(8.0, 0.0), RELATIVE_MOVE_THRESHOLD);
        assert!(matches!(delta.movement, Some(Movement::Teleport(_))));

        let delta = before.diff(&state_at(7.0, 0.0), RELATIVE_MOVE_THRESHOLD);
        assert!(matches!(delta.movement, Some(Movement::Relative(_))));

        // Large negative moves must not sneak through as relative moves
        let delta = before.diff(&state_at(-20.0, 0.0), RELATIVE_MOVE_THRESHOLD);
        assert!(matches!(delta.movement, Some(Movement::Teleport(_))));
    }

    #[test]
    fn test_rotation_uses_quantized_angles() {
        let before = state_at(0.0, 10.0);
        // Less than one step (1.40625 degrees)
        assert!(before.diff(&state_at(0.0, 10.5), RELATIVE_MOVE_THRESHOLD).is_empty());

        let delta = before.diff(&state_at(0.0, 90.0), RELATIVE_MOVE_THRESHOLD);
        assert!(delta.flags.needs_rotation());
        assert!(!delta.flags.needs_position());
        assert_eq!(delta.rotation, Some((Angle(64), Angle(0))));
    }

    #[test]
    fn test_equipment_diff_batches_changed_slots() {
        let sword = ItemStack::new(267, 1);
        let helmet = ItemStack::new(310, 1);
        let before = EntityViewState::from_parts(
            EntityId(2),
            Transform::default(),
            Some(EquipmentLoadout::new().with(EquipmentSlot::Head, helmet)),
        );
        let after = EntityViewState::from_parts(
            EntityId(2),
            Transform::default(),
            Some(EquipmentLoadout::new().with(EquipmentSlot::MainHand, sword)),
        );

        let delta = before.diff(&after, RELATIVE_MOVE_THRESHOLD);
        assert_eq!(delta.flags, ViewUpdateFlags::EQUIPMENT);
        assert_eq!(
            delta.equipment_operation(),
            Some(Operation::SetEquipment {
                entity: EntityId(2),
                slots: vec![
                    (EquipmentSlot::MainHand, sword),
                    (EquipmentSlot::Head, ItemStack::EMPTY),
                ],
            })
        );
    }

    #[test]
    fn test_apply_updates_stored_fields() {
        let mut stored = state_at(0.0, 0.0);
        let next = state_at(3.0, 180.0);

        stored.apply_position(&next);
        assert_eq!(stored.position(), next.position());
        assert_ne!(stored.rotation(), next.rotation());

        stored.apply_rotation(&next);
        assert_eq!(stored, next);
    }
}
