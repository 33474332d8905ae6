//! Client view manipulator
//!
//! Per-client bookkeeping of which entities are hidden from the client and
//! which are replicated into its view through a portal. Each call reconciles
//! a desired set against what was previously applied and emits only the
//! operations needed to get the client from one to the other.
//!
//! Bookkeeping is updated only after the matching operation was delivered,
//! so a transport failure leaves the state describing what the client really
//! has and the next tick repairs the rest.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::error::Result;
use crate::net::transport::Transport;
use crate::protocol::Operation;
use crate::world::{ClientId, EntityId, Vec3, WorldView};

use super::stats::SyncStats;
use super::view_state::{EntityViewState, RELATIVE_MOVE_THRESHOLD};

/// Hidden and replicated entity state of one client
#[derive(Debug)]
pub struct ClientViewManipulator {
    client: ClientId,
    /// Source entities currently destroyed on the client
    hidden: BTreeSet<EntityId>,
    /// Source entities currently shown at a projected transform
    replicated: BTreeMap<EntityId, EntityViewState>,
    /// Offset from source transforms to the client's view
    position_offset: Vec3,
    relative_move_threshold: f64,
    stats: SyncStats,
}

impl ClientViewManipulator {
    /// Create an empty manipulator for a client
    pub fn new(client: ClientId) -> Self {
        Self::with_threshold(client, RELATIVE_MOVE_THRESHOLD)
    }

    /// Create with a custom relative-move threshold
    pub fn with_threshold(client: ClientId, relative_move_threshold: f64) -> Self {
        Self {
            client,
            hidden: BTreeSet::new(),
            replicated: BTreeMap::new(),
            position_offset: Vec3::ZERO,
            relative_move_threshold,
            stats: SyncStats::default(),
        }
    }

    /// Client this manipulator emits to
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Entities currently hidden from the client
    pub fn hidden(&self) -> &BTreeSet<EntityId> {
        &self.hidden
    }

    /// Entities currently replicated to the client
    pub fn replicated_ids(&self) -> BTreeSet<EntityId> {
        self.replicated.keys().copied().collect()
    }

    /// Stored view of a replicated entity
    pub fn view_state(&self, entity: EntityId) -> Option<&EntityViewState> {
        self.replicated.get(&entity)
    }

    /// Offset applied at the last replication reconcile
    pub fn position_offset(&self) -> Vec3 {
        self.position_offset
    }

    /// Operations delivered so far
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Mutable access to the counters, for the owning session
    pub(crate) fn stats_mut(&mut self) -> &mut SyncStats {
        &mut self.stats
    }

    /// Check if nothing is hidden or replicated
    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty() && self.replicated.is_empty()
    }

    /// Make the hidden set equal `desired`.
    ///
    /// Newly hidden entities are destroyed on the client; entities no longer
    /// hidden are respawned at their authoritative transform. Entities that
    /// vanished while hidden are forgotten without being respawned.
    pub fn reconcile_hidden<W, T>(
        &mut self,
        desired: &BTreeSet<EntityId>,
        world: &W,
        transport: &T,
    ) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        let mut previously_hidden = self.hidden.clone();

        for &entity in desired {
            if previously_hidden.remove(&entity) {
                continue;
            }
            self.emit(transport, Operation::DestroyEntity { entity })?;
            self.hidden.insert(entity);
            // The destroy above also removed any ghost of it
            if self.replicated.remove(&entity).is_some() {
                debug!(client = %self.client, entity = %entity, "Replicated entity is now hidden");
            }
            trace!(client = %self.client, entity = %entity, "Entity hidden");
        }

        for entity in previously_hidden {
            self.show_authoritative(entity, world, transport)?;
            self.hidden.remove(&entity);
        }

        Ok(())
    }

    /// Make the replicated set equal `desired`, projected through `offset`.
    ///
    /// Entities leaving the set are destroyed; entities joining it get a
    /// fresh view state, a spawn at the projected transform and their
    /// equipment. Entities already replicated are left to
    /// `refresh_steady_state`. Desired entities that are hidden or no longer
    /// exist are not replicated.
    pub fn reconcile_replicated<W, T>(
        &mut self,
        desired: &BTreeSet<EntityId>,
        offset: Vec3,
        world: &W,
        transport: &T,
    ) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        self.position_offset = offset;

        let leaving: Vec<EntityId> = self
            .replicated
            .keys()
            .filter(|entity| !desired.contains(entity) || self.hidden.contains(entity))
            .copied()
            .collect();
        for entity in leaving {
            self.emit(transport, Operation::DestroyEntity { entity })?;
            self.replicated.remove(&entity);
            trace!(client = %self.client, entity = %entity, "Replicated entity removed");
        }

        for &entity in desired {
            if self.replicated.contains_key(&entity) {
                continue;
            }
            if self.hidden.contains(&entity) {
                debug!(
                    client = %self.client,
                    entity = %entity,
                    "Skipping replication of hidden entity"
                );
                continue;
            }
            let Some(state) = EntityViewState::capture(entity, world, offset) else {
                debug!(client = %self.client, entity = %entity, "Skipping replication of invalid entity");
                continue;
            };

            self.emit(transport, state.spawn_operation())?;
            if let Some(op) = state.full_equipment_operation() {
                self.emit(transport, op)?;
            }
            trace!(
                client = %self.client,
                entity = %entity,
                position = %state.position(),
                "Replicated entity added"
            );
            self.replicated.insert(entity, state);
        }

        Ok(())
    }

    /// Send position, rotation and equipment updates for every replicated
    /// entity whose view changed since the last tick.
    ///
    /// Entities that no longer exist are destroyed on the client and their
    /// view state dropped.
    pub fn refresh_steady_state<W, T>(&mut self, world: &W, transport: &T) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        let entities: Vec<EntityId> = self.replicated.keys().copied().collect();

        for entity in entities {
            let Some(next) = EntityViewState::capture(entity, world, self.position_offset) else {
                debug!(client = %self.client, entity = %entity, "Replicated entity vanished");
                self.emit(transport, Operation::DestroyEntity { entity })?;
                self.replicated.remove(&entity);
                continue;
            };

            let delta = match self.replicated.get(&entity) {
                Some(stored) => stored.diff(&next, self.relative_move_threshold),
                None => continue,
            };
            if delta.is_empty() {
                continue;
            }

            if let Some(op) = delta.movement_operation() {
                self.emit(transport, op)?;
                if let Some(stored) = self.replicated.get_mut(&entity) {
                    stored.apply_position(&next);
                }
            }
            if let Some(op) = delta.rotation_operation() {
                self.emit(transport, op)?;
                if let Some(stored) = self.replicated.get_mut(&entity) {
                    stored.apply_rotation(&next);
                }
            }
            if let Some(op) = delta.equipment_operation() {
                self.emit(transport, op)?;
                if let Some(stored) = self.replicated.get_mut(&entity) {
                    stored.apply_equipment(&next);
                }
            }
        }

        Ok(())
    }

    /// Drop all hidden and replicated state.
    ///
    /// With `send_operations`, every hidden entity is shown again and every
    /// replicated entity destroyed first; otherwise the bookkeeping is just
    /// discarded. If an emit fails, the entries not yet restored are kept so
    /// a later reset can finish the job.
    pub fn reset<W, T>(&mut self, send_operations: bool, world: &W, transport: &T) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        if send_operations {
            let offset = self.position_offset;
            self.reconcile_hidden(&BTreeSet::new(), world, transport)?;
            self.reconcile_replicated(&BTreeSet::new(), offset, world, transport)?;
        }
        self.clear();
        Ok(())
    }

    /// Discard all bookkeeping without emitting anything
    pub fn clear(&mut self) {
        self.hidden.clear();
        self.replicated.clear();
        self.position_offset = Vec3::ZERO;
    }

    /// Respawn an entity at its real transform, with its equipment
    fn show_authoritative<W, T>(&mut self, entity: EntityId, world: &W, transport: &T) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        let transform = match world.authoritative_transform(entity) {
            Some(transform) if world.is_valid(entity) => transform,
            _ => {
                trace!(client = %self.client, entity = %entity, "Hidden entity vanished, not respawning");
                return Ok(());
            }
        };

        self.emit(transport, Operation::SpawnEntity { entity, transform })?;
        if let Some(loadout) = world.equipment(entity) {
            self.emit(
                transport,
                Operation::SetEquipment {
                    entity,
                    slots: loadout.entries(),
                },
            )?;
        }
        trace!(client = %self.client, entity = %entity, "Entity shown");
        Ok(())
    }

    fn emit<T: Transport + ?Sized>(&mut self, transport: &T, operation: Operation) -> Result<()> {
        let kind = operation.kind();
        transport.emit(self.client, operation)?;
        self.stats.record(kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::RecordingTransport;
    use crate::protocol::{Angle, OperationKind};
    use crate::world::{EquipmentLoadout, EquipmentSlot, InMemoryWorld, ItemStack, Transform};
    use pretty_assertions::assert_eq;

    const CLIENT: ClientId = ClientId(1);

    fn ids(list: &[u32]) -> BTreeSet<EntityId> {
        list.iter().map(|&id| EntityId(id)).collect()
    }

    fn world_with(list: &[u32]) -> InMemoryWorld {
        let world = InMemoryWorld::new();
        for &id in list {
            world.spawn_entity(
                EntityId(id),
                Transform::at(Vec3::new(id as f64, 64.0, 0.0)),
                None,
            );
        }
        world
    }

    #[test]
    fn test_hidden_swap_scenario() {
        let world = world_with(&[1, 2, 3]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator.reconcile_hidden(&ids(&[1, 2]), &world, &transport).unwrap();
        transport.drain();

        manipulator.reconcile_hidden(&ids(&[2, 3]), &world, &transport).unwrap();
        let ops = transport.drain_for(CLIENT);
        assert_eq!(
            ops,
            vec![
                Operation::DestroyEntity { entity: EntityId(3) },
                Operation::SpawnEntity {
                    entity: EntityId(1),
                    transform: Transform::at(Vec3::new(1.0, 64.0, 0.0)),
                },
            ]
        );
        assert_eq!(manipulator.hidden(), &ids(&[2, 3]));
    }

    #[test]
    fn test_hidden_set_matches_desired() {
        let world = world_with(&[1, 2, 3, 4]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        for desired in [ids(&[1, 2, 3]), ids(&[1, 2, 3]), ids(&[4]), ids(&[]), ids(&[2])] {
            manipulator.reconcile_hidden(&desired, &world, &transport).unwrap();
            assert_eq!(manipulator.hidden(), &desired);
        }
    }

    #[test]
    fn test_unchanged_hidden_set_emits_nothing() {
        let world = world_with(&[1, 2]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator.reconcile_hidden(&ids(&[1, 2]), &world, &transport).unwrap();
        transport.drain();
        manipulator.reconcile_hidden(&ids(&[1, 2]), &world, &transport).unwrap();
        assert!(transport.is_empty());
    }

    #[test]
    fn test_vanished_hidden_entity_is_not_respawned() {
        let world = world_with(&[1]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator.reconcile_hidden(&ids(&[1]), &world, &transport).unwrap();
        transport.drain();
        world.despawn_entity(EntityId(1));

        manipulator.reconcile_hidden(&ids(&[]), &world, &transport).unwrap();
        assert!(transport.is_empty());
        assert!(manipulator.hidden().is_empty());
    }

    #[test]
    fn test_show_sends_equipment() {
        let world = InMemoryWorld::new();
        let loadout = EquipmentLoadout::new().with(EquipmentSlot::Chest, ItemStack::new(1121, 1));
        world.spawn_entity(EntityId(5), Transform::default(), Some(loadout));
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator.reconcile_hidden(&ids(&[5]), &world, &transport).unwrap();
        manipulator.reconcile_hidden(&ids(&[]), &world, &transport).unwrap();

        let ops = transport.drain_for(CLIENT);
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[2],
            Operation::SetEquipment {
                entity: EntityId(5),
                slots: loadout.entries(),
            }
        );
    }

    #[test]
    fn test_replicated_add_and_remove() {
        let world = world_with(&[1, 2, 3]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        let offset = Vec3::new(100.0, 0.0, 0.0);

        manipulator
            .reconcile_replicated(&ids(&[1, 2]), offset, &world, &transport)
            .unwrap();
        assert_eq!(manipulator.replicated_ids(), ids(&[1, 2]));
        let ops = transport.drain_for(CLIENT);
        assert_eq!(
            ops[0],
            Operation::SpawnEntity {
                entity: EntityId(1),
                transform: Transform::at(Vec3::new(101.0, 64.0, 0.0)),
            }
        );
        assert_eq!(ops.len(), 2);

        manipulator
            .reconcile_replicated(&ids(&[2, 3]), offset, &world, &transport)
            .unwrap();
        assert_eq!(manipulator.replicated_ids(), ids(&[2, 3]));
        assert_eq!(
            transport.drain_for(CLIENT),
            vec![
                Operation::DestroyEntity { entity: EntityId(1) },
                Operation::SpawnEntity {
                    entity: EntityId(3),
                    transform: Transform::at(Vec3::new(103.0, 64.0, 0.0)),
                },
            ]
        );
    }

    #[test]
    fn test_replicated_steady_members_untouched() {
        let world = world_with(&[1]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::ZERO, &world, &transport)
            .unwrap();
        transport.drain();
        world.move_entity(EntityId(1), Vec3::new(1.0, 0.0, 0.0));

        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::ZERO, &world, &transport)
            .unwrap();
        assert!(transport.is_empty());
    }

    #[test]
    fn test_hidden_and_replicated_are_disjoint() {
        let world = world_with(&[1, 2]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator
            .reconcile_replicated(&ids(&[1, 2]), Vec3::ZERO, &world, &transport)
            .unwrap();
        manipulator.reconcile_hidden(&ids(&[1]), &world, &transport).unwrap();
        assert_eq!(manipulator.replicated_ids(), ids(&[2]));

        manipulator
            .reconcile_replicated(&ids(&[1, 2]), Vec3::ZERO, &world, &transport)
            .unwrap();
        assert_eq!(manipulator.replicated_ids(), ids(&[2]));
        assert!(manipulator.hidden().contains(&EntityId(1)));
    }

    #[test]
    fn test_refresh_relative_then_teleport() {
        let world = world_with(&[1]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::ZERO, &world, &transport)
            .unwrap();
        transport.drain();

        world.move_entity(EntityId(1), Vec3::new(0.1, 0.0, 0.0));
        manipulator.refresh_steady_state(&world, &transport).unwrap();
        let ops = transport.drain_for(CLIENT);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind(), OperationKind::Move);

        world.move_entity(EntityId(1), Vec3::new(10.0, 0.0, 0.0));
        manipulator.refresh_steady_state(&world, &transport).unwrap();
        let ops = transport.drain_for(CLIENT);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind(), OperationKind::Teleport);
    }

    #[test]
    fn test_refresh_static_entity_emits_nothing() {
        let world = world_with(&[1, 2]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        manipulator
            .reconcile_replicated(&ids(&[1, 2]), Vec3::new(5.0, 0.0, 5.0), &world, &transport)
            .unwrap();
        transport.drain();

        for _ in 0..3 {
            manipulator.refresh_steady_state(&world, &transport).unwrap();
        }
        assert!(transport.is_empty());
    }

    #[test]
    fn test_refresh_rotation_and_equipment() {
        let world = world_with(&[1]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::ZERO, &world, &transport)
            .unwrap();
        transport.drain();

        world.set_transform(EntityId(1), Transform::new(Vec3::new(1.0, 64.0, 0.0), 90.0, -45.0));
        let bow = ItemStack::new(839, 1);
        world.set_equipment(
            EntityId(1),
            Some(EquipmentLoadout::new().with(EquipmentSlot::MainHand, bow)),
        );

        manipulator.refresh_steady_state(&world, &transport).unwrap();
        assert_eq!(
            transport.drain_for(CLIENT),
            vec![
                Operation::RotateEntity {
                    entity: EntityId(1),
                    yaw: Angle(64),
                    pitch: Angle(224),
                },
                Operation::SetEquipment {
                    entity: EntityId(1),
                    slots: vec![(EquipmentSlot::MainHand, bow)],
                },
            ]
        );

        manipulator.refresh_steady_state(&world, &transport).unwrap();
        assert!(transport.is_empty());
    }

    #[test]
    fn test_refresh_offset_change_teleports() {
        let world = world_with(&[1]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::ZERO, &world, &transport)
            .unwrap();
        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::new(50.0, 0.0, 0.0), &world, &transport)
            .unwrap();
        transport.drain();

        manipulator.refresh_steady_state(&world, &transport).unwrap();
        let ops = transport.drain_for(CLIENT);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind(), OperationKind::Teleport);
        assert_eq!(
            manipulator.view_state(EntityId(1)).map(|s| s.position()),
            Some(Vec3::new(51.0, 64.0, 0.0))
        );
    }

    #[test]
    fn test_refresh_drops_vanished_entity() {
        let world = world_with(&[1]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator
            .reconcile_replicated(&ids(&[1]), Vec3::ZERO, &world, &transport)
            .unwrap();
        transport.drain();

        world.despawn_entity(EntityId(1));
        manipulator.refresh_steady_state(&world, &transport).unwrap();
        assert_eq!(
            transport.drain_for(CLIENT),
            vec![Operation::DestroyEntity { entity: EntityId(1) }]
        );
        assert!(manipulator.replicated_ids().is_empty());
    }

    #[test]
    fn test_transport_failure_is_surfaced_and_self_heals() {
        let world = world_with(&[1, 2, 3]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);

        transport.fail_after(1);
        let result = manipulator.reconcile_hidden(&ids(&[1, 2, 3]), &world, &transport);
        assert!(result.is_err());
        assert_eq!(manipulator.hidden(), &ids(&[1]));

        transport.recover();
        manipulator.reconcile_hidden(&ids(&[1, 2, 3]), &world, &transport).unwrap();
        assert_eq!(manipulator.hidden(), &ids(&[1, 2, 3]));
        assert_eq!(transport.counts().get(&OperationKind::Destroy), Some(&3));
    }

    #[test]
    fn test_reset_without_sending() {
        let world = world_with(&[1, 2]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator.reconcile_hidden(&ids(&[1]), &world, &transport).unwrap();
        manipulator
            .reconcile_replicated(&ids(&[2]), Vec3::ZERO, &world, &transport)
            .unwrap();
        transport.drain();

        manipulator.reset(false, &world, &transport).unwrap();
        assert!(transport.is_empty());
        assert!(manipulator.is_empty());
    }

    #[test]
    fn test_reset_with_sending_restores_everything() {
        let world = world_with(&[1, 2]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator.reconcile_hidden(&ids(&[1]), &world, &transport).unwrap();
        manipulator
            .reconcile_replicated(&ids(&[2]), Vec3::new(0.0, 10.0, 0.0), &world, &transport)
            .unwrap();
        transport.drain();

        manipulator.reset(true, &world, &transport).unwrap();
        assert_eq!(
            transport.drain_for(CLIENT),
            vec![
                Operation::SpawnEntity {
                    entity: EntityId(1),
                    transform: Transform::at(Vec3::new(1.0, 64.0, 0.0)),
                },
                Operation::DestroyEntity { entity: EntityId(2) },
            ]
        );
        assert!(manipulator.is_empty());
    }

    /// Despawned entities that still report their last transform
    struct StaleWorld {
        inner: InMemoryWorld,
        dead: BTreeSet<EntityId>,
    }

    impl WorldView for StaleWorld {
        fn rendered_state(&self, pos: crate::world::BlockPos) -> crate::world::RenderedBlockState {
            self.inner.rendered_state(pos)
        }

        fn authoritative_transform(&self, entity: EntityId) -> Option<Transform> {
            self.inner.authoritative_transform(entity)
        }

        fn equipment(&self, entity: EntityId) -> Option<EquipmentLoadout> {
            self.inner.equipment(entity)
        }

        fn is_valid(&self, entity: EntityId) -> bool {
            !self.dead.contains(&entity) && self.inner.is_valid(entity)
        }
    }

    #[test]
    fn test_invalid_entity_with_transform_is_never_spawned() {
        let mut world = StaleWorld {
            inner: world_with(&[1, 2]),
            dead: BTreeSet::new(),
        };
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator.reconcile_hidden(&ids(&[1]), &world, &transport).unwrap();
        transport.drain();

        world.dead.insert(EntityId(1));
        assert!(world.authoritative_transform(EntityId(1)).is_some());

        // Unhiding a dead entity forgets it without respawning
        manipulator.reconcile_hidden(&ids(&[]), &world, &transport).unwrap();
        assert!(manipulator.hidden().is_empty());
        assert!(transport.is_empty());

        // A dead entity is not replicated either
        manipulator
            .reconcile_replicated(&ids(&[1, 2]), Vec3::ZERO, &world, &transport)
            .unwrap();
        assert_eq!(manipulator.replicated_ids(), ids(&[2]));
        assert_eq!(transport.counts().get(&OperationKind::Spawn), Some(&1));
        transport.drain();

        // Dying while replicated destroys the ghost
        world.dead.insert(EntityId(2));
        manipulator.refresh_steady_state(&world, &transport).unwrap();
        assert_eq!(
            transport.drain_for(CLIENT),
            vec![Operation::DestroyEntity { entity: EntityId(2) }]
        );
        assert!(manipulator.is_empty());
    }

    #[test]
    fn test_failed_reset_keeps_unrestored_entries() {
        let world = world_with(&[1, 2, 3]);
        let transport = RecordingTransport::new();
        let mut manipulator = ClientViewManipulator::new(CLIENT);
        manipulator.reconcile_hidden(&ids(&[1, 2]), &world, &transport).unwrap();
        manipulator
            .reconcile_replicated(&ids(&[3]), Vec3::ZERO, &world, &transport)
            .unwrap();
        transport.drain();

        // Only the first respawn gets through
        transport.fail_after(1);
        assert!(manipulator.reset(true, &world, &transport).is_err());
        assert_eq!(manipulator.hidden(), &ids(&[2]));
        assert_eq!(manipulator.replicated_ids(), ids(&[3]));

        transport.recover();
        manipulator.reset(true, &world, &transport).unwrap();
        assert!(manipulator.is_empty());
        assert_eq!(
            transport.drain_for(CLIENT),
            vec![
                Operation::SpawnEntity {
                    entity: EntityId(1),
                    transform: Transform::at(Vec3::new(1.0, 64.0, 0.0)),
                },
                Operation::SpawnEntity {
                    entity: EntityId(2),
                    transform: Transform::at(Vec3::new(2.0, 64.0, 0.0)),
                },
                Operation::DestroyEntity { entity: EntityId(3) },
            ]
        );
    }
}
