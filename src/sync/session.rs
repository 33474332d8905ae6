//! Client view session
//!
//! Everything one client has been told about the far side of its active
//! portal: overridden blocks, hidden and replicated entities. A session runs
//! one ordered tick per scheduler cycle:
//! 1. Reset if the active portal changed
//! 2. Scan the watched region and send changed blocks
//! 3. Reconcile hidden entities
//! 4. Reconcile replicated entities
//! 5. Refresh steady-state replicated entities
//!
//! Steps 3 to 5 are skipped for a grace period after the client (re)loads
//! its world.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace};

use crate::config::ViewSyncConfig;
use crate::error::{Result, SessionError};
use crate::net::transport::Transport;
use crate::protocol::Operation;
use crate::world::{BlockPos, ClientId, EntityId, PortalId, RenderedBlockState, Vec3, WorldView};

use super::manipulator::ClientViewManipulator;
use super::region_scanner::{RegionDiffScanner, RegionWatch};
use super::stats::SyncStats;

/// Desired view of one client for one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewPlan {
    /// Portal currently rendered, `None` when no portal is in view
    pub portal: Option<PortalId>,
    /// Region of blocks to mirror through the portal
    pub region: Option<RegionWatch>,
    /// Entities that must be invisible to the client
    pub hidden: BTreeSet<EntityId>,
    /// Entities to replicate into the client's view
    pub replicated: BTreeSet<EntityId>,
    /// Offset from source entity positions to the client's view
    pub entity_offset: Vec3,
}

impl ViewPlan {
    /// Plan for a client looking through a portal
    pub fn through(portal: PortalId) -> Self {
        Self {
            portal: Some(portal),
            ..Default::default()
        }
    }

    /// Plan for a client with no portal in view
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Set the watched region
    pub fn with_region(mut self, region: RegionWatch) -> Self {
        self.region = Some(region);
        self
    }

    /// Set the hidden entities
    pub fn with_hidden(mut self, hidden: impl IntoIterator<Item = EntityId>) -> Self {
        self.hidden = hidden.into_iter().collect();
        self
    }

    /// Set the replicated entities and their offset
    pub fn with_replicated(
        mut self,
        replicated: impl IntoIterator<Item = EntityId>,
        offset: Vec3,
    ) -> Self {
        self.replicated = replicated.into_iter().collect();
        self.entity_offset = offset;
        self
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Receiving ticks
    Active,
    /// Client gone; nothing may be sent
    Ended,
}

/// Outcome of one session tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Whether the session was reset before applying the plan
    pub reset: bool,
    /// Block overrides sent this tick
    pub blocks_sent: usize,
    /// Whether the entity phase was skipped after a world load
    pub entities_suppressed: bool,
    /// Operations delivered this tick
    pub operations: u64,
}

/// Per-client view synchronization state
#[derive(Debug)]
pub struct ClientViewSession {
    client: ClientId,
    phase: SessionPhase,
    manipulator: ClientViewManipulator,
    scanner: RegionDiffScanner,
    /// Portal rendered at the last tick
    active_portal: Option<PortalId>,
    /// Block overrides sent to the client, at client-view positions
    ghost_blocks: BTreeMap<BlockPos, RenderedBlockState>,
    load_grace_ticks: u32,
    grace_remaining: u32,
}

impl ClientViewSession {
    /// Create and start a session for a client
    pub fn new(client: ClientId, config: &ViewSyncConfig) -> Self {
        let mut session = Self {
            client,
            phase: SessionPhase::Active,
            manipulator: ClientViewManipulator::with_threshold(
                client,
                config.relative_move_threshold,
            ),
            scanner: RegionDiffScanner::new(),
            active_portal: None,
            ghost_blocks: BTreeMap::new(),
            load_grace_ticks: config.load_grace_ticks,
            grace_remaining: 0,
        };
        session.on_session_start();
        session
    }

    /// Client this session belongs to
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Portal rendered at the last tick
    pub fn active_portal(&self) -> Option<PortalId> {
        self.active_portal
    }

    /// Entity bookkeeping
    pub fn manipulator(&self) -> &ClientViewManipulator {
        &self.manipulator
    }

    /// Block overrides currently believed to be on the client
    pub fn ghost_blocks(&self) -> &BTreeMap<BlockPos, RenderedBlockState> {
        &self.ghost_blocks
    }

    /// Counters for this session
    pub fn stats(&self) -> &SyncStats {
        self.manipulator.stats()
    }

    /// Check if no block or entity override is tracked
    pub fn is_clear(&self) -> bool {
        self.ghost_blocks.is_empty() && self.manipulator.is_empty() && self.scanner.is_empty()
    }

    /// Login or relogin: forget everything and hold back entity packets
    /// until the client has loaded its world.
    pub fn on_session_start(&mut self) {
        self.clear_state();
        self.phase = SessionPhase::Active;
        self.grace_remaining = self.load_grace_ticks;
        debug!(client = %self.client, grace_ticks = self.load_grace_ticks, "View session started");
    }

    /// Reset block and entity overrides.
    ///
    /// With `send_operations`, blocks whose sent state differs from the
    /// current authoritative state are restored and every hidden or
    /// replicated entity is put back; otherwise the bookkeeping is just
    /// discarded. If a restore cannot be delivered, the overrides still on
    /// the client stay tracked along with the active portal, so the next
    /// tick retries the reset.
    pub fn on_session_reset<W, T>(&mut self, send_operations: bool, world: &W, transport: &T) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        if send_operations && self.phase == SessionPhase::Active {
            let restored = self
                .restore_blocks(world, transport)
                .and_then(|_| self.manipulator.reset(true, world, transport));
            if let Err(e) = restored {
                debug!(
                    client = %self.client,
                    error = %e,
                    ghost_blocks = self.ghost_blocks.len(),
                    hidden = self.manipulator.hidden().len(),
                    "View session reset incomplete"
                );
                return Err(e);
            }
        }

        self.clear_state();
        debug!(
            client = %self.client,
            send_operations = send_operations,
            "View session reset"
        );
        Ok(())
    }

    /// Client disconnected: discard everything, send nothing
    pub fn on_session_end(&mut self) {
        self.clear_state();
        self.phase = SessionPhase::Ended;
        info!(
            client = %self.client,
            operations = self.stats().operations(),
            ticks = self.stats().ticks,
            "View session ended"
        );
    }

    /// Run one ordered tick against a plan
    pub fn tick<W, T>(&mut self, plan: &ViewPlan, world: &W, transport: &T) -> Result<TickReport>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        if self.phase == SessionPhase::Ended {
            return Err(SessionError::Ended(self.client).into());
        }

        let before = self.stats().operations();
        let mut report = TickReport::default();
        self.manipulator.stats_mut().ticks += 1;

        if plan.portal != self.active_portal {
            if self.active_portal.is_some() {
                debug!(
                    client = %self.client,
                    from = ?self.active_portal,
                    to = ?plan.portal,
                    "Active portal changed"
                );
                self.on_session_reset(true, world, transport)?;
                report.reset = true;
            }
            self.active_portal = plan.portal;
        }

        if plan.portal.is_some() {
            if let Some(region) = &plan.region {
                report.blocks_sent = self.sync_blocks(region, world, transport)?;
            }

            if self.grace_remaining > 0 {
                self.grace_remaining -= 1;
                self.manipulator.stats_mut().suppressed_ticks += 1;
                report.entities_suppressed = true;
                trace!(client = %self.client, "Entity packets suppressed after world load");
            } else {
                self.manipulator
                    .reconcile_hidden(&plan.hidden, world, transport)?;
                self.manipulator.reconcile_replicated(
                    &plan.replicated,
                    plan.entity_offset,
                    world,
                    transport,
                )?;
                self.manipulator.refresh_steady_state(world, transport)?;
            }
        }

        report.operations = self.stats().operations() - before;
        Ok(report)
    }

    /// Scan the region and send changed cells at their projected positions
    fn sync_blocks<W, T>(&mut self, region: &RegionWatch, world: &W, transport: &T) -> Result<usize>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        let changes = self.scanner.scan_region(world, region);
        if changes.is_empty() {
            return Ok(0);
        }

        let projected: BTreeMap<BlockPos, RenderedBlockState> = changes
            .into_iter()
            .map(|(pos, state)| (pos + region.projection, state))
            .collect();
        let count = projected.len();

        if let Err(e) = transport.emit(self.client, Operation::BlockChanges(projected.clone())) {
            // The client never got these; make the next scan report them again
            self.scanner.clear();
            return Err(e.into());
        }

        let stats = self.manipulator.stats_mut();
        stats.record(crate::protocol::OperationKind::BlockChanges);
        stats.blocks_sent += count as u64;
        self.ghost_blocks.extend(projected);
        trace!(client = %self.client, blocks = count, "Ghost blocks sent");
        Ok(count)
    }

    /// Send authoritative states for every overridden block that differs
    fn restore_blocks<W, T>(&mut self, world: &W, transport: &T) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        let restore: BTreeMap<BlockPos, RenderedBlockState> = self
            .ghost_blocks
            .iter()
            .filter_map(|(&pos, &sent)| {
                let actual = world.rendered_state(pos);
                (actual != sent).then_some((pos, actual))
            })
            .collect();

        if !restore.is_empty() {
            let count = restore.len();
            transport.emit(self.client, Operation::BlockChanges(restore))?;
            let stats = self.manipulator.stats_mut();
            stats.record(crate::protocol::OperationKind::BlockChanges);
            stats.blocks_sent += count as u64;
            debug!(client = %self.client, blocks = count, "Restored ghost blocks");
        }

        // The client shows the real blocks again; a later scan must resend
        self.ghost_blocks.clear();
        self.scanner.clear();
        Ok(())
    }

    fn clear_state(&mut self) {
        self.manipulator.clear();
        self.scanner.clear();
        self.ghost_blocks.clear();
        self.active_portal = None;
    }
}
