//! Per-session synchronization counters

use crate::protocol::OperationKind;

/// Running totals of what a session has sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub ticks: u64,
    /// Ticks whose entity phase was skipped after a world load
    pub suppressed_ticks: u64,
    pub block_batches: u64,
    /// Individual block overrides across all batches
    pub blocks_sent: u64,
    pub spawns: u64,
    pub destroys: u64,
    pub moves: u64,
    pub teleports: u64,
    pub rotations: u64,
    pub equipment_updates: u64,
}

impl SyncStats {
    /// Count one delivered operation
    pub fn record(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::BlockChanges => self.block_batches += 1,
            OperationKind::Spawn => self.spawns += 1,
            OperationKind::Destroy => self.destroys += 1,
            OperationKind::Move => self.moves += 1,
            OperationKind::Teleport => self.teleports += 1,
            OperationKind::Rotate => self.rotations += 1,
            OperationKind::Equipment => self.equipment_updates += 1,
        }
    }

    /// Total operations delivered
    pub fn operations(&self) -> u64 {
        self.block_batches
            + self.spawns
            + self.destroys
            + self.moves
            + self.teleports
            + self.rotations
            + self.equipment_updates
    }
}
