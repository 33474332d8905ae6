//! Region diff scanner
//!
//! Scans a bounded box of blocks around a portal each tick and reports only
//! the cells whose rendered state changed since the previous scan. The scan
//! itself always costs O(volume); what leaves the scanner is O(changed).

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::world::{BlockPos, RenderedBlockState, WorldView};

/// Upper bound on either radius; keeps the per-tick scan volume small
pub const MAX_SCAN_RADIUS: i32 = 64;

/// A watched region and where it appears in the client's view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionWatch {
    /// Center of the scanned box in the source world
    pub center: BlockPos,
    /// Radius along X and Z (inclusive)
    pub radius_horizontal: i32,
    /// Radius along Y (inclusive)
    pub radius_vertical: i32,
    /// Offset added to source positions to place them in the client's view
    pub projection: BlockPos,
}

impl RegionWatch {
    /// Watch a region shown at its own position
    pub fn new(center: BlockPos, radius_horizontal: i32, radius_vertical: i32) -> Self {
        Self {
            center,
            radius_horizontal,
            radius_vertical,
            projection: BlockPos::ORIGIN,
        }
    }

    /// Set the projection offset
    pub fn with_projection(mut self, projection: BlockPos) -> Self {
        self.projection = projection;
        self
    }

    /// Number of cells scanned per tick
    pub fn volume(&self) -> usize {
        let h = (2 * clamp_radius(self.radius_horizontal) + 1) as usize;
        let v = (2 * clamp_radius(self.radius_vertical) + 1) as usize;
        h * h * v
    }
}

fn clamp_radius(radius: i32) -> i32 {
    radius.clamp(0, MAX_SCAN_RADIUS)
}

/// Remembers what every watched cell looked like at the last scan
#[derive(Debug, Default)]
pub struct RegionDiffScanner {
    /// Last observed state per position; absence means "never observed"
    snapshot: HashMap<BlockPos, RenderedBlockState>,
    /// Region of the previous scan, used to prune stale entries
    last_region: Option<(BlockPos, i32, i32)>,
    /// Total cells visited over the scanner's lifetime
    cells_scanned: u64,
    /// Wall time of the most recent scan
    last_scan_duration: Option<Duration>,
}

impl RegionDiffScanner {
    /// Create a scanner with an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a region and return the cells whose state changed.
    ///
    /// Every returned cell is also written into the snapshot, so an
    /// immediate second scan with no world change returns nothing.
    pub fn scan<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        center: BlockPos,
        radius_horizontal: i32,
        radius_vertical: i32,
    ) -> BTreeMap<BlockPos, RenderedBlockState> {
        let started = Instant::now();
        let rh = clamp_radius(radius_horizontal);
        let rv = clamp_radius(radius_vertical);
        if rh != radius_horizontal || rv != radius_vertical {
            debug!(
                requested_horizontal = radius_horizontal,
                requested_vertical = radius_vertical,
                radius_horizontal = rh,
                radius_vertical = rv,
                "Scan radius clamped"
            );
        }
        self.prune_if_moved(center, rh, rv);

        let mut changes = BTreeMap::new();
        for dx in -rh..=rh {
            for dz in -rh..=rh {
                for dy in -rv..=rv {
                    let pos = center.offset(dx, dy, dz);
                    let current = world.rendered_state(pos);

                    if self.snapshot.get(&pos) != Some(&current) {
                        changes.insert(pos, current);
                        self.snapshot.insert(pos, current);
                    }
                }
            }
        }

        let volume = ((2 * rh + 1) * (2 * rh + 1) * (2 * rv + 1)) as u64;
        self.cells_scanned += volume;
        let elapsed = started.elapsed();
        self.last_scan_duration = Some(elapsed);

        if !changes.is_empty() {
            debug!(
                center = %center,
                volume = volume,
                changed = changes.len(),
                elapsed_us = elapsed.as_micros() as u64,
                "Region scan found changes"
            );
        } else {
            trace!(
                center = %center,
                volume = volume,
                elapsed_us = elapsed.as_micros() as u64,
                "Region scan unchanged"
            );
        }

        changes
    }

    /// Scan a watched region, returning changes at their source positions
    pub fn scan_region<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        region: &RegionWatch,
    ) -> BTreeMap<BlockPos, RenderedBlockState> {
        self.scan(
            world,
            region.center,
            region.radius_horizontal,
            region.radius_vertical,
        )
    }

    /// State recorded for a position at the last scan
    pub fn snapshot_state(&self, pos: BlockPos) -> Option<RenderedBlockState> {
        self.snapshot.get(&pos).copied()
    }

    /// Number of remembered cells
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Check if nothing has been observed yet
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Total cells visited so far
    pub fn cells_scanned(&self) -> u64 {
        self.cells_scanned
    }

    /// How long the most recent scan took; `None` before the first scan
    pub fn last_scan_duration(&self) -> Option<Duration> {
        self.last_scan_duration
    }

    /// Forget everything; the next scan reports every cell
    pub fn clear(&mut self) {
        self.snapshot.clear();
        self.last_region = None;
    }

    /// Drop remembered cells that fall outside a new region
    fn prune_if_moved(&mut self, center: BlockPos, rh: i32, rv: i32) {
        let region = (center, rh, rv);
        if self.last_region == Some(region) {
            return;
        }
        if self.last_region.is_some() {
            let before = self.snapshot.len();
            self.snapshot.retain(|pos, _| pos.within_box(&center, rh, rv));
            trace!(
                center = %center,
                pruned = before - self.snapshot.len(),
                "Watched region moved"
            );
        }
        self.last_region = Some(region);
    }
}
