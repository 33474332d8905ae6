//! View synchronization module
//!
//! Keeps each client's view of a portal's far side consistent with the
//! authoritative world:
//! - `region_scanner` - changed-block detection around a portal
//! - `view_state` - last-sent view of a replicated entity
//! - `manipulator` - hidden and replicated entity reconciliation
//! - `session` - per-client tick driver and lifecycle hooks

pub mod manipulator;
pub mod region_scanner;
pub mod session;
pub mod stats;
pub mod update_flags;
pub mod view_state;

pub use manipulator::ClientViewManipulator;
pub use region_scanner::{RegionDiffScanner, RegionWatch, MAX_SCAN_RADIUS};
pub use session::{ClientViewSession, SessionPhase, TickReport, ViewPlan};
pub use stats::SyncStats;
pub use update_flags::ViewUpdateFlags;
pub use view_state::{EntityViewDelta, EntityViewState, Movement, RELATIVE_MOVE_THRESHOLD};
