//! Portal View Sync Library
//!
//! Keeps each client's view of the far side of a portal consistent with the
//! authoritative world, by sending block overrides and hiding, spawning and
//! moving entity ghosts.
//!
//! ## Modules
//!
//! - `config` - Engine configuration management
//! - `error` - Error types and result definitions
//! - `net` - Transports and session management
//! - `protocol` - Client-bound view operations
//! - `scheduler` - Fixed-rate tick loop over all sessions
//! - `sync` - Block diffing and entity view reconciliation
//! - `world` - World model and the authoritative world interface

pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod scheduler;
pub mod sync;
pub mod world;

// Re-export commonly used types
pub use config::ViewSyncConfig;
pub use error::{Result, SessionError, TransportError, ViewSyncError};
pub use net::{ChannelTransport, RecordingTransport, SessionManager, Transport};
pub use protocol::{Operation, OperationKind};
pub use scheduler::{SchedulerTick, ViewPlanner, ViewSyncScheduler};
pub use sync::{ClientViewManipulator, ClientViewSession, RegionDiffScanner, RegionWatch, ViewPlan};
pub use world::{ClientId, EntityId, InMemoryWorld, PortalId, WorldView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
