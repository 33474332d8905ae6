//! Networking module
//!
//! The client-facing side of the engine:
//! - Transport abstraction and the bundled transports
//! - Session registry and lifecycle

pub mod session;
pub mod transport;

pub use session::{SessionHandle, SessionManager};
pub use transport::{ChannelTransport, RecordingTransport, Transport};
