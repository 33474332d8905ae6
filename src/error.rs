//! Error handling module
//!
//! Defines custom error types for the view synchronization engine.

use thiserror::Error;

use crate::world::ClientId;

/// Main error type for the view synchronization engine
#[derive(Error, Debug)]
pub enum ViewSyncError {
    /// Delivering an operation to a client failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Transport-specific errors
///
/// The core never retries on these; they are surfaced to the caller of the
/// operation that tried to emit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Client {0} is disconnected")]
    Disconnected(ClientId),

    #[error("Outbound queue full for client {0}")]
    QueueFull(ClientId),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Session-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found for client {0}")]
    NotFound(ClientId),

    #[error("Session for client {0} has ended")]
    Ended(ClientId),
}

impl ViewSyncError {
    /// Whether this error means the client can no longer receive anything
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ViewSyncError::Transport(TransportError::Disconnected(_))
                | ViewSyncError::Session(SessionError::Ended(_))
        )
    }
}

/// Result type alias for view sync operations
pub type Result<T> = std::result::Result<T, ViewSyncError>;
