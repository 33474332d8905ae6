//! Session management module
//!
//! Thread-safe registry of client view sessions. Each session sits behind its
//! own mutex so different clients can be ticked in parallel while all work
//! for one client stays serialized.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::ViewSyncConfig;
use crate::error::{Result, SessionError};
use crate::net::transport::Transport;
use crate::sync::session::ClientViewSession;
use crate::world::{ClientId, WorldView};

/// Shared handle to one client's session
pub type SessionHandle = Arc<Mutex<ClientViewSession>>;

/// Registry of all client view sessions
#[derive(Debug)]
pub struct SessionManager {
    /// Map of client to session
    sessions: DashMap<ClientId, SessionHandle>,
    /// Settings applied to new sessions
    config: ViewSyncConfig,
}

impl SessionManager {
    /// Create a session manager with default settings
    pub fn new() -> Self {
        Self::with_config(ViewSyncConfig::default())
    }

    /// Create a session manager whose sessions use `config`
    pub fn with_config(config: ViewSyncConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Register a client, or restart its session on relogin.
    ///
    /// A relogin discards the previous bookkeeping without sending anything:
    /// the freshly loaded client holds none of the old overrides.
    pub fn start(&self, client: ClientId) -> SessionHandle {
        if let Some(existing) = self.sessions.get(&client) {
            let handle = Arc::clone(existing.value());
            drop(existing);
            handle.lock().on_session_start();
            debug!(client = %client, "View session restarted");
            return handle;
        }

        let handle = Arc::new(Mutex::new(ClientViewSession::new(client, &self.config)));
        self.sessions.insert(client, Arc::clone(&handle));
        info!(client = %client, sessions = self.sessions.len(), "View session registered");
        handle
    }

    /// End and unregister a client's session
    pub fn end(&self, client: ClientId) -> Result<()> {
        let (_, handle) = self
            .sessions
            .remove(&client)
            .ok_or(SessionError::NotFound(client))?;
        handle.lock().on_session_end();
        Ok(())
    }

    /// Reset a client's overrides, optionally restoring the real view first
    pub fn reset<W, T>(
        &self,
        client: ClientId,
        send_operations: bool,
        world: &W,
        transport: &T,
    ) -> Result<()>
    where
        W: WorldView + ?Sized,
        T: Transport + ?Sized,
    {
        let handle = self.get(client).ok_or(SessionError::NotFound(client))?;
        let mut session = handle.lock();
        session.on_session_reset(send_operations, world, transport)
    }

    /// Get a session by client
    pub fn get(&self, client: ClientId) -> Option<SessionHandle> {
        self.sessions.get(&client).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a client has a session
    pub fn contains(&self, client: ClientId) -> bool {
        self.sessions.contains_key(&client)
    }

    /// All registered clients, in ascending order
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no session is registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Settings applied to new sessions
    pub fn config(&self) -> &ViewSyncConfig {
        &self.config
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
