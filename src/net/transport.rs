//! Transport abstraction module
//!
//! The engine hands every `Operation` to a `Transport`. Delivery is assumed
//! reliable and in emission order per client; retry policy, if any, belongs
//! to the implementation, never to the engine.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::protocol::{Operation, OperationKind};
use crate::world::ClientId;

/// Sink for operations addressed to clients
pub trait Transport: Send + Sync {
    /// Deliver one operation to one client
    fn emit(&self, client: ClientId, operation: Operation) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn emit(&self, client: ClientId, operation: Operation) -> Result<(), TransportError> {
        (**self).emit(client, operation)
    }
}

/// Transport that records everything it is given
///
/// Can be told to start failing after a number of successful emits.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ClientId, Operation)>>,
    fail_after: Mutex<Option<usize>>,
}

impl RecordingTransport {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every emit once `count` more operations have been accepted
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock() = Some(count);
    }

    /// Stop failing
    pub fn recover(&self) {
        *self.fail_after.lock() = None;
    }

    /// Take and clear everything recorded so far
    pub fn drain(&self) -> Vec<(ClientId, Operation)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Take and clear the recorded operations for one client
    pub fn drain_for(&self, client: ClientId) -> Vec<Operation> {
        let mut sent = self.sent.lock();
        let (mine, rest): (Vec<_>, Vec<_>) = sent.drain(..).partition(|(c, _)| *c == client);
        *sent = rest;
        mine.into_iter().map(|(_, op)| op).collect()
    }

    /// Number of operations recorded so far
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    /// Count of recorded operations by kind
    pub fn counts(&self) -> HashMap<OperationKind, usize> {
        let mut counts = HashMap::new();
        for (_, op) in self.sent.lock().iter() {
            *counts.entry(op.kind()).or_insert(0) += 1;
        }
        counts
    }
}

impl Transport for RecordingTransport {
    fn emit(&self, client: ClientId, operation: Operation) -> Result<(), TransportError> {
        {
            let mut fail_after = self.fail_after.lock();
            if let Some(remaining) = fail_after.as_mut() {
                if *remaining == 0 {
                    return Err(TransportError::DeliveryFailed(format!(
                        "recording transport refused {}",
                        operation.kind()
                    )));
                }
                *remaining -= 1;
            }
        }
        trace!(client = %client, kind = %operation.kind(), "Recorded operation");
        self.sent.lock().push((client, operation));
        Ok(())
    }
}

/// Transport backed by one bounded outbound queue per client
///
/// A transport adapter drains each receiver and encodes the operations for
/// the client's protocol version.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: DashMap<ClientId, mpsc::Sender<Operation>>,
    capacity: usize,
}

impl ChannelTransport {
    /// Create a transport whose queues hold `capacity` operations
    pub fn new(capacity: usize) -> Self {
        Self {
            outbound: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Open the outbound queue for a client, replacing any previous one
    pub fn connect(&self, client: ClientId) -> mpsc::Receiver<Operation> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.outbound.insert(client, tx).is_some() {
            debug!(client = %client, "Replaced existing outbound queue");
        }
        rx
    }

    /// Close the outbound queue for a client
    pub fn disconnect(&self, client: ClientId) {
        self.outbound.remove(&client);
    }

    /// Check if a client has an open queue
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.outbound
            .get(&client)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

impl Transport for ChannelTransport {
    fn emit(&self, client: ClientId, operation: Operation) -> Result<(), TransportError> {
        let tx = self
            .outbound
            .get(&client)
            .ok_or(TransportError::Disconnected(client))?;

        match tx.try_send(operation) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(client = %client, "Outbound queue full");
                Err(TransportError::QueueFull(client))
            }
            Err(TrySendError::Closed(_)) => Err(TransportError::Disconnected(client)),
        }
    }
}
