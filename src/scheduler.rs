//! View sync scheduler
//!
//! Drives every registered session once per tick:
//! - Asks the planner for each client's desired view
//! - Ticks sessions, in parallel across clients when enabled
//! - Ends sessions whose client turned out to be disconnected

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ViewSyncConfig;
use crate::error::Result;
use crate::net::session::SessionManager;
use crate::net::transport::Transport;
use crate::sync::session::{TickReport, ViewPlan};
use crate::world::{ClientId, WorldView};

/// Decides what each client should currently see
pub trait ViewPlanner: Send + Sync {
    /// Desired view of a client; `None` when no portal is in view
    fn plan(&self, client: ClientId) -> Option<ViewPlan>;
}

impl<F> ViewPlanner for F
where
    F: Fn(ClientId) -> Option<ViewPlan> + Send + Sync,
{
    fn plan(&self, client: ClientId) -> Option<ViewPlan> {
        self(client)
    }
}

/// Totals for one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerTick {
    pub tick: u64,
    pub sessions: usize,
    pub operations: u64,
    pub failures: usize,
    /// Clients whose session was ended because they disconnected
    pub ended: Vec<ClientId>,
}

/// Runs the per-client view sync on a fixed interval
pub struct ViewSyncScheduler<W, T, P> {
    world: Arc<W>,
    transport: Arc<T>,
    planner: P,
    sessions: Arc<SessionManager>,
    config: ViewSyncConfig,
    tick: AtomicU64,
    running: AtomicBool,
}

impl<W, T, P> ViewSyncScheduler<W, T, P>
where
    W: WorldView,
    T: Transport,
    P: ViewPlanner,
{
    /// Create a scheduler over a shared session registry
    pub fn new(
        world: Arc<W>,
        transport: Arc<T>,
        planner: P,
        sessions: Arc<SessionManager>,
        config: ViewSyncConfig,
    ) -> Self {
        Self {
            world,
            transport,
            planner,
            sessions,
            config,
            tick: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// Session registry driven by this scheduler
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Check if the tick loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the tick loop after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Tick every registered session once
    pub fn tick_once(&self) -> SchedulerTick {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        let clients = self.sessions.client_ids();

        let results: Vec<(ClientId, Result<TickReport>)> = if self.config.parallel_sessions {
            clients
                .par_iter()
                .map(|&client| (client, self.tick_client(client)))
                .collect()
        } else {
            clients
                .iter()
                .map(|&client| (client, self.tick_client(client)))
                .collect()
        };

        let mut summary = SchedulerTick {
            tick,
            sessions: clients.len(),
            ..Default::default()
        };

        for (client, result) in results {
            match result {
                Ok(report) => summary.operations += report.operations,
                Err(e) if e.is_disconnect() => {
                    debug!(client = %client, error = %e, "Client gone, ending view session");
                    summary.ended.push(client);
                }
                Err(e) => {
                    warn!(client = %client, error = %e, "View sync failed for client");
                    summary.failures += 1;
                }
            }
        }

        for &client in &summary.ended {
            if let Err(e) = self.sessions.end(client) {
                debug!(client = %client, error = %e, "Session already removed");
            }
        }

        if tick % 1000 == 0 {
            debug!(
                tick = tick,
                sessions = summary.sessions,
                operations = summary.operations,
                "View sync tick milestone"
            );
        }

        summary
    }

    fn tick_client(&self, client: ClientId) -> Result<TickReport> {
        let Some(handle) = self.sessions.get(client) else {
            // Ended between listing and ticking
            return Ok(TickReport::default());
        };
        let plan = self.planner.plan(client).unwrap_or_default();
        let mut session = handle.lock();
        session.tick(&plan, self.world.as_ref(), self.transport.as_ref())
    }

    /// Run the tick loop until shutdown is signalled
    pub async fn run(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        info!(
            tick_rate_ms = self.config.tick_rate_ms,
            parallel = self.config.parallel_sessions,
            "Starting view sync scheduler"
        );

        self.running.store(true, Ordering::SeqCst);
        let started = Instant::now();

        let mut tick_interval = interval(Duration::from_millis(self.config.tick_rate_ms));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if !self.is_running() {
                        break;
                    }

                    let summary = self.tick_once();
                    if summary.failures > 0 {
                        error!(
                            tick = summary.tick,
                            failures = summary.failures,
                            "View sync tick had failures"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            total_ticks = self.tick_count(),
            uptime_secs = started.elapsed().as_secs(),
            "View sync scheduler stopped"
        );
    }
}
