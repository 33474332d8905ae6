//! Portal View Sync demo
//!
//! Runs the view sync engine against an in-memory world with one portal, one
//! client and a wandering entity, logging every operation the client would
//! receive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use portal_view_sync::config::ViewSyncConfig;
use portal_view_sync::net::{ChannelTransport, SessionManager};
use portal_view_sync::protocol::Operation;
use portal_view_sync::scheduler::ViewSyncScheduler;
use portal_view_sync::sync::{RegionWatch, ViewPlan};
use portal_view_sync::world::{
    BlockPos, ClientId, EntityId, EquipmentLoadout, EquipmentSlot, InMemoryWorld, ItemStack,
    PortalId, RenderedBlockState, Transform, Vec3,
};
use portal_view_sync::VERSION;

const DEMO_CLIENT: ClientId = ClientId(1);
const DEMO_PORTAL: PortalId = PortalId(1);
/// Entity standing in front of the portal on the client's side
const BLOCKER: EntityId = EntityId(100);
/// Entity wandering on the far side
const WANDERER: EntityId = EntityId(200);

/// Far-side portal center
const FAR_SIDE: BlockPos = BlockPos::new(1000, 64, 0);

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!(version = VERSION, "Portal view sync demo starting");

    let config = ViewSyncConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let world = Arc::new(demo_world());
    let transport = Arc::new(ChannelTransport::new(config.outbound_queue_capacity));
    let sessions = Arc::new(SessionManager::with_config(config.clone()));

    let outbound = transport.connect(DEMO_CLIENT);
    sessions.start(DEMO_CLIENT);
    let drain_handle = tokio::spawn(drain_operations(DEMO_CLIENT, outbound));

    let radius_horizontal = config.radius_horizontal;
    let radius_vertical = config.radius_vertical;
    let planner = move |_client: ClientId| {
        Some(
            ViewPlan::through(DEMO_PORTAL)
                .with_region(
                    RegionWatch::new(FAR_SIDE, radius_horizontal, radius_vertical)
                        .with_projection(BlockPos::new(-FAR_SIDE.x, 0, 0)),
                )
                .with_hidden([BLOCKER])
                .with_replicated([WANDERER], Vec3::new(-(FAR_SIDE.x as f64), 0.0, 0.0)),
        )
    };

    let scheduler = Arc::new(ViewSyncScheduler::new(
        Arc::clone(&world),
        Arc::clone(&transport),
        planner,
        Arc::clone(&sessions),
        config.clone(),
    ));

    let runner = Arc::clone(&scheduler);
    let mut scheduler_shutdown_rx = shutdown_tx.subscribe();
    let scheduler_handle = tokio::spawn(async move {
        runner.run(&mut scheduler_shutdown_rx).await;
    });

    let wander_world = Arc::clone(&world);
    let mut wander_shutdown_rx = shutdown_tx.subscribe();
    let wander_handle = tokio::spawn(async move {
        wander(wander_world, config.tick_interval() * 4, &mut wander_shutdown_rx).await;
    });

    info!("Demo running, press Ctrl+C to stop");
    wait_for_shutdown(shutdown_tx.clone()).await;

    let _ = scheduler_handle.await;
    let _ = wander_handle.await;

    if let Some(handle) = sessions.get(DEMO_CLIENT) {
        let session = handle.lock();
        info!(
            operations = session.stats().operations(),
            blocks = session.stats().blocks_sent,
            moves = session.stats().moves,
            teleports = session.stats().teleports,
            "Final session stats"
        );
    }
    if let Err(e) = sessions.end(DEMO_CLIENT) {
        error!(error = %e, "Failed to end demo session");
    }
    transport.disconnect(DEMO_CLIENT);
    let _ = drain_handle.await;

    info!("Demo shutdown complete");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,portal_view_sync=debug"));

    if std::env::var("PORTAL_VIEW_LOG_JSON").is_ok() {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .init();
    }
}

/// Build the demo world: a pillar and a wandering entity on the far side,
/// an entity blocking the portal on the near side
fn demo_world() -> InMemoryWorld {
    let world = InMemoryWorld::new();

    for y in 64..68 {
        world.set_block(FAR_SIDE.offset(2, y - 64, 2), RenderedBlockState::of(1));
    }

    world.spawn_entity(
        BLOCKER,
        Transform::at(Vec3::new(0.5, 64.0, 0.5)),
        None,
    );
    world.spawn_entity(
        WANDERER,
        Transform::at(Vec3::new(FAR_SIDE.x as f64 + 0.5, 64.0, 0.5)),
        Some(EquipmentLoadout::new().with(EquipmentSlot::Head, ItemStack::new(310, 1))),
    );

    world
}

/// Move the wanderer in a slow circle, with an occasional long jump and a
/// torch that toggles on the pillar
async fn wander(
    world: Arc<InMemoryWorld>,
    period: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    let mut step: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                step = step.wrapping_add(1);
                let angle = (step % 72) as f64 * 5.0;
                let radians = angle.to_radians();

                let mut position = Vec3::new(
                    FAR_SIDE.x as f64 + 0.5 + 3.0 * radians.cos(),
                    64.0,
                    0.5 + 3.0 * radians.sin(),
                );
                if step % 50 == 0 {
                    position.z += 12.0;
                }
                world.set_transform(WANDERER, Transform::new(position, angle as f32, 0.0));

                let torch = if step % 20 < 10 {
                    RenderedBlockState::of(50)
                } else {
                    RenderedBlockState::AIR
                };
                world.set_block(FAR_SIDE.offset(2, 4, 2), torch);
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }
}

/// Log everything the client would receive
async fn drain_operations(client: ClientId, mut outbound: mpsc::Receiver<Operation>) {
    while let Some(operation) = outbound.recv().await {
        match &operation {
            Operation::BlockChanges(blocks) => {
                debug!(client = %client, kind = %operation.kind(), blocks = blocks.len(), "Operation");
            }
            other => {
                debug!(client = %client, kind = %other.kind(), entity = ?other.entity(), "Operation");
            }
        }
    }
    debug!(client = %client, "Outbound queue closed");
}

/// Wait for Ctrl+C or SIGTERM, then signal every task
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    let _ = shutdown_tx.send(());
}
