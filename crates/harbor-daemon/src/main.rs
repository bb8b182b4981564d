//! harbor-daemon: a local Harbor vault node.
//!
//! Single OS process running a Tokio async runtime. The node deploys (or
//! restores) one vault with its reward token, simulated lending market and
//! price feed, and serves JSON-RPC over a Unix socket in the data directory.
//!
//! ## Modules
//!
//! - `clock` — Wall-clock source
//! - `commands` — RPC command handlers
//! - `config` — `config.toml` loading
//! - `events` — Event bus for live subscribers
//! - `node` — Deployment wiring, persistence and the node facade
//! - `rpc` — JSON-RPC framing and dispatch

mod clock;
mod commands;
mod config;
mod events;
mod node;
mod rpc;

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::HarborConfig;
use crate::events::{EventBus, EVENT_BUFFER};
use crate::node::Harbor;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
///
/// Handlers lock `node` before `db`, never the other way round.
pub struct DaemonState {
    /// The vault node. One operation at a time.
    pub node: Mutex<Harbor>,
    /// Database connection.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: HarborConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Time source.
    pub clock: Clock,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Restore or deploy the node backed by `conn`.
    ///
    /// # Errors
    ///
    /// Any [`node::NodeError`] from loading or deploying.
    pub fn new(
        config: HarborConfig,
        conn: rusqlite::Connection,
        clock: Clock,
    ) -> node::Result<Self> {
        let node = Harbor::load_or_deploy(&config, &conn, &clock)?;
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Ok(Self {
            node: Mutex::new(node),
            db: Arc::new(Mutex::new(conn)),
            config,
            event_bus: EventBus::new(EVENT_BUFFER),
            clock,
            shutdown_tx,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = HarborConfig::load()?;

    // 2. Initialize tracing; RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!("harbor={}", config.advanced.log_level))
    })?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Harbor daemon starting");

    // Ensure data directory exists
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database and restore or deploy the node
    let db_path = data_dir.join("harbor.db");
    let conn = harbor_db::open(&db_path)?;
    let state = Arc::new(DaemonState::new(config, conn, clock::system())?);
    {
        let node = state.node.lock().await;
        info!(
            vault = %node.deployment().vault,
            owner = %node.vault().owner(),
            total_staked = node.vault().total_staked(),
            accrual = ?state.config.vault.accrual,
            "node ready"
        );
    }

    // 4. Start IPC server
    let socket_path = data_dir.join("harbor.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    // 5. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "RPC server error");
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!(events_published = state.event_bus.published(), "Daemon stopped");
    Ok(())
}
