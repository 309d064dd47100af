//! peermesh - Main entry point
//!
//! Boots the peer list manager and connection pool, dials the configured
//! seed nodes, and keeps the maintenance loops running until shutdown.

use anyhow::{Context, Result};
use peermesh::{
    generate_node_id, CliArgs, MemoryTransport, Metrics, NodeConfig, PeerConnectionPool,
    PeerListManager, TcpTransport, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();
        if let Some(location) = panic_info.location() {
            error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("peermesh starting");
    debug!("CLI arguments: {:?}", args);

    let config = NodeConfig::load(&args.config_file).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let node_id = args.node_id.clone().unwrap_or_else(generate_node_id);
    info!("Local node id: {}", node_id);
    display_config(&config);

    // The transport factory must be usable up front; everything after this
    // point is best-effort peer management.
    let transport: Arc<dyn Transport> = if args.simulate {
        info!("Using in-process transport (simulation mode)");
        Arc::new(MemoryTransport::new())
    } else {
        Arc::new(TcpTransport::new(Duration::from_secs(args.dial_timeout)))
    };

    let metrics = Arc::new(Metrics::new());
    let peer_list = Arc::new(PeerListManager::new(&config));
    let pool = Arc::new(PeerConnectionPool::new(
        peer_list.clone(),
        transport,
        config.failure_threshold,
        metrics.clone(),
    ));

    dial_seed_nodes(&config, &pool).await;

    let (refresh_shutdown_tx, refresh_shutdown_rx) = mpsc::channel(1);
    let (cleanup_shutdown_tx, cleanup_shutdown_rx) = mpsc::channel(1);

    let refresh_task = tokio::spawn(peer_list.clone().run_refresh_loop(refresh_shutdown_rx));
    let cleanup_task = tokio::spawn(pool.clone().run_cleanup_loop(
        Duration::from_secs(args.cleanup_interval),
        config.idle_timeout(),
        cleanup_shutdown_rx,
    ));

    info!("Node up, waiting for shutdown signal");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    // Stop the loops first so nothing races the teardown, then close channels
    let _ = refresh_shutdown_tx.send(()).await;
    let _ = cleanup_shutdown_tx.send(()).await;
    let _ = refresh_task.await;
    let _ = cleanup_task.await;

    pool.shutdown().await;
    metrics.log_summary();

    info!("peermesh finished");
    Ok(())
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.is_verbose() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

/// Print the effective configuration
fn display_config(config: &NodeConfig) {
    println!("Configuration:");
    println!("  Max peers: {}", config.max_peers_in_list);
    println!("  Min healthy peers: {}", config.min_healthy_peers);
    println!("  Refresh interval: {} min", config.refresh_interval_minutes);
    println!("  Failure threshold: {}", config.failure_threshold);
    println!("  Idle timeout: {} s", config.idle_timeout_secs);
    println!("  Seed nodes: {}", config.seed_nodes.len());
    for seed in &config.seed_nodes {
        println!("    {} ({})", seed.node_id, seed.endpoint());
    }
    println!();
}

/// Attempt an initial connection to every configured seed node.
///
/// Failures are expected (seeds may be down); they are logged and left to
/// the failure accounting and later reconnect attempts.
async fn dial_seed_nodes(config: &NodeConfig, pool: &Arc<PeerConnectionPool>) {
    for seed in &config.seed_nodes {
        let endpoint = seed.endpoint();
        if pool.connect_to_peer(&seed.node_id, &endpoint).await {
            info!("Connected to seed node {} ({})", seed.node_id, endpoint);
        } else {
            warn!("Could not reach seed node {} ({})", seed.node_id, endpoint);
        }
    }
    info!(
        "Seed dial complete: {}/{} connected",
        pool.active_connection_count().await,
        config.seed_nodes.len()
    );
}
