//! Mixer Control Application
//!
//! Hosts the mixer parameter tree and mirrors it to the configured UDP peers.
//! Usage: `mixer-control [control.toml]`

use anyhow::{Context, Result};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixer_osc_control::{
    config::{self, AppConfig},
    mixer::Mixer,
    network::{OscConnector, UdpTransport},
    OscRoot,
};

/// EQ bands per channel
const EQ_BANDS: usize = 4;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting mixer control");

    let config_path = std::env::args().nth(1).map(PathBuf::from).or_else(AppConfig::default_path);
    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };

    let mut root = OscRoot::from_config(&config.control);
    tracing::info!(
        authority = config.control.authority,
        notify_at_init = config.control.notify_at_init,
        "Root created"
    );

    for link in &config.connectors {
        let transport = UdpTransport::bind(link.bind, link.peer)
            .with_context(|| format!("opening connector '{}'", link.name))?;
        root.add_connector(Box::new(OscConnector::new(link.name.clone(), transport, link.slip)));
    }
    if config.connectors.is_empty() {
        tracing::warn!("No connectors configured, the tree is only reachable locally");
    }

    let _mixer = Mixer::new(&mut root, "ch1", EQ_BANDS)?;

    let node_config_path = config.node_config_path();
    if let Some(path) = &node_config_path {
        match config::load_node_config(path) {
            Ok(nodes) => root.load_node_config(&nodes),
            Err(e) => tracing::warn!("Ignoring node configuration {}: {}", path.display(), e),
        }
    }
    root.print_all_nodes();

    let dirty = Rc::new(Cell::new(false));
    let flag = dirty.clone();
    root.set_on_value_changed(move || flag.set(true));

    let save_delay = Duration::from_millis(config.control.save_delay_ms);
    let mut last_change: Option<Instant> = None;
    let mut last_stats_time = Instant::now();

    let mut ticker = tokio::time::interval(Duration::from_millis(config.control.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                root.poll();

                if dirty.replace(false) {
                    last_change = Some(Instant::now());
                }
                if last_change.is_some_and(|t| t.elapsed() >= save_delay) {
                    last_change = None;
                    save_nodes(&root, node_config_path.as_deref());
                }

                // Periodic stats
                if last_stats_time.elapsed() >= Duration::from_secs(30) {
                    last_stats_time = Instant::now();
                    let stats = root.stats();
                    tracing::info!(
                        "Root stats: {} packets, {} dispatched, {} unresolved, {} malformed, {} sent",
                        stats.packets_received,
                        stats.messages_dispatched,
                        stats.messages_unresolved,
                        stats.packets_malformed,
                        stats.messages_sent
                    );
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    if last_change.is_some() || dirty.get() {
        save_nodes(&root, node_config_path.as_deref());
    }
    for id in root.connector_ids() {
        if let Err(e) = root.remove_connector(id) {
            tracing::warn!("{}", e);
        }
    }

    Ok(())
}

fn save_nodes(root: &OscRoot, path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };
    if let Err(e) = config::save_node_config(path, &root.snapshot_config()) {
        tracing::error!("Failed to save node configuration: {}", e);
    }
}
