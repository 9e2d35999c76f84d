//! RAN Simulator E2 Node Main Application
//!
//! Simulates gNBs with a live UE population and exposes them to RICs as
//! E2 nodes serving the KPM service model.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::SimConfig;
use e2agent::servicemodel::kpm::codec::BincodeKpmCodec;
use e2agent::{AgentConfig, E2Agent, KpmServiceModel, NodeIdentity, ServiceModelRegistry};
use interfaces::tcp_channel::TcpE2Connector;
use interfaces::E2Connector;
use store::{CellRegistry, SubscriptionRegistry, UeEvent, UeRegistry, WatchOptions};

/// Simulated E2 node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (yaml, toml or json)
    #[arg(short, long, default_value = "ransim.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the configuration
    #[arg(short, long)]
    log_level: Option<String>,

    /// Number of simulated UEs; overrides the configuration
    #[arg(long)]
    ue_count: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = SimConfig::from_file(&args.config)?;
    if let Some(ue_count) = args.ue_count {
        config.ue_count = ue_count;
    }

    // Initialize logging
    let log_level = args.log_level.clone().unwrap_or_else(|| config.log.level.clone());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting RAN simulator E2 node");
    info!("Configuration file: {}", args.config);
    info!("  PLMN: {}", config.plmn);
    info!("  Nodes: {}", config.nodes.len());
    info!("  UEs: {}", config.ue_count);

    let plmn_id = config.plmn_id()?;
    let cells = Arc::new(CellRegistry::new(config.cells()?));
    let ues = Arc::new(
        UeRegistry::new(config.ue_count, cells.clone())
            .await
            .context("creating UE population")?,
    );

    let (event_tx, event_rx) = mpsc::channel(256);
    let watch_handle = ues.watch(event_tx, WatchOptions::default()).await;
    let event_log = tokio::spawn(log_ue_events(event_rx));

    let connector: Arc<dyn E2Connector> = Arc::new(TcpE2Connector::default());
    let codec = Arc::new(BincodeKpmCodec);
    let mut agents = Vec::new();
    for node in &config.nodes {
        let identity = NodeIdentity {
            gnb_id: node.gnb_id(),
            plmn_id,
        };
        for controller_id in &node.controllers {
            let controller = config.controller(controller_id)?;

            let mut models = ServiceModelRegistry::new();
            models.register(Arc::new(KpmServiceModel::new(
                identity,
                codec.clone(),
                ues.clone(),
                Arc::new(SubscriptionRegistry::new()),
            )?))?;

            agents.push(E2Agent::new(
                AgentConfig {
                    node: identity,
                    controller_address: controller.endpoint(),
                },
                models,
                connector.clone(),
            ));
        }
    }

    let started = join_all(agents.iter().map(|agent| agent.start())).await;
    let failures = started.iter().filter(|result| result.is_err()).count();
    for result in started.iter().filter_map(|result| result.as_ref().err()) {
        error!("E2 agent failed to start: {}", result);
    }
    if failures == agents.len() && !agents.is_empty() {
        warn!("No E2 agent is connected");
    }
    info!(
        "E2 node initialized successfully ({} of {} agents active)",
        agents.len() - failures,
        agents.len()
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Shutdown
    info!("Shutting down E2 node");
    for result in join_all(agents.iter().map(|agent| agent.stop())).await {
        if let Err(e) = result {
            error!("Error stopping E2 agent: {}", e);
        }
    }

    ues.unwatch(watch_handle).await;
    let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), event_log).await;

    info!("E2 node shutdown complete");
    Ok(())
}

async fn log_ue_events(mut events: mpsc::Receiver<UeEvent>) {
    while let Some(event) = events.recv().await {
        debug!(
            "UE {} {:?} in cell {} (strength {:.1})",
            event.ue.imsi, event.event_type, event.ue.cell.ecgi, event.ue.cell.strength
        );
    }
}
