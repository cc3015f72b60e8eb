use anyhow::{Context, Result};
use arena_core::logging::init_tracing;
use arena_core::{Content, World, WorldConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

use arena_server::api::{self, ApiState};
use arena_server::supervisor::Supervisor;
use arena_server::transport::Transport;
use arena_server::{Instance, InstanceHandle, ServerConfig, ServerMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/server.ron"));

    let config = ServerConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_tracing(&config.tracing);

    info!(
        instances = config.instances,
        tick_rate = config.tick_rate,
        "Starting Petal Arena server"
    );

    // ========================================================================
    // 1. Content (static definitions shared by every instance)
    // ========================================================================
    let content = match &config.content_dir {
        Some(dir) => Content::load_dir(dir)
            .with_context(|| format!("loading content from {}", dir.display()))?,
        None => Content::builtin().context("loading built-in content")?,
    };
    let content = Arc::new(content);

    // ========================================================================
    // 2. Instances, each on its own thread
    // ========================================================================
    let metrics = ServerMetrics::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (report_tx, report_rx) = mpsc::unbounded_channel();

    let mut handles = Vec::with_capacity(config.instances);
    for id in 0..config.instances {
        let world_config = WorldConfig {
            seed: config.world.seed.wrapping_add(id as u64),
            ..config.world.clone()
        };
        let world = World::new(content.clone(), world_config)
            .with_context(|| format!("building world for instance {id}"))?;
        let instance = Instance::new(
            id,
            world,
            config.tick_interval(),
            metrics.clone(),
            report_tx.clone(),
        );
        let handle = InstanceHandle::spawn(instance, shutdown_rx.clone())
            .with_context(|| format!("spawning instance {id}"))?;
        handles.push(handle);
    }
    drop(report_tx);

    // ========================================================================
    // 3. Supervisor, status API and game transport
    // ========================================================================
    let supervisor = Arc::new(Supervisor::new(
        handles.iter().map(|h| h.sender.clone()).collect(),
    ));
    let supervisor_task = tokio::spawn(Supervisor::run(
        supervisor.status(),
        report_rx,
        shutdown_rx.clone(),
    ));

    let api_state = ApiState {
        status: supervisor.status(),
        metrics: metrics.clone(),
    };
    let api_task = tokio::spawn(api::serve(config.status_addr, api_state, shutdown_rx.clone()));

    let transport = Transport::bind(config.bind_addr, supervisor.clone(), metrics.clone())
        .await
        .with_context(|| format!("binding game listener on {}", config.bind_addr))?;
    let transport_task = tokio::spawn(transport.serve(shutdown_rx.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");
    shutdown_tx.send_replace(true);

    transport_task.await.context("transport task")?;
    supervisor_task.await.context("supervisor task")?;
    api_task
        .await
        .context("status API task")?
        .context("status API")?;
    tokio::task::spawn_blocking(move || {
        for handle in handles {
            handle.join();
        }
    })
    .await
    .context("joining instances")?;

    info!("Server stopped");
    Ok(())
}
