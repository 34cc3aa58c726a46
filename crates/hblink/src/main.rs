// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process entry point: load configuration, bring up every configured
//! endpoint's network task, wire them to the router, and run until
//! interrupted.

mod endpoints;
mod error;
mod monitor_bridge;
mod rules;

use clap::Parser;
use error::StartupError;
use hblink_core::endpoint::{EndpointHandle, EndpointRegistry};
use hblink_core::{BridgeTable, EndpointConfig, EndpointRole, Router, SystemConfig};
use hblink_monitor::MonitorServer;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hblink", about = "Multi-system HomeBrew Protocol DMR conference bridge")]
struct Args {
    /// Path to the system configuration TOML file.
    #[arg(short, long, default_value = "hblink.cfg")]
    config: PathBuf,

    /// Log level override, takes precedence over the config file's `log_level`.
    #[arg(short, long)]
    logging: Option<String>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match SystemConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    init_logging(args.logging.as_deref().unwrap_or(&config.log_level));

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run(config: SystemConfig) -> Result<(), StartupError> {
    let bridges = match &config.rules_file {
        Some(path) => rules::load_bridges(std::path::Path::new(path))?,
        None => Vec::new(),
    };
    let bridge_table = BridgeTable::new(bridges);

    let known: HashSet<&str> = config.endpoints.iter().map(|e| e.name.as_str()).collect();
    bridge_table.validate_endpoints(&known)?;

    let shutdown = Arc::new(Notify::new());
    let mut join_handles: Vec<JoinHandle<()>> = Vec::new();

    let monitor_handle = match config.monitor_bind_address {
        Some(addr) => {
            let snapshot = monitor_bridge::config_snapshot(&config);
            let server = MonitorServer::bind(addr, snapshot).await?;
            let handle = server.handle();
            join_handles.push(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!(error = %e, "monitor server stopped");
                }
            }));
            Some(handle)
        }
        None => None,
    };

    // The router needs every endpoint's mailbox and tracker handle to
    // forward traffic between them, but each endpoint's network task needs
    // the router to hand received voice traffic to. Build the router first
    // with an empty registry, hand every task a clone of the same
    // `Arc<RwLock<Router>>`, then register each returned handle as its task
    // comes up.
    let router = Arc::new(RwLock::new(Router::new(bridge_table, EndpointRegistry::new(), config.stream_timeout())));

    for endpoint in &config.endpoints {
        let (handle, join) = spawn_endpoint(endpoint, &config, router.clone(), monitor_handle.clone(), shutdown.clone()).await?;
        router.write().await.endpoints_mut().insert(handle);
        join_handles.push(join);
    }

    router.write().await.arm_bridges(Instant::now());

    let rule_tick_interval = config.rule_tick_interval();
    let router_for_ticker = router.clone();
    let monitor_for_ticker = monitor_handle.clone();
    let ticker_shutdown = shutdown.clone();
    join_handles.push(tokio::spawn(async move {
        let mut tick = tokio::time::interval(rule_tick_interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = Instant::now();
                    let mut guard = router_for_ticker.write().await;
                    guard.rule_timer_tick(now);
                    if let Some(monitor) = &monitor_for_ticker {
                        monitor.publish_bridge_snapshot(monitor_bridge::bridge_snapshot(guard.bridges(), now)).await;
                    }
                }
                _ = ticker_shutdown.notified() => break,
            }
        }
    }));

    info!(endpoints = config.endpoints.len(), "hblink started");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
    }

    shutdown.notify_waiters();
    if let Some(monitor) = &monitor_handle {
        monitor.shutdown();
    }

    let deadline = tokio::time::sleep(std::time::Duration::from_secs(5));
    tokio::pin!(deadline);
    for join in join_handles {
        tokio::select! {
            _ = join => {}
            _ = &mut deadline => {
                info!("shutdown grace period elapsed, exiting");
                break;
            }
        }
    }

    Ok(())
}

async fn spawn_endpoint(
    endpoint: &EndpointConfig,
    config: &SystemConfig,
    router: Arc<RwLock<Router>>,
    monitor: Option<hblink_monitor::MonitorHandle>,
    shutdown: Arc<Notify>,
) -> Result<(EndpointHandle, JoinHandle<()>), StartupError> {
    match &endpoint.role {
        EndpointRole::Master { passphrase, repeat, acl } => {
            let tracker = endpoints::new_repeater_tracker();
            endpoints::spawn_master(
                endpoint.clone(),
                passphrase.clone(),
                *repeat,
                acl.clone(),
                tracker,
                router,
                monitor,
                config.ping_time(),
                config.max_missed,
                config.stream_timeout(),
                shutdown,
            )
            .await
        }
        EndpointRole::Peer {
            passphrase,
            master_address,
            radio_id,
            description,
            options,
            loose_peer_id_check,
        } => {
            let tracker = endpoints::new_repeater_tracker();
            endpoints::spawn_peer(
                endpoint.clone(),
                *radio_id,
                passphrase.clone(),
                *master_address,
                description.to_repeater_description(),
                options.as_ref().map(|s| s.as_bytes().to_vec()),
                *loose_peer_id_check,
                tracker,
                router,
                monitor,
                config.ping_time(),
                config.max_missed,
                config.stream_timeout(),
                shutdown,
            )
            .await
        }
        EndpointRole::OpenBridge { hmac_key, network_id, target_address } => {
            let tracker = endpoints::new_openbridge_tracker();
            endpoints::spawn_openbridge(
                endpoint.clone(),
                *network_id,
                *target_address,
                hmac_key.clone(),
                tracker,
                router,
                monitor,
                config.stream_trim_interval(),
                config.stream_timeout(),
                shutdown,
            )
            .await
        }
    }
}
