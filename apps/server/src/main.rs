//! PiRender Server - headless DLNA/UPnP audio renderer.
//!
//! Advertises a MediaRenderer on the local network, serves its descriptions and
//! control endpoints over HTTP, and plays whatever control points hand it
//! through an mpv instance.

mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pirender_core::{
    bind_listener, bootstrap_services, serve, AppState, InterfaceIpDetector, IpDetector,
    LocalIpDetector, NetworkContext,
};
use tokio::signal;
use tokio::sync::oneshot;

use crate::config::ServerConfig;

/// PiRender Server - Headless DLNA audio renderer driven by mpv.
#[derive(Parser, Debug)]
#[command(name = "pirender-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace). Defaults to the config file's level.
    #[arg(short, long, env = "PIRENDER_LOG_LEVEL")]
    log_level: Option<log::LevelFilter>,

    /// HTTP port (overrides config file).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Advertise IP address (overrides config file).
    #[arg(short = 'a', long)]
    advertise_ip: Option<IpAddr>,

    /// Network interface whose address is advertised (overrides config file).
    #[arg(short = 'i', long)]
    interface: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let (mut config, override_warnings) =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level.unwrap_or_else(|| config.log_level()))
        .format_timestamp_millis()
        .init();

    log::info!("PiRender Server v{}", env!("CARGO_PKG_VERSION"));
    for warning in &override_warnings {
        log::warn!("{}", warning);
    }

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.network.http_port = port;
    }
    if let Some(ip) = args.advertise_ip {
        config.network.advertise_ip = Some(ip);
    }
    if let Some(interface) = args.interface {
        config.network.interface = interface;
    }

    let network = resolve_network(&config)?;

    // Bootstrap services with explicit network configuration
    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, network)
        .await
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // Bind before announcing so the advertised location is reachable
    let listener = match bind_listener(config.network.http_port).await {
        Ok(listener) => listener,
        Err(e) => {
            services.shutdown().await;
            return Err(e).context("Failed to start HTTP server");
        }
    };

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let app_state = AppState::from_services(&services);
    let server_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        if let Err(e) = serve(listener, app_state, shutdown).await {
            log::error!("Server error: {}", e);
        }
    });

    if let Err(e) = services.start_discovery().await {
        let _ = stop_tx.send(());
        services.shutdown().await;
        return Err(e).context("Failed to start SSDP discovery");
    }

    log::info!(
        "Renderer '{}' available at {}",
        config.device.name,
        services.identity.location
    );

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown
    services.shutdown().await;
    let _ = stop_tx.send(());
    if let Err(e) = server_handle.await {
        log::warn!("HTTP server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Resolves the advertised address: explicit override, then the configured
/// interface, then whatever the OS reports as the local address.
fn resolve_network(config: &ServerConfig) -> Result<NetworkContext> {
    let port = config.network.http_port;

    if let Some(ip) = config.network.advertise_ip {
        log::info!("Configuration: http_port={}, advertise_ip={}", port, ip);
        return Ok(NetworkContext::explicit(port, ip));
    }

    log::info!(
        "Configuration: http_port={}, advertise_ip=auto (interface {})",
        port,
        config.network.interface
    );
    let detectors: Vec<Arc<dyn IpDetector>> = vec![
        Arc::new(InterfaceIpDetector::new(config.network.interface.clone())),
        LocalIpDetector::arc(),
    ];
    NetworkContext::auto_detect(port, &detectors).context(
        "Failed to auto-detect local IP address. \
         Please specify --advertise-ip or set PIRENDER_ADVERTISE_IP to an \
         address that control points can reach.",
    )
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
