//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. Every component receives its
//! dependencies through its constructor; nothing is looked up globally.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::context::{DeviceIdentity, NetworkContext};
use crate::error::{RendererError, RendererResult};
use crate::player::{wait_for_endpoint, EngineLaunch, EngineProcess, PlaybackBridge, PlaybackEngine};
use crate::protocol_constants::{ENGINE_STARTUP_POLL_ATTEMPTS, ENGINE_STARTUP_POLL_MS};
use crate::services::{
    AvTransportService, ConnectionManagerService, ControlGateway, ControlService, PlaybackSession,
    RenderingControlService,
};
use crate::state::Config;
use crate::upnp::{DiscoveryEngine, SsdpConfig};

/// Container for all bootstrapped services.
///
/// Discovery is wired but not started; call
/// [`start_discovery`](Self::start_discovery) once the HTTP server is bound so
/// announced locations are reachable.
pub struct BootstrappedServices {
    /// Validated configuration.
    pub config: Arc<Config>,
    /// Advertised address and port.
    pub network: NetworkContext,
    /// Identity stamped on discovery messages.
    pub identity: DeviceIdentity,
    /// Serialized command channel to the playback engine.
    pub bridge: Arc<PlaybackBridge>,
    /// The renderer's single playback session.
    pub session: Arc<PlaybackSession>,
    /// Routes SOAP control requests to the services.
    pub gateway: Arc<ControlGateway>,
    /// SSDP presence.
    pub discovery: Arc<DiscoveryEngine>,
    /// Engine process, when this renderer spawned it.
    engine: Mutex<Option<EngineProcess>>,
}

impl BootstrappedServices {
    /// The playback engine as seen by the services.
    #[must_use]
    pub fn engine(&self) -> Arc<dyn PlaybackEngine> {
        self.bridge.clone()
    }

    /// Starts SSDP advertisement.
    ///
    /// # Errors
    ///
    /// Fails if the discovery socket cannot be bound.
    pub async fn start_discovery(&self) -> RendererResult<()> {
        self.discovery.start().await?;
        Ok(())
    }

    /// Initiates graceful shutdown of all services.
    ///
    /// Withdraws the device, stops playback, closes the engine channel and
    /// terminates the engine if it was spawned here.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.discovery.stop().await;
        self.session.stop().await;
        self.bridge.close().await;

        if let Some(mut engine) = self.engine.lock().await.take() {
            engine.shutdown().await;
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

fn engine_launch(config: &Config) -> EngineLaunch {
    EngineLaunch {
        binary: config.audio.mpv_binary.clone(),
        socket_path: config.audio.mpv_ipc_socket.clone(),
        output_driver: config.audio.output_driver.clone(),
        volume: config.audio.default_volume,
        cache: config.audio.cache,
        demuxer_max_bytes: config.audio.demuxer_max_bytes.clone(),
    }
}

/// Wires the services around an engine bridge without touching the engine.
fn assemble(
    config: Config,
    network: NetworkContext,
    bridge: Arc<PlaybackBridge>,
    engine: Option<EngineProcess>,
) -> RendererResult<BootstrappedServices> {
    let identity = DeviceIdentity::for_network(config.device.uuid.clone(), &network);

    let session = Arc::new(PlaybackSession::new(
        Arc::clone(&bridge) as Arc<dyn PlaybackEngine>,
        config.audio.default_volume,
    ));

    let services: Vec<Arc<dyn ControlService>> = vec![
        Arc::new(AvTransportService::new(Arc::clone(&session))),
        Arc::new(RenderingControlService::new(Arc::clone(&session))),
        Arc::new(ConnectionManagerService::new()),
    ];
    let gateway = Arc::new(ControlGateway::new(services));

    let ssdp = SsdpConfig::new(
        &config.network.ssdp_multicast_ip,
        config.network.ssdp_port,
        config.network.announce_interval(),
    )?;
    let discovery = Arc::new(DiscoveryEngine::new(identity.clone(), ssdp));

    Ok(BootstrappedServices {
        config: Arc::new(config),
        network,
        identity,
        bridge,
        session,
        gateway,
        discovery,
        engine: Mutex::new(engine),
    })
}

/// Bootstraps all application services with their dependencies.
///
/// The wiring order matters - services are created in dependency order:
///
/// 1. Playback engine (spawned, or attached to when not managed)
/// 2. Engine bridge, with the initial volume applied
/// 3. Playback session (depends on the bridge)
/// 4. Control services and gateway (depend on the session)
/// 5. Discovery engine (depends on identity and network)
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the engine channel can
/// never be established. Both are fatal at startup.
pub async fn bootstrap_services(
    config: &Config,
    network: NetworkContext,
) -> RendererResult<BootstrappedServices> {
    config.validate().map_err(RendererError::Configuration)?;

    let socket_path = config.audio.mpv_ipc_socket.clone();
    let mut engine = if config.audio.manage_engine {
        Some(EngineProcess::spawn(&engine_launch(config)).await?)
    } else {
        log::info!(
            "[Bootstrap] Attaching to existing engine at {}",
            socket_path.display()
        );
        wait_for_endpoint(
            &socket_path,
            ENGINE_STARTUP_POLL_ATTEMPTS,
            std::time::Duration::from_millis(ENGINE_STARTUP_POLL_MS),
        )
        .await?;
        None
    };

    let bridge = Arc::new(PlaybackBridge::new(socket_path, config.audio.ipc_timeout()));

    if let Err(e) = bridge.set_volume(i64::from(config.audio.default_volume)).await {
        log::error!("[Bootstrap] Engine did not accept initial volume: {}", e);
        if let Some(process) = engine.as_mut() {
            process.shutdown().await;
        }
        return Err(e.into());
    }

    let services = assemble(config.clone(), network, bridge, engine)?;
    log::info!(
        "[Bootstrap] Renderer {} ready ({})",
        services.identity.udn(),
        services.identity.location
    );
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn detached_bridge() -> Arc<PlaybackBridge> {
        Arc::new(PlaybackBridge::new(
            "/nonexistent/pirender-test.sock",
            Duration::from_millis(50),
        ))
    }

    #[tokio::test]
    async fn assembled_gateway_serves_connection_manager() {
        let services = assemble(
            Config::default(),
            NetworkContext::for_test(),
            detached_bridge(),
            None,
        )
        .unwrap();

        assert_eq!(
            services.identity.location,
            "http://192.168.1.50:8000/description.xml"
        );

        let body = r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:GetCurrentConnectionIDs xmlns:u="urn:schemas-upnp-org:service:ConnectionManager:1"/></s:Body></s:Envelope>"#;
        let reply = services.gateway.handle("/ConnectionManager/control", body).await;
        assert!(reply.body.contains("<ConnectionIDs>0</ConnectionIDs>"));
    }

    #[tokio::test]
    async fn unreachable_engine_surfaces_as_action_failure() {
        let services = assemble(
            Config::default(),
            NetworkContext::for_test(),
            detached_bridge(),
            None,
        )
        .unwrap();
        services.session.set_uri("http://x/y.mp3", "");

        let body = r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:Play xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"><InstanceID>0</InstanceID><Speed>1</Speed></u:Play></s:Body></s:Envelope>"#;
        let reply = services.gateway.handle("/AVTransport/control", body).await;
        assert!(reply.body.contains("<errorCode>501</errorCode>"));
    }

    #[tokio::test]
    async fn invalid_multicast_group_is_rejected() {
        let mut config = Config::default();
        config.network.ssdp_multicast_ip = "10.0.0.1".to_string();

        let result = assemble(config, NetworkContext::for_test(), detached_bridge(), None);
        assert!(matches!(result, Err(RendererError::Discovery(_))));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_touching_engine() {
        let mut config = Config::default();
        config.audio.default_volume = 200;

        let result = bootstrap_services(&config, NetworkContext::for_test()).await;
        assert!(matches!(result, Err(RendererError::Configuration(_))));
    }

    #[tokio::test]
    async fn shutdown_without_engine_process_completes() {
        let services = assemble(
            Config::default(),
            NetworkContext::for_test(),
            detached_bridge(),
            None,
        )
        .unwrap();
        services.shutdown().await;
        assert!(!services.discovery.is_running());
    }

    #[test]
    fn launch_parameters_follow_audio_config() {
        let mut config = Config::default();
        config.audio.cache = false;
        config.audio.output_driver = "pulse".to_string();

        let launch = engine_launch(&config);
        assert_eq!(launch.volume, 50);
        assert!(launch.args().contains(&"--ao=pulse".to_string()));
        assert!(!launch.args().iter().any(|arg| arg.starts_with("--cache")));
    }
}
