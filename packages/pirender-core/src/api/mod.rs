//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::bootstrap::BootstrappedServices;
use crate::context::NetworkContext;
use crate::player::PlaybackEngine;
use crate::services::{ControlGateway, PlaybackSession};
use crate::state::DeviceConfig;

pub mod http;
pub mod response;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error after binding.
    #[error("HTTP server terminated: {0}")]
    Serve(String),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Routes SOAP control requests.
    pub gateway: Arc<ControlGateway>,
    /// Playback session, read by the status endpoint.
    pub session: Arc<PlaybackSession>,
    /// Engine handle used by the health check.
    pub engine: Arc<dyn PlaybackEngine>,
    /// Identity and model strings for the device description.
    pub device: Arc<DeviceConfig>,
    /// Advertised address and port.
    pub network: NetworkContext,
}

impl AppState {
    /// Builds the API state from bootstrapped services.
    pub fn from_services(services: &BootstrappedServices) -> Self {
        Self {
            gateway: Arc::clone(&services.gateway),
            session: Arc::clone(&services.session),
            engine: services.engine(),
            device: Arc::new(services.config.device.clone()),
            network: services.network.clone(),
        }
    }
}

/// Binds the HTTP listener on all interfaces.
///
/// Port 0 asks the OS for a free port; read it back from the listener.
pub async fn bind_listener(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("Server listening on http://{}", listener.local_addr()?);
    Ok(listener)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = http::create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))
}
