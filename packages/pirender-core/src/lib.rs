//! PiRender Core - library for a headless DLNA/UPnP audio renderer.
//!
//! The renderer advertises itself as a `MediaRenderer:1` device, accepts SOAP
//! control requests from control points (phones, NAS apps, desktop players)
//! and drives an external mpv instance over its JSON IPC socket.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`upnp`]: SSDP discovery, SOAP codec, device and service descriptions
//! - [`services`]: AVTransport, RenderingControl and ConnectionManager, the
//!   playback session and the control gateway
//! - [`player`]: mpv process management and the IPC bridge
//! - [`api`]: HTTP routes for descriptions, control and status
//! - [`context`]: Advertised address detection and URL building
//! - [`state`]: Configuration types
//! - [`bootstrap`]: Dependency wiring
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`PlaybackEngine`](player::PlaybackEngine): the engine seam used by the
//!   playback session, mocked in tests
//! - [`ControlService`](services::ControlService): one UPnP service's action
//!   dispatch
//! - [`IpDetector`](context::IpDetector): local IP detection

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod context;
pub mod error;
pub mod player;
pub mod protocol_constants;
pub mod services;
pub mod state;
pub mod upnp;

// Re-export commonly used types at the crate root
pub use context::{
    DeviceIdentity, InterfaceIpDetector, IpDetector, LocalIpDetector, NetworkContext,
    NetworkError, UrlBuilder,
};
pub use error::{ControlError, ControlResult, RendererError, RendererResult};
pub use state::{AudioConfig, Config, DeviceConfig, NetworkConfig};

// Re-export service types
pub use services::{PlaybackSession, SessionState, TransportState};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{bind_listener, serve, AppState, ServerError};
