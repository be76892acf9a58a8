//! Application services layer.
//!
//! This module contains the UPnP control services and the playback session
//! they share. The [`ControlGateway`] routes parsed SOAP requests to the
//! service addressed by the control URL.

pub mod av_transport;
pub mod connection_manager;
pub mod control_gateway;
pub mod playback_session;
pub mod rendering_control;

use async_trait::async_trait;

use crate::error::ControlResult;
use crate::upnp::soap::{ActionArgs, ActionOutput};
use crate::upnp::UpnpService;

pub use av_transport::AvTransportService;
pub use connection_manager::ConnectionManagerService;
pub use control_gateway::{ControlGateway, ControlReply};
pub use playback_session::{PlaybackSession, SessionState, TransportState};
pub use rendering_control::RenderingControlService;

/// A UPnP service that executes control actions.
///
/// Implementations return their output arguments in the order the service
/// description declares them.
#[async_trait]
pub trait ControlService: Send + Sync {
    /// The service this handler answers for.
    fn service(&self) -> UpnpService;

    /// Executes `action` with the given input arguments.
    async fn dispatch(&self, action: &str, args: &ActionArgs) -> ControlResult<ActionOutput>;
}
