//! UPnP service definitions for the MediaRenderer.
//!
//! This module provides a single source of truth for service URNs, service IDs,
//! and the HTTP paths used by description documents, the control gateway and
//! discovery.

use serde::Serialize;

/// UPnP services exposed by the renderer.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpnpService {
    /// Audio transport control (load, play, pause, stop, seek).
    AVTransport,
    /// Volume and mute control.
    RenderingControl,
    /// Connection capability queries.
    ConnectionManager,
}

impl UpnpService {
    /// Every service, in the order it appears in the device description.
    pub const ALL: [UpnpService; 3] = [
        Self::AVTransport,
        Self::RenderingControl,
        Self::ConnectionManager,
    ];

    /// Returns the UPnP service type URN.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::ConnectionManager => "urn:schemas-upnp-org:service:ConnectionManager:1",
        }
    }

    /// Returns the UPnP service ID used in the device description.
    #[must_use]
    pub fn service_id(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:upnp-org:serviceId:AVTransport",
            Self::RenderingControl => "urn:upnp-org:serviceId:RenderingControl",
            Self::ConnectionManager => "urn:upnp-org:serviceId:ConnectionManager",
        }
    }

    /// Returns the path of the service control protocol description.
    #[must_use]
    pub fn scpd_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/AVTransport.xml",
            Self::RenderingControl => "/RenderingControl.xml",
            Self::ConnectionManager => "/ConnectionManager.xml",
        }
    }

    /// Returns the SOAP control endpoint path.
    #[must_use]
    pub fn control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/AVTransport/control",
            Self::RenderingControl => "/RenderingControl/control",
            Self::ConnectionManager => "/ConnectionManager/control",
        }
    }

    /// Returns the GENA event endpoint path.
    #[must_use]
    pub fn event_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/AVTransport/event",
            Self::RenderingControl => "/RenderingControl/event",
            Self::ConnectionManager => "/ConnectionManager/event",
        }
    }

    /// Returns a human-readable name for this service.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::RenderingControl => "RenderingControl",
            Self::ConnectionManager => "ConnectionManager",
        }
    }

    /// Resolves the service addressed by a control request path.
    ///
    /// Matches on the control path segment anywhere in the request path, so
    /// prefixed paths (e.g. `/MediaRenderer/AVTransport/control`) also resolve.
    #[must_use]
    pub fn from_control_path(path: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|service| path.contains(service.control_path()))
    }
}

impl std::fmt::Display for UpnpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
