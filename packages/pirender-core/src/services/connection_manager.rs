//! ConnectionManager service: stateless capability queries.
//!
//! The renderer only sinks content over a single implicit connection (ID 0).

use async_trait::async_trait;

use super::ControlService;
use crate::error::{ControlError, ControlResult};
use crate::protocol_constants::SINK_MIME_TYPES;
use crate::upnp::soap::{ActionArgs, ActionOutput};
use crate::upnp::UpnpService;

/// Actions understood by the ConnectionManager service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    GetProtocolInfo,
    GetCurrentConnectionIDs,
    GetCurrentConnectionInfo,
}

impl ConnectionAction {
    pub const ALL: [ConnectionAction; 3] = [
        Self::GetProtocolInfo,
        Self::GetCurrentConnectionIDs,
        Self::GetCurrentConnectionInfo,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetProtocolInfo => "GetProtocolInfo",
            Self::GetCurrentConnectionIDs => "GetCurrentConnectionIDs",
            Self::GetCurrentConnectionInfo => "GetCurrentConnectionInfo",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Comma-separated `http-get` protocol info for every supported MIME type.
#[must_use]
pub fn sink_protocol_info() -> String {
    SINK_MIME_TYPES
        .iter()
        .map(|mime| format!("http-get:*:{}:*", mime))
        .collect::<Vec<_>>()
        .join(",")
}

/// The ConnectionManager service.
#[derive(Debug, Default)]
pub struct ConnectionManagerService;

impl ConnectionManagerService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ControlService for ConnectionManagerService {
    fn service(&self) -> UpnpService {
        UpnpService::ConnectionManager
    }

    async fn dispatch(&self, action: &str, _args: &ActionArgs) -> ControlResult<ActionOutput> {
        let action = ConnectionAction::from_name(action)
            .ok_or_else(|| ControlError::UnknownAction(action.to_string()))?;

        Ok(match action {
            ConnectionAction::GetProtocolInfo => vec![
                ("Source", String::new()),
                ("Sink", sink_protocol_info()),
            ],
            ConnectionAction::GetCurrentConnectionIDs => {
                vec![("ConnectionIDs", "0".to_string())]
            }
            ConnectionAction::GetCurrentConnectionInfo => vec![
                ("RcsID", "0".to_string()),
                ("AVTransportID", "0".to_string()),
                ("ProtocolInfo", String::new()),
                ("PeerConnectionManager", String::new()),
                ("PeerConnectionID", "-1".to_string()),
                ("Direction", "Input".to_string()),
                ("Status", "OK".to_string()),
            ],
        })
    }
}
