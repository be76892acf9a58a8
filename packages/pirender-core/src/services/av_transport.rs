//! AVTransport service: media loading and transport control.

use std::sync::Arc;

use async_trait::async_trait;

use super::playback_session::{PlaybackSession, SessionState, TransportState};
use super::ControlService;
use crate::error::{ControlError, ControlResult};
use crate::upnp::soap::{ActionArgs, ActionOutput};
use crate::upnp::timecode::{format_time, parse_time};
use crate::upnp::UpnpService;

/// Actions understood by the AVTransport service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    SetAVTransportURI,
    Play,
    Pause,
    Stop,
    Seek,
    GetTransportInfo,
    GetPositionInfo,
    GetMediaInfo,
    GetDeviceCapabilities,
    GetTransportSettings,
    GetCurrentTransportActions,
}

impl TransportAction {
    pub const ALL: [TransportAction; 11] = [
        Self::SetAVTransportURI,
        Self::Play,
        Self::Pause,
        Self::Stop,
        Self::Seek,
        Self::GetTransportInfo,
        Self::GetPositionInfo,
        Self::GetMediaInfo,
        Self::GetDeviceCapabilities,
        Self::GetTransportSettings,
        Self::GetCurrentTransportActions,
    ];

    /// SOAP action name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetAVTransportURI => "SetAVTransportURI",
            Self::Play => "Play",
            Self::Pause => "Pause",
            Self::Stop => "Stop",
            Self::Seek => "Seek",
            Self::GetTransportInfo => "GetTransportInfo",
            Self::GetPositionInfo => "GetPositionInfo",
            Self::GetMediaInfo => "GetMediaInfo",
            Self::GetDeviceCapabilities => "GetDeviceCapabilities",
            Self::GetTransportSettings => "GetTransportSettings",
            Self::GetCurrentTransportActions => "GetCurrentTransportActions",
        }
    }

    /// Looks up an action by its SOAP name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Seek units accepted by [`TransportAction::Seek`].
const SEEK_TIME_UNITS: [&str; 2] = ["ABS_TIME", "REL_TIME"];

/// The AVTransport service.
pub struct AvTransportService {
    session: Arc<PlaybackSession>,
}

impl AvTransportService {
    pub fn new(session: Arc<PlaybackSession>) -> Self {
        Self { session }
    }

    fn set_uri(&self, args: &ActionArgs) -> ControlResult<ActionOutput> {
        let uri = args
            .get("CurrentURI")
            .ok_or_else(|| ControlError::missing("CurrentURI"))?;
        let metadata = args.get("CurrentURIMetaData").unwrap_or_default();

        self.session.set_uri(uri.trim(), metadata);
        Ok(Vec::new())
    }

    async fn seek(&self, args: &ActionArgs) -> ControlResult<ActionOutput> {
        let unit = args.get("Unit").ok_or_else(|| ControlError::missing("Unit"))?;
        if !SEEK_TIME_UNITS.contains(&unit) {
            return Err(ControlError::InvalidArgument(format!(
                "unsupported seek unit {}",
                unit
            )));
        }

        let target = args
            .get("Target")
            .ok_or_else(|| ControlError::missing("Target"))?;
        let position = parse_time(target).ok_or_else(|| {
            ControlError::InvalidArgument(format!("invalid seek target {}", target))
        })?;

        self.session.seek(position).await?;
        Ok(Vec::new())
    }

    fn transport_info(state: &SessionState) -> ActionOutput {
        vec![
            ("CurrentTransportState", state.state.as_upnp().to_string()),
            ("CurrentTransportStatus", "OK".to_string()),
            ("CurrentSpeed", "1".to_string()),
        ]
    }

    fn position_info(state: &SessionState) -> ActionOutput {
        let position = format_time(state.position);
        vec![
            ("Track", "1".to_string()),
            ("TrackDuration", format_time(state.duration)),
            ("TrackMetaData", state.current_uri_metadata.clone()),
            ("TrackURI", state.current_uri.clone()),
            ("RelTime", position.clone()),
            ("AbsTime", position),
            ("RelCount", "0".to_string()),
            ("AbsCount", "0".to_string()),
        ]
    }

    fn media_info(state: &SessionState) -> ActionOutput {
        vec![
            ("NrTracks", "1".to_string()),
            ("MediaDuration", format_time(state.duration)),
            ("CurrentURI", state.current_uri.clone()),
            ("CurrentURIMetaData", state.current_uri_metadata.clone()),
            ("NextURI", String::new()),
            ("NextURIMetaData", String::new()),
            ("PlayMedium", "NETWORK".to_string()),
            ("RecordMedium", "NOT_IMPLEMENTED".to_string()),
            ("WriteStatus", "NOT_IMPLEMENTED".to_string()),
        ]
    }

    fn current_actions(state: &SessionState) -> &'static str {
        match state.state {
            TransportState::Stopped if state.current_uri.is_empty() => "",
            TransportState::Stopped => "Play",
            TransportState::Transitioning => "Stop",
            TransportState::Playing => "Pause,Stop,Seek",
            TransportState::PausedPlayback => "Play,Stop,Seek",
        }
    }
}

#[async_trait]
impl ControlService for AvTransportService {
    fn service(&self) -> UpnpService {
        UpnpService::AVTransport
    }

    async fn dispatch(&self, action: &str, args: &ActionArgs) -> ControlResult<ActionOutput> {
        let action = TransportAction::from_name(action)
            .ok_or_else(|| ControlError::UnknownAction(action.to_string()))?;

        match action {
            TransportAction::SetAVTransportURI => self.set_uri(args),
            TransportAction::Play => {
                self.session.play().await?;
                Ok(Vec::new())
            }
            TransportAction::Pause => {
                self.session.pause().await?;
                Ok(Vec::new())
            }
            TransportAction::Stop => {
                self.session.stop().await;
                Ok(Vec::new())
            }
            TransportAction::Seek => self.seek(args).await,
            TransportAction::GetTransportInfo => {
                Ok(Self::transport_info(&self.session.snapshot()))
            }
            TransportAction::GetPositionInfo => {
                Ok(Self::position_info(&self.session.refresh().await))
            }
            TransportAction::GetMediaInfo => Ok(Self::media_info(&self.session.refresh().await)),
            TransportAction::GetDeviceCapabilities => Ok(vec![
                ("PlayMedia", "NETWORK".to_string()),
                ("RecMedia", "NOT_IMPLEMENTED".to_string()),
                ("RecQualityModes", "NOT_IMPLEMENTED".to_string()),
            ]),
            TransportAction::GetTransportSettings => Ok(vec![
                ("PlayMode", "NORMAL".to_string()),
                ("RecQualityMode", "NOT_IMPLEMENTED".to_string()),
            ]),
            TransportAction::GetCurrentTransportActions => Ok(vec![(
                "Actions",
                Self::current_actions(&self.session.snapshot()).to_string(),
            )]),
        }
    }
}
