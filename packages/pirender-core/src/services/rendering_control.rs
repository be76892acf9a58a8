//! RenderingControl service: volume and mute.

use std::sync::Arc;

use async_trait::async_trait;

use super::playback_session::PlaybackSession;
use super::ControlService;
use crate::error::{ControlError, ControlResult};
use crate::upnp::soap::{ActionArgs, ActionOutput};
use crate::upnp::UpnpService;

/// Actions understood by the RenderingControl service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingAction {
    GetVolume,
    SetVolume,
    GetMute,
    SetMute,
}

impl RenderingAction {
    pub const ALL: [RenderingAction; 4] = [
        Self::GetVolume,
        Self::SetVolume,
        Self::GetMute,
        Self::SetMute,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetVolume => "GetVolume",
            Self::SetVolume => "SetVolume",
            Self::GetMute => "GetMute",
            Self::SetMute => "SetMute",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Parses a UPnP boolean (`1`/`0`, `true`/`false`, `yes`/`no`).
fn parse_upnp_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// The RenderingControl service.
pub struct RenderingControlService {
    session: Arc<PlaybackSession>,
}

impl RenderingControlService {
    pub fn new(session: Arc<PlaybackSession>) -> Self {
        Self { session }
    }

    async fn set_volume(&self, args: &ActionArgs) -> ControlResult<ActionOutput> {
        let raw = args
            .get("DesiredVolume")
            .ok_or_else(|| ControlError::missing("DesiredVolume"))?;
        let level: i64 = raw.trim().parse().map_err(|_| {
            ControlError::InvalidArgument(format!("DesiredVolume is not a number: {}", raw))
        })?;

        let applied = self.session.set_volume(level).await?;
        log::info!("[Rendering] Volume set to {}", applied);
        Ok(Vec::new())
    }

    async fn set_mute(&self, args: &ActionArgs) -> ControlResult<ActionOutput> {
        let raw = args
            .get("DesiredMute")
            .ok_or_else(|| ControlError::missing("DesiredMute"))?;
        let mute = parse_upnp_bool(raw).ok_or_else(|| {
            ControlError::InvalidArgument(format!("DesiredMute is not a boolean: {}", raw))
        })?;

        self.session.set_mute(mute).await?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl ControlService for RenderingControlService {
    fn service(&self) -> UpnpService {
        UpnpService::RenderingControl
    }

    async fn dispatch(&self, action: &str, args: &ActionArgs) -> ControlResult<ActionOutput> {
        let action = RenderingAction::from_name(action)
            .ok_or_else(|| ControlError::UnknownAction(action.to_string()))?;

        match action {
            RenderingAction::GetVolume => Ok(vec![(
                "CurrentVolume",
                self.session.volume().await.to_string(),
            )]),
            RenderingAction::SetVolume => self.set_volume(args).await,
            RenderingAction::GetMute => {
                let muted = if self.session.muted() { "1" } else { "0" };
                Ok(vec![("CurrentMute", muted.to_string())])
            }
            RenderingAction::SetMute => self.set_mute(args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::services::playback_session::tests::MockEngine;

    fn service_with(engine: Arc<MockEngine>) -> RenderingControlService {
        RenderingControlService::new(Arc::new(PlaybackSession::new(engine, 50)))
    }

    fn args(pairs: &[(&str, &str)]) -> ActionArgs {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn set_volume_clamps_out_of_range_values() {
        let engine = Arc::new(MockEngine::default());
        let service = service_with(engine.clone());

        for (requested, expected) in [("150", 100), ("-20", 0), ("64", 64)] {
            service
                .dispatch(
                    "SetVolume",
                    &args(&[("InstanceID", "0"), ("Channel", "Master"), ("DesiredVolume", requested)]),
                )
                .await
                .unwrap();
            assert_eq!(engine.volume.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test]
    async fn non_numeric_volume_is_invalid_args() {
        let engine = Arc::new(MockEngine::default());
        let service = service_with(engine.clone());

        let err = service
            .dispatch("SetVolume", &args(&[("DesiredVolume", "loud")]))
            .await
            .unwrap_err();
        assert_eq!(err.upnp_code(), 402);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn get_volume_reports_engine_volume() {
        let engine = Arc::new(MockEngine::default());
        engine.volume.store(73, Ordering::SeqCst);
        let service = service_with(engine);

        let output = service
            .dispatch("GetVolume", &args(&[("InstanceID", "0"), ("Channel", "Master")]))
            .await
            .unwrap();
        assert_eq!(output, vec![("CurrentVolume", "73".to_string())]);
    }

    #[tokio::test]
    async fn mute_then_unmute_restores_volume() {
        let engine = Arc::new(MockEngine::default());
        engine.volume.store(42, Ordering::SeqCst);
        let service = service_with(engine.clone());

        service
            .dispatch("SetMute", &args(&[("DesiredMute", "1")]))
            .await
            .unwrap();
        let mute = service.dispatch("GetMute", &ActionArgs::new()).await.unwrap();
        assert_eq!(mute, vec![("CurrentMute", "1".to_string())]);
        assert_eq!(engine.volume.load(Ordering::SeqCst), 0);

        service
            .dispatch("SetMute", &args(&[("DesiredMute", "false")]))
            .await
            .unwrap();
        let mute = service.dispatch("GetMute", &ActionArgs::new()).await.unwrap();
        assert_eq!(mute, vec![("CurrentMute", "0".to_string())]);
        assert_eq!(engine.volume.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn upnp_booleans() {
        assert_eq!(parse_upnp_bool("1"), Some(true));
        assert_eq!(parse_upnp_bool("True"), Some(true));
        assert_eq!(parse_upnp_bool("no"), Some(false));
        assert_eq!(parse_upnp_bool("maybe"), None);
    }

    #[tokio::test]
    async fn unknown_action_is_invalid_action() {
        let service = service_with(Arc::new(MockEngine::default()));
        let err = service
            .dispatch("ListPresets", &ActionArgs::new())
            .await
            .unwrap_err();
        assert_eq!(err.upnp_code(), 401);
    }
}
