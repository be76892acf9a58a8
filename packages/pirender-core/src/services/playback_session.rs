//! The renderer's single playback session.
//!
//! [`PlaybackSession`] is the authoritative record of transport state, loaded
//! media, volume and mute. It is mutated only through the results of engine
//! commands.
//!
//! # Concurrency design
//!
//! State lives behind a `parking_lot::RwLock` that is never held across an
//! engine call: each operation validates and records its intent, releases the
//! lock, awaits the engine, then re-acquires the lock to apply the outcome.
//! Readers may therefore observe `TRANSITIONING`, which is a valid, reportable
//! state. Every transport transition bumps an epoch; a slow engine reply that
//! lands after a newer transition (typically `Stop`) is discarded instead of
//! resurrecting stale state.
//!
//! Volume and mute changes are read-modify-write sequences spanning several
//! engine calls, so they are additionally serialized by an async mutex.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::player::{BridgeError, PlaybackEngine};

/// UPnP AVTransport transport states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Stopped,
    Transitioning,
    Playing,
    PausedPlayback,
}

impl TransportState {
    /// The `CurrentTransportState` value reported to control points.
    #[must_use]
    pub fn as_upnp(&self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Transitioning => "TRANSITIONING",
            Self::Playing => "PLAYING",
            Self::PausedPlayback => "PAUSED_PLAYBACK",
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_upnp())
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub state: TransportState,
    pub current_uri: String,
    pub current_uri_metadata: String,
    /// Output volume, always within 0-100.
    pub volume: u8,
    pub muted: bool,
    /// Volume to restore on unmute; only set while `muted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_before_mute: Option<u8>,
    /// Playback position in seconds.
    pub position: f64,
    /// Media duration in seconds (0 when unknown).
    pub duration: f64,
}

impl SessionState {
    fn new(volume: u8) -> Self {
        Self {
            state: TransportState::Stopped,
            current_uri: String::new(),
            current_uri_metadata: String::new(),
            volume,
            muted: false,
            volume_before_mute: None,
            position: 0.0,
            duration: 0.0,
        }
    }
}

/// Errors returned by session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `Play` was requested before any media URI was set.
    #[error("No media URI set")]
    NoMedia,

    /// The requested transition is not available from the current state.
    #[error("{action} not available while {state}")]
    InvalidTransition {
        action: &'static str,
        state: TransportState,
    },

    /// The engine failed to carry out the command.
    #[error(transparent)]
    Engine(#[from] BridgeError),
}

#[derive(Debug)]
struct Inner {
    snapshot: SessionState,
    /// URI the engine currently has loaded, if any.
    loaded_uri: Option<String>,
    /// Incremented by every transport transition that supersedes earlier ones.
    epoch: u64,
}

/// The renderer's single playback session.
pub struct PlaybackSession {
    engine: Arc<dyn PlaybackEngine>,
    inner: RwLock<Inner>,
    /// Held across volume and mute transitions.
    volume_lock: tokio::sync::Mutex<()>,
}

impl PlaybackSession {
    /// Creates the session in `STOPPED` with the configured default volume.
    pub fn new(engine: Arc<dyn PlaybackEngine>, default_volume: u8) -> Self {
        Self {
            engine,
            inner: RwLock::new(Inner {
                snapshot: SessionState::new(default_volume.min(100)),
                loaded_uri: None,
                epoch: 0,
            }),
            volume_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns a copy of the current state without querying the engine.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().snapshot.clone()
    }

    /// Current transport state.
    #[must_use]
    pub fn transport_state(&self) -> TransportState {
        self.inner.read().snapshot.state
    }

    /// Whether output is muted.
    #[must_use]
    pub fn muted(&self) -> bool {
        self.inner.read().snapshot.muted
    }

    /// Stores the media URI and metadata. Playback is not started.
    pub fn set_uri(&self, uri: &str, metadata: &str) {
        let mut inner = self.inner.write();
        inner.snapshot.current_uri = uri.to_string();
        inner.snapshot.current_uri_metadata = metadata.to_string();
        log::info!("[Session] URI set to {}", uri);
    }

    /// Loads the current URI and starts playback.
    ///
    /// From `PAUSED_PLAYBACK` with the same media still loaded this resumes
    /// instead of reloading.
    pub async fn play(&self) -> Result<(), SessionError> {
        let target = {
            let mut inner = self.inner.write();
            if inner.snapshot.current_uri.is_empty() {
                return Err(SessionError::NoMedia);
            }

            let same_media =
                inner.loaded_uri.as_deref() == Some(inner.snapshot.current_uri.as_str());
            if inner.snapshot.state == TransportState::PausedPlayback && same_media {
                None
            } else {
                inner.epoch += 1;
                inner.snapshot.state = TransportState::Transitioning;
                Some((inner.snapshot.current_uri.clone(), inner.epoch))
            }
        };

        let Some((uri, epoch)) = target else {
            return self.resume().await;
        };

        let result = self.engine.play(&uri).await;

        let mut inner = self.inner.write();
        if inner.epoch != epoch {
            log::debug!("[Session] Play of {} superseded by a newer transition", uri);
            return result.map_err(SessionError::from);
        }

        match result {
            Ok(()) => {
                inner.snapshot.state = TransportState::Playing;
                inner.snapshot.position = 0.0;
                inner.loaded_uri = Some(uri);
                log::info!("[Session] Playing");
                Ok(())
            }
            Err(e) => {
                inner.snapshot.state = TransportState::Stopped;
                inner.loaded_uri = None;
                log::error!("[Session] Failed to play {}: {}", uri, e);
                Err(e.into())
            }
        }
    }

    /// Pauses playback. Pausing while already paused is a no-op.
    pub async fn pause(&self) -> Result<(), SessionError> {
        let epoch = {
            let inner = self.inner.read();
            match inner.snapshot.state {
                TransportState::Playing => inner.epoch,
                TransportState::PausedPlayback => return Ok(()),
                state => {
                    return Err(SessionError::InvalidTransition {
                        action: "Pause",
                        state,
                    })
                }
            }
        };

        self.engine.pause().await?;

        let mut inner = self.inner.write();
        if inner.epoch == epoch && inner.snapshot.state == TransportState::Playing {
            inner.snapshot.state = TransportState::PausedPlayback;
            log::info!("[Session] Paused");
        }
        Ok(())
    }

    /// Resumes paused playback. Resuming while playing is a no-op.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let epoch = {
            let inner = self.inner.read();
            match inner.snapshot.state {
                TransportState::PausedPlayback => inner.epoch,
                TransportState::Playing => return Ok(()),
                state => {
                    return Err(SessionError::InvalidTransition {
                        action: "Resume",
                        state,
                    })
                }
            }
        };

        self.engine.resume().await?;

        let mut inner = self.inner.write();
        if inner.epoch == epoch && inner.snapshot.state == TransportState::PausedPlayback {
            inner.snapshot.state = TransportState::Playing;
            log::info!("[Session] Resumed");
        }
        Ok(())
    }

    /// Stops playback from any state.
    ///
    /// The session is reset to `STOPPED` with URI, metadata, position and
    /// duration cleared before the engine is told to stop; an engine failure is
    /// logged and never reported to the caller.
    pub async fn stop(&self) {
        {
            let mut inner = self.inner.write();
            inner.epoch += 1;
            inner.loaded_uri = None;
            let snapshot = &mut inner.snapshot;
            snapshot.state = TransportState::Stopped;
            snapshot.current_uri.clear();
            snapshot.current_uri_metadata.clear();
            snapshot.position = 0.0;
            snapshot.duration = 0.0;
        }

        match self.engine.stop().await {
            Ok(()) => log::info!("[Session] Stopped"),
            Err(e) => log::warn!("[Session] Engine stop failed (state reset anyway): {}", e),
        }
    }

    /// Seeks to `position` seconds. Not available while stopped.
    pub async fn seek(&self, position: f64) -> Result<(), SessionError> {
        let state = self.transport_state();
        if state == TransportState::Stopped {
            return Err(SessionError::InvalidTransition {
                action: "Seek",
                state,
            });
        }

        self.engine.seek(position).await?;

        self.inner.write().snapshot.position = position.max(0.0);
        log::info!("[Session] Seeked to {:.1}s", position);
        Ok(())
    }

    /// Sets the output volume (clamped to 0-100) and returns the applied level.
    ///
    /// An explicit volume change ends any active mute.
    pub async fn set_volume(&self, level: i64) -> Result<u8, SessionError> {
        let _guard = self.volume_lock.lock().await;
        let applied = self.engine.set_volume(level).await?;

        let mut inner = self.inner.write();
        inner.snapshot.volume = applied;
        inner.snapshot.muted = false;
        inner.snapshot.volume_before_mute = None;
        Ok(applied)
    }

    /// Current output volume, refreshed from the engine when reachable.
    pub async fn volume(&self) -> u8 {
        match self.engine.query_volume().await {
            Ok(volume) => {
                self.inner.write().snapshot.volume = volume;
                volume
            }
            Err(e) => {
                log::debug!("[Session] Volume query failed, using cached value: {}", e);
                self.inner.read().snapshot.volume
            }
        }
    }

    /// Mutes or unmutes output.
    ///
    /// Muting snapshots the current volume and drives the engine to 0;
    /// unmuting restores the snapshot when one exists. Repeating the current
    /// mute state is a no-op.
    pub async fn set_mute(&self, mute: bool) -> Result<(), SessionError> {
        let _guard = self.volume_lock.lock().await;
        let (muted, restore) = {
            let inner = self.inner.read();
            (inner.snapshot.muted, inner.snapshot.volume_before_mute)
        };

        if mute {
            if muted {
                return Ok(());
            }
            let before = self.volume().await;
            self.engine.set_volume(0).await?;

            let mut inner = self.inner.write();
            inner.snapshot.muted = true;
            inner.snapshot.volume_before_mute = Some(before);
            inner.snapshot.volume = 0;
            log::info!("[Session] Muted (was {})", before);
        } else {
            if let Some(volume) = restore {
                let applied = self.engine.set_volume(i64::from(volume)).await?;
                self.inner.write().snapshot.volume = applied;
            }

            let mut inner = self.inner.write();
            inner.snapshot.muted = false;
            inner.snapshot.volume_before_mute = None;
            if muted {
                log::info!("[Session] Unmuted");
            }
        }
        Ok(())
    }

    /// Returns the current state, refreshing position and duration from the
    /// engine while playing. Query failures keep the cached values.
    pub async fn refresh(&self) -> SessionState {
        if self.transport_state() != TransportState::Playing {
            return self.snapshot();
        }

        let position = self.engine.query_position().await;
        let duration = self.engine.query_duration().await;

        let mut inner = self.inner.write();
        if inner.snapshot.state == TransportState::Playing {
            if let Ok(position) = position {
                inner.snapshot.position = position.max(0.0);
            }
            if let Ok(duration) = duration {
                inner.snapshot.duration = if duration.is_finite() {
                    duration.max(0.0)
                } else {
                    0.0
                };
            }
        }
        inner.snapshot.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use crate::player::BridgeResult;

    /// Mock engine that records calls and can be told to fail.
    pub(crate) struct MockEngine {
        pub calls: Mutex<Vec<String>>,
        pub volume: AtomicU8,
        pub should_fail: AtomicBool,
        pub position: f64,
        pub duration: f64,
        /// When set, `play` waits for this notification before answering.
        pub play_gate: Option<Arc<Notify>>,
        /// Latency applied to every `set_volume`.
        pub set_volume_delay: Duration,
        /// Per-call latencies for successive `query_volume` calls.
        pub query_volume_delays: Mutex<VecDeque<Duration>>,
    }

    impl Default for MockEngine {
        fn default() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                volume: AtomicU8::new(50),
                should_fail: AtomicBool::new(false),
                position: 12.0,
                duration: 180.0,
                play_gate: None,
                set_volume_delay: Duration::ZERO,
                query_volume_delays: Mutex::new(VecDeque::new()),
            }
        }
    }

    impl MockEngine {
        pub fn failing() -> Self {
            let engine = Self::default();
            engine.should_fail.store(true, Ordering::SeqCst);
            engine
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: String) -> BridgeResult<()> {
            self.calls.lock().push(call);
            if self.should_fail.load(Ordering::SeqCst) {
                Err(BridgeError::Closed)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PlaybackEngine for MockEngine {
        async fn play(&self, uri: &str) -> BridgeResult<()> {
            if let Some(gate) = &self.play_gate {
                gate.notified().await;
            }
            self.record(format!("play {uri}"))
        }

        async fn pause(&self) -> BridgeResult<()> {
            self.record("pause".to_string())
        }

        async fn resume(&self) -> BridgeResult<()> {
            self.record("resume".to_string())
        }

        async fn stop(&self) -> BridgeResult<()> {
            self.record("stop".to_string())
        }

        async fn set_volume(&self, level: i64) -> BridgeResult<u8> {
            let volume = level.clamp(0, 100) as u8;
            if !self.set_volume_delay.is_zero() {
                tokio::time::sleep(self.set_volume_delay).await;
            }
            self.record(format!("volume {volume}"))?;
            self.volume.store(volume, Ordering::SeqCst);
            Ok(volume)
        }

        async fn seek(&self, position: f64) -> BridgeResult<()> {
            self.record(format!("seek {position}"))
        }

        async fn query_volume(&self) -> BridgeResult<u8> {
            let delay = self.query_volume_delays.lock().pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(BridgeError::Closed);
            }
            Ok(self.volume.load(Ordering::SeqCst))
        }

        async fn query_position(&self) -> BridgeResult<f64> {
            Ok(self.position)
        }

        async fn query_duration(&self) -> BridgeResult<f64> {
            Ok(self.duration)
        }

        async fn query_pause_flag(&self) -> BridgeResult<bool> {
            Ok(false)
        }
    }

    fn session_with(engine: Arc<MockEngine>) -> PlaybackSession {
        PlaybackSession::new(engine, 50)
    }

    #[tokio::test]
    async fn starts_stopped_with_default_volume() {
        let session = session_with(Arc::new(MockEngine::default()));
        let state = session.snapshot();
        assert_eq!(state.state, TransportState::Stopped);
        assert_eq!(state.volume, 50);
        assert!(state.current_uri.is_empty());
    }

    #[tokio::test]
    async fn play_without_uri_fails_without_state_change() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());

        assert!(matches!(session.play().await, Err(SessionError::NoMedia)));
        assert_eq!(session.transport_state(), TransportState::Stopped);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn play_reaches_playing_on_success() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());

        session.set_uri("http://x/y.mp3", "");
        session.play().await.unwrap();

        assert_eq!(session.transport_state(), TransportState::Playing);
        assert_eq!(engine.calls(), vec!["play http://x/y.mp3"]);
    }

    #[tokio::test]
    async fn failed_play_falls_back_to_stopped() {
        let engine = Arc::new(MockEngine::failing());
        let session = session_with(engine);

        session.set_uri("http://x/y.mp3", "");
        assert!(matches!(
            session.play().await,
            Err(SessionError::Engine(_))
        ));
        assert_eq!(session.transport_state(), TransportState::Stopped);
        // The URI stays set so the control point can retry.
        assert_eq!(session.snapshot().current_uri, "http://x/y.mp3");
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_between_playing_and_paused() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());
        session.set_uri("http://x/y.mp3", "");
        session.play().await.unwrap();

        session.pause().await.unwrap();
        assert_eq!(session.transport_state(), TransportState::PausedPlayback);

        // Play from paused with the same media resumes.
        session.play().await.unwrap();
        assert_eq!(session.transport_state(), TransportState::Playing);
        assert_eq!(
            engine.calls(),
            vec!["play http://x/y.mp3", "pause", "resume"]
        );
    }

    #[tokio::test]
    async fn pause_from_stopped_is_rejected() {
        let session = session_with(Arc::new(MockEngine::default()));
        assert!(matches!(
            session.pause().await,
            Err(SessionError::InvalidTransition {
                action: "Pause",
                state: TransportState::Stopped
            })
        ));
    }

    #[tokio::test]
    async fn stop_always_resets_even_when_engine_fails() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());
        session.set_uri("http://x/y.mp3", "<DIDL-Lite/>");
        session.play().await.unwrap();

        engine.should_fail.store(true, Ordering::SeqCst);
        session.stop().await;

        let state = session.snapshot();
        assert_eq!(state.state, TransportState::Stopped);
        assert!(state.current_uri.is_empty());
        assert!(state.current_uri_metadata.is_empty());
        assert_eq!(state.position, 0.0);
        assert_eq!(state.duration, 0.0);
    }

    #[tokio::test]
    async fn stop_during_transition_wins_over_late_play_reply() {
        let gate = Arc::new(Notify::new());
        let engine = Arc::new(MockEngine {
            play_gate: Some(gate.clone()),
            ..MockEngine::default()
        });
        let session = Arc::new(session_with(engine.clone()));
        session.set_uri("http://x/y.mp3", "");

        let playing = {
            let session = session.clone();
            tokio::spawn(async move { session.play().await })
        };
        while session.transport_state() != TransportState::Transitioning {
            tokio::task::yield_now().await;
        }

        engine.should_fail.store(true, Ordering::SeqCst);
        session.stop().await;
        assert_eq!(session.transport_state(), TransportState::Stopped);

        engine.should_fail.store(false, Ordering::SeqCst);
        gate.notify_one();
        playing.await.unwrap().unwrap();

        let state = session.snapshot();
        assert_eq!(state.state, TransportState::Stopped);
        assert!(state.current_uri.is_empty());
    }

    #[tokio::test]
    async fn seek_requires_loaded_media() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());
        assert!(session.seek(30.0).await.is_err());

        session.set_uri("http://x/y.mp3", "");
        session.play().await.unwrap();
        session.seek(30.0).await.unwrap();
        assert_eq!(session.snapshot().position, 30.0);
    }

    #[tokio::test]
    async fn refresh_polls_engine_only_while_playing() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());

        let idle = session.refresh().await;
        assert_eq!(idle.duration, 0.0);

        session.set_uri("http://x/y.mp3", "");
        session.play().await.unwrap();
        let playing = session.refresh().await;
        assert_eq!(playing.position, 12.0);
        assert_eq!(playing.duration, 180.0);
    }

    #[tokio::test]
    async fn set_volume_clamps_and_updates_cache() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());

        assert_eq!(session.set_volume(250).await.unwrap(), 100);
        assert_eq!(session.snapshot().volume, 100);
        assert_eq!(session.set_volume(-3).await.unwrap(), 0);
        assert_eq!(engine.calls(), vec!["volume 100", "volume 0"]);
    }

    #[tokio::test]
    async fn mute_round_trip_restores_exact_volume() {
        let engine = Arc::new(MockEngine::default());
        engine.volume.store(37, Ordering::SeqCst);
        let session = session_with(engine.clone());

        session.set_mute(true).await.unwrap();
        assert!(session.muted());
        assert_eq!(engine.volume.load(Ordering::SeqCst), 0);

        // Muting twice must not overwrite the snapshot with 0.
        session.set_mute(true).await.unwrap();

        session.set_mute(false).await.unwrap();
        assert!(!session.muted());
        assert_eq!(engine.volume.load(Ordering::SeqCst), 37);
        assert_eq!(session.snapshot().volume, 37);
    }

    #[tokio::test]
    async fn concurrent_mutes_keep_the_pre_mute_volume() {
        // The second volume query is slow enough to land after the first
        // mute has already driven the engine to 0.
        let engine = Arc::new(MockEngine {
            set_volume_delay: Duration::from_millis(5),
            query_volume_delays: Mutex::new(VecDeque::from([
                Duration::ZERO,
                Duration::from_millis(20),
            ])),
            ..MockEngine::default()
        });
        engine.volume.store(60, Ordering::SeqCst);
        let session = session_with(engine.clone());

        let (first, second) = tokio::join!(session.set_mute(true), session.set_mute(true));
        first.unwrap();
        second.unwrap();
        assert!(session.muted());
        assert_eq!(engine.calls(), vec!["volume 0"]);

        session.set_mute(false).await.unwrap();
        assert!(!session.muted());
        assert_eq!(engine.volume.load(Ordering::SeqCst), 60);
        assert_eq!(session.snapshot().volume, 60);
    }

    #[tokio::test]
    async fn volume_change_during_mute_is_not_overwritten() {
        let engine = Arc::new(MockEngine {
            set_volume_delay: Duration::from_millis(5),
            ..MockEngine::default()
        });
        let session = session_with(engine.clone());

        let (muted, volume) = tokio::join!(session.set_mute(true), session.set_volume(30));
        muted.unwrap();
        assert_eq!(volume.unwrap(), 30);

        // SetVolume ran after the mute and cleared it.
        let state = session.snapshot();
        assert!(!state.muted);
        assert_eq!(state.volume, 30);
        assert_eq!(state.volume_before_mute, None);
        assert_eq!(engine.volume.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn unmute_without_prior_mute_is_a_noop() {
        let engine = Arc::new(MockEngine::default());
        let session = session_with(engine.clone());

        session.set_mute(false).await.unwrap();
        assert!(!session.muted());
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn volume_falls_back_to_cache_when_engine_unreachable() {
        let engine = Arc::new(MockEngine::failing());
        let session = session_with(engine);
        assert_eq!(session.volume().await, 50);
    }
}
