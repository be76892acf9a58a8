//! Playback engine abstraction.
//!
//! The playback session depends on this trait rather than on the concrete IPC
//! bridge, so state-machine behavior can be tested with mock engines.

use async_trait::async_trait;

use super::BridgeResult;

/// Typed playback operations offered by the external engine.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Loads `uri`, replacing the current media, and starts playback.
    async fn play(&self, uri: &str) -> BridgeResult<()>;

    /// Pauses playback.
    async fn pause(&self) -> BridgeResult<()>;

    /// Resumes paused playback.
    async fn resume(&self) -> BridgeResult<()>;

    /// Stops playback and unloads the media.
    async fn stop(&self) -> BridgeResult<()>;

    /// Sets the output volume, clamped to 0-100. Returns the applied level.
    async fn set_volume(&self, level: i64) -> BridgeResult<u8>;

    /// Seeks to an absolute position in seconds.
    async fn seek(&self, position: f64) -> BridgeResult<()>;

    /// Current output volume (0-100).
    async fn query_volume(&self) -> BridgeResult<u8>;

    /// Current playback position in seconds.
    async fn query_position(&self) -> BridgeResult<f64>;

    /// Duration of the loaded media in seconds.
    async fn query_duration(&self) -> BridgeResult<f64>;

    /// Whether the engine is paused.
    async fn query_pause_flag(&self) -> BridgeResult<bool>;
}
