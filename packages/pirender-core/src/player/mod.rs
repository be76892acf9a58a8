//! Playback engine integration (mpv over JSON IPC).
//!
//! - `protocol.rs` - JSON request/reply types
//! - `ipc.rs` - line-framed Unix socket channel with reply correlation
//! - `process.rs` - engine process launch, readiness polling and shutdown
//! - `bridge.rs` - serialized command issuance and typed playback operations
//! - `traits.rs` - the [`PlaybackEngine`] seam used by the playback session

mod bridge;
mod ipc;
mod process;
mod protocol;
mod traits;

use std::time::Duration;

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

pub use bridge::PlaybackBridge;
pub use ipc::IpcChannel;
pub use process::{wait_for_endpoint, EngineLaunch, EngineProcess};
pub use protocol::{IpcRequest, IpcResponse};
pub use traits::PlaybackEngine;

/// Errors raised while talking to (or managing) the playback engine.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The IPC endpoint could not be connected to.
    #[error("Playback engine unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No correlated reply arrived in time.
    #[error("Playback engine did not answer within {0:?}")]
    Timeout(Duration),

    /// The engine closed the channel mid-exchange.
    #[error("Playback engine closed the IPC channel")]
    Closed,

    /// Socket read/write failure.
    #[error("Playback engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing failure (e.g. an oversized reply).
    #[error("Playback engine framing error: {0}")]
    Framing(#[from] LinesCodecError),

    /// A request could not be encoded.
    #[error("Failed to encode engine request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The engine answered, but reported an error.
    #[error("Engine rejected {command}: {message}")]
    Command { command: String, message: String },

    /// The engine answered with data of an unexpected shape.
    #[error("Unexpected engine reply for {0}")]
    UnexpectedData(String),

    /// The engine process could not be started or never became reachable.
    #[error("Failed to start playback engine: {0}")]
    Startup(String),
}

impl BridgeError {
    /// Whether the error means the channel is unusable and must be reopened.
    #[must_use]
    pub fn is_channel_failure(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. }
                | Self::Timeout(_)
                | Self::Closed
                | Self::Io(_)
                | Self::Framing(_)
        )
    }
}

/// Convenient Result alias for engine operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
