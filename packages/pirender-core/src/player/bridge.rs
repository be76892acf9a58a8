//! Serialized request/response bridge to the playback engine.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::ipc::IpcChannel;
use super::protocol::{IpcRequest, IpcResponse};
use super::traits::PlaybackEngine;
use super::{BridgeError, BridgeResult};
use crate::protocol_constants::MAX_VOLUME;

/// Channel state guarded by the bridge's critical section.
#[derive(Default)]
struct ChannelSlot {
    /// Open channel, if any. Taken out for the duration of an exchange and
    /// only put back when the exchange completed cleanly.
    channel: Option<IpcChannel>,
    /// Last request id handed out.
    last_request_id: u64,
}

/// Awaits `op`, failing with [`BridgeError::Timeout`] once `limit` elapses.
async fn bounded<T>(limit: Duration, op: impl Future<Output = BridgeResult<T>>) -> BridgeResult<T> {
    tokio::time::timeout(limit, op)
        .await
        .unwrap_or(Err(BridgeError::Timeout(limit)))
}

/// Client for the engine's JSON IPC endpoint.
///
/// The channel is opened lazily on the first command and reused afterwards.
/// Every command runs inside a single async mutex, so at most one
/// request/reply pair is in flight and request ids are assigned in issue
/// order. A timeout or I/O failure discards the channel; the next command
/// reconnects.
pub struct PlaybackBridge {
    endpoint: PathBuf,
    timeout: Duration,
    slot: Mutex<ChannelSlot>,
}

impl PlaybackBridge {
    /// Creates a bridge for the endpoint at `endpoint`. No connection is made yet.
    pub fn new(endpoint: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            slot: Mutex::new(ChannelSlot::default()),
        }
    }

    /// IPC endpoint path.
    #[must_use]
    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    /// Sends a raw command and returns the engine's correlated reply.
    ///
    /// The reply is returned even when the engine reports an error; use the
    /// typed operations for success checking.
    pub async fn send_command(&self, verb: &str, args: &[Value]) -> BridgeResult<IpcResponse> {
        let mut slot = self.slot.lock().await;

        slot.last_request_id += 1;
        let request = IpcRequest::new(verb, args, slot.last_request_id);

        let mut channel = match slot.channel.take() {
            Some(channel) => channel,
            None => {
                let channel = bounded(self.timeout, IpcChannel::connect(&self.endpoint))
                    .await
                    .inspect_err(|e| {
                        log::warn!("[Bridge] Connecting to {} failed: {}", self.endpoint.display(), e);
                    })?;
                log::debug!("[Bridge] Connected to {}", self.endpoint.display());
                channel
            }
        };

        match bounded(self.timeout, channel.exchange(&request)).await {
            Ok(reply) => {
                slot.channel = Some(channel);
                Ok(reply)
            }
            Err(e @ BridgeError::Timeout(_)) => {
                log::warn!(
                    "[Bridge] {} timed out after {:?}, discarding channel",
                    verb,
                    self.timeout
                );
                Err(e)
            }
            Err(e) => {
                log::warn!("[Bridge] {} failed, discarding channel: {}", verb, e);
                Err(e)
            }
        }
    }

    /// Closes the channel, if open. The next command reconnects.
    pub async fn close(&self) {
        if self.slot.lock().await.channel.take().is_some() {
            log::debug!("[Bridge] Channel closed");
        }
    }

    /// Runs a command and converts an engine-reported error into [`BridgeError::Command`].
    async fn run(&self, verb: &str, args: &[Value]) -> BridgeResult<IpcResponse> {
        let reply = self.send_command(verb, args).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(BridgeError::Command {
                command: verb.to_string(),
                message: reply.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }

    /// Reads an engine property.
    pub async fn get_property(&self, name: &str) -> BridgeResult<Value> {
        let reply = self.run("get_property", &[json!(name)]).await?;
        Ok(reply.data.unwrap_or(Value::Null))
    }

    /// Writes an engine property.
    pub async fn set_property(&self, name: &str, value: Value) -> BridgeResult<()> {
        self.run("set_property", &[json!(name), value]).await?;
        Ok(())
    }

    async fn get_f64(&self, name: &str) -> BridgeResult<f64> {
        self.get_property(name)
            .await?
            .as_f64()
            .ok_or_else(|| BridgeError::UnexpectedData(name.to_string()))
    }
}

/// Clamps a requested volume into the engine's accepted range.
#[must_use]
pub(crate) fn clamp_volume(level: i64) -> u8 {
    level.clamp(0, i64::from(MAX_VOLUME)) as u8
}

#[async_trait]
impl PlaybackEngine for PlaybackBridge {
    async fn play(&self, uri: &str) -> BridgeResult<()> {
        log::info!("[Bridge] Loading {}", uri);
        self.run("loadfile", &[json!(uri), json!("replace")]).await?;
        // pause survives loadfile, so clear it explicitly.
        self.set_property("pause", json!(false)).await
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.set_property("pause", json!(true)).await
    }

    async fn resume(&self) -> BridgeResult<()> {
        self.set_property("pause", json!(false)).await
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.run("stop", &[]).await?;
        Ok(())
    }

    async fn set_volume(&self, level: i64) -> BridgeResult<u8> {
        let volume = clamp_volume(level);
        self.set_property("volume", json!(volume)).await?;
        Ok(volume)
    }

    async fn seek(&self, position: f64) -> BridgeResult<()> {
        self.run("seek", &[json!(position), json!("absolute")])
            .await?;
        Ok(())
    }

    async fn query_volume(&self) -> BridgeResult<u8> {
        let volume = self.get_f64("volume").await?;
        Ok(clamp_volume(volume.round() as i64))
    }

    async fn query_position(&self) -> BridgeResult<f64> {
        self.get_f64("time-pos").await
    }

    async fn query_duration(&self) -> BridgeResult<f64> {
        self.get_f64("duration").await
    }

    async fn query_pause_flag(&self) -> BridgeResult<bool> {
        self.get_property("pause")
            .await?
            .as_bool()
            .ok_or_else(|| BridgeError::UnexpectedData("pause".to_string()))
    }
}
