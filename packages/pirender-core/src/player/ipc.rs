//! Line-framed duplex channel to the engine's Unix socket.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};

use super::protocol::{IpcRequest, IpcResponse};
use super::{BridgeError, BridgeResult};

/// Upper bound for a single line read from the engine.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// An open connection to the engine's IPC endpoint.
///
/// The channel carries one request/reply pair at a time; callers are expected
/// to serialize access (see [`PlaybackBridge`](super::PlaybackBridge)).
pub struct IpcChannel {
    framed: Framed<UnixStream, LinesCodec>,
}

impl IpcChannel {
    /// Connects to the endpoint at `path`.
    pub async fn connect(path: &Path) -> BridgeResult<Self> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| BridgeError::Unavailable {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
        })
    }

    /// Writes one request and reads lines until the correlated reply arrives.
    ///
    /// Unsolicited events, replies to other request ids and unparseable lines
    /// are skipped. End of stream is reported as [`BridgeError::Closed`].
    pub async fn exchange(&mut self, request: &IpcRequest) -> BridgeResult<IpcResponse> {
        self.framed.send(request.to_line()?).await?;

        while let Some(line) = self.framed.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match IpcResponse::from_line(&line) {
                Ok(reply) if reply.answers(request.request_id) => return Ok(reply),
                Ok(other) => {
                    if let Some(event) = other.event {
                        log::trace!("[Bridge] Skipping engine event: {}", event);
                    } else {
                        log::debug!(
                            "[Bridge] Skipping stale reply {:?} while waiting for {}",
                            other.request_id,
                            request.request_id
                        );
                    }
                }
                Err(e) => log::debug!("[Bridge] Ignoring unparseable engine line: {}", e),
            }
        }

        Err(BridgeError::Closed)
    }
}
