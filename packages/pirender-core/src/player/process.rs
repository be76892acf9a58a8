//! Playback engine process lifecycle.
//!
//! The engine is an mpv instance started in idle mode with its JSON IPC server
//! bound to a Unix socket. Startup is considered complete once that socket
//! accepts connections.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use super::{BridgeError, BridgeResult};
use crate::protocol_constants::{
    ENGINE_SHUTDOWN_GRACE_SECS, ENGINE_STARTUP_POLL_ATTEMPTS, ENGINE_STARTUP_POLL_MS,
};

/// Parameters used to launch the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineLaunch {
    /// Engine executable (looked up on `PATH` when not absolute).
    pub binary: String,
    /// IPC endpoint path.
    pub socket_path: PathBuf,
    /// Audio output driver (`--ao`).
    pub output_driver: String,
    /// Initial engine volume.
    pub volume: u8,
    /// Enable the demuxer cache.
    pub cache: bool,
    /// Demuxer cache size (mpv size notation, e.g. `2M`).
    pub demuxer_max_bytes: String,
}

impl EngineLaunch {
    /// Command-line arguments passed to the engine.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--input-ipc-server={}", self.socket_path.display()),
            "--idle=yes".to_string(),
            "--no-video".to_string(),
            "--no-terminal".to_string(),
            format!("--ao={}", self.output_driver),
            format!("--volume={}", self.volume),
        ];

        if self.cache {
            args.push("--cache=yes".to_string());
            args.push(format!("--demuxer-max-bytes={}", self.demuxer_max_bytes));
        }

        args
    }
}

/// A running engine process owned by this renderer.
pub struct EngineProcess {
    child: Child,
    socket_path: PathBuf,
}

impl EngineProcess {
    /// Launches the engine and waits until its IPC endpoint is connectable.
    ///
    /// A stale socket file from a previous run is removed first. If the
    /// endpoint never appears the process is terminated and an error returned.
    pub async fn spawn(launch: &EngineLaunch) -> BridgeResult<Self> {
        remove_socket_file(&launch.socket_path).await;

        log::info!(
            "[Engine] Starting {} {}",
            launch.binary,
            launch.args().join(" ")
        );

        let child = Command::new(&launch.binary)
            .args(launch.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Startup(format!("cannot launch {}: {}", launch.binary, e)))?;

        let mut process = Self {
            child,
            socket_path: launch.socket_path.clone(),
        };

        if let Err(e) = process.wait_ready().await {
            process.shutdown().await;
            return Err(e);
        }

        log::info!(
            "[Engine] Ready (pid {:?}, socket {})",
            process.child.id(),
            process.socket_path.display()
        );
        Ok(process)
    }

    /// Polls the endpoint, failing early if the process exits first.
    async fn wait_ready(&mut self) -> BridgeResult<()> {
        let interval = Duration::from_millis(ENGINE_STARTUP_POLL_MS);

        for _ in 0..ENGINE_STARTUP_POLL_ATTEMPTS {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Err(BridgeError::Startup(format!(
                    "engine exited during startup ({})",
                    status
                )));
            }
            if UnixStream::connect(&self.socket_path).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }

        Err(BridgeError::Startup(format!(
            "IPC endpoint {} never became connectable",
            self.socket_path.display()
        )))
    }

    /// Terminates the engine: SIGTERM, a grace period, then a forced kill.
    ///
    /// The IPC socket file is removed afterwards. Failures are logged only.
    pub async fn shutdown(&mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            log::info!("[Engine] Already exited ({})", status);
        } else {
            self.terminate_gracefully().await;
        }

        remove_socket_file(&self.socket_path).await;
    }

    async fn terminate_gracefully(&mut self) {
        if send_terminate(&self.child) {
            let grace = Duration::from_secs(ENGINE_SHUTDOWN_GRACE_SECS);
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    log::info!("[Engine] Stopped ({})", status);
                    return;
                }
                Ok(Err(e)) => log::warn!("[Engine] Failed to wait for exit: {}", e),
                Err(_) => log::warn!("[Engine] Did not exit within {:?}, killing", grace),
            }
        }

        if let Err(e) = self.child.kill().await {
            log::warn!("[Engine] Failed to kill engine process: {}", e);
        } else {
            log::info!("[Engine] Killed");
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };

    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // a child we have not yet reaped, so it cannot have been recycled.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        log::warn!(
            "[Engine] SIGTERM failed: {}",
            std::io::Error::last_os_error()
        );
    }
    result == 0
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> bool {
    false
}

/// Polls until `path` accepts a connection or the attempts run out.
pub async fn wait_for_endpoint(path: &Path, attempts: u32, interval: Duration) -> BridgeResult<()> {
    for _ in 0..attempts {
        if UnixStream::connect(path).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }

    Err(BridgeError::Startup(format!(
        "IPC endpoint {} never became connectable",
        path.display()
    )))
}

async fn remove_socket_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("[Engine] Removed socket file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "[Engine] Failed to remove socket file {}: {}",
            path.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    fn launch(cache: bool) -> EngineLaunch {
        EngineLaunch {
            binary: "mpv".to_string(),
            socket_path: PathBuf::from("/tmp/mpv-socket"),
            output_driver: "alsa".to_string(),
            volume: 50,
            cache,
            demuxer_max_bytes: "2M".to_string(),
        }
    }

    #[test]
    fn args_include_ipc_and_audio_options() {
        assert_eq!(
            launch(false).args(),
            vec![
                "--input-ipc-server=/tmp/mpv-socket",
                "--idle=yes",
                "--no-video",
                "--no-terminal",
                "--ao=alsa",
                "--volume=50",
            ]
        );
    }

    #[test]
    fn cache_options_are_appended_when_enabled() {
        let args = launch(true).args();
        assert_eq!(
            &args[args.len() - 2..],
            &["--cache=yes", "--demuxer-max-bytes=2M"]
        );
    }

    #[tokio::test]
    async fn wait_for_endpoint_succeeds_once_listener_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.sock");

        let bind_path = path.clone();
        let listener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let listener = UnixListener::bind(&bind_path).unwrap();
            let _ = listener.accept().await;
        });

        wait_for_endpoint(&path, 40, Duration::from_millis(10))
            .await
            .unwrap();
        listener.abort();
    }

    #[tokio::test]
    async fn wait_for_endpoint_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            wait_for_endpoint(&dir.path().join("never.sock"), 3, Duration::from_millis(1)).await;
        assert!(matches!(result, Err(BridgeError::Startup(_))));
    }

    #[tokio::test]
    async fn spawn_fails_for_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = launch(false);
        params.binary = "/nonexistent/engine-binary".to_string();
        params.socket_path = dir.path().join("engine.sock");

        let result = EngineProcess::spawn(&params).await;
        assert!(matches!(result, Err(BridgeError::Startup(_))));
    }
}
