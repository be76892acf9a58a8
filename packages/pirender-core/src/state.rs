//! Renderer configuration types.
//!
//! [`Config`] is plain data: the server binary fills it from YAML, environment
//! variables and CLI flags, then hands it to
//! [`bootstrap_services`](crate::bootstrap::bootstrap_services).

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    ENGINE_IPC_TIMEOUT_MS, MAX_VOLUME, SSDP_ANNOUNCE_INTERVAL_SECS, SSDP_MULTICAST_ADDR, SSDP_PORT,
};

/// Identity and model information published in the device description.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Friendly name shown by control points.
    pub name: String,
    /// Device UUID without the `uuid:` prefix.
    pub uuid: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_number: String,
    pub serial_number: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Raspberry Pi Audio Renderer".to_string(),
            uuid: "12345678-1234-1234-1234-123456789012".to_string(),
            manufacturer: "DIY Audio".to_string(),
            model_name: "Pi Audio Renderer".to_string(),
            model_number: "1.0".to_string(),
            serial_number: "000001".to_string(),
        }
    }
}

/// Network addressing and discovery settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface whose IPv4 address is advertised when no override is given.
    pub interface: String,
    /// Explicit address to advertise to control points.
    pub advertise_ip: Option<IpAddr>,
    /// Port of the description/control HTTP server.
    pub http_port: u16,
    /// SSDP multicast group.
    pub ssdp_multicast_ip: String,
    /// SSDP port.
    pub ssdp_port: u16,
    /// Interval between presence announcements (seconds).
    pub announce_interval: u64,
}

impl NetworkConfig {
    #[must_use]
    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            advertise_ip: None,
            http_port: 8000,
            ssdp_multicast_ip: SSDP_MULTICAST_ADDR.to_string(),
            ssdp_port: SSDP_PORT,
            announce_interval: SSDP_ANNOUNCE_INTERVAL_SECS,
        }
    }
}

/// Playback engine (mpv) settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AudioConfig {
    /// Engine executable.
    pub mpv_binary: String,
    /// Path of the engine's JSON IPC socket.
    pub mpv_ipc_socket: PathBuf,
    /// Volume applied at startup (0-100).
    pub default_volume: u8,
    /// Audio output driver passed as `--ao`.
    pub output_driver: String,
    /// Enable the engine's network cache.
    pub cache: bool,
    /// Demuxer cache size (mpv size syntax, e.g. `2M`).
    pub demuxer_max_bytes: String,
    /// Timeout for a single IPC exchange (milliseconds).
    pub ipc_timeout_ms: u64,
    /// Spawn and own the engine process.
    ///
    /// When false, the renderer attaches to an engine already listening on
    /// `mpv_ipc_socket` and leaves its lifecycle alone.
    pub manage_engine: bool,
}

impl AudioConfig {
    #[must_use]
    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mpv_binary: "mpv".to_string(),
            mpv_ipc_socket: PathBuf::from("/tmp/mpv-socket"),
            default_volume: 50,
            output_driver: "alsa".to_string(),
            cache: true,
            demuxer_max_bytes: "2M".to_string(),
            ipc_timeout_ms: ENGINE_IPC_TIMEOUT_MS,
            manage_engine: true,
        }
    }
}

/// Configuration for the renderer.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub audio: AudioConfig,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.device.uuid.trim().is_empty() {
            return Err("device.uuid must not be empty".to_string());
        }
        if self.audio.default_volume > MAX_VOLUME {
            return Err(format!(
                "audio.default_volume must be <= {} (got {})",
                MAX_VOLUME, self.audio.default_volume
            ));
        }
        if self.audio.mpv_ipc_socket.as_os_str().is_empty() {
            return Err("audio.mpv_ipc_socket must not be empty".to_string());
        }
        if self.audio.ipc_timeout_ms == 0 {
            return Err("audio.ipc_timeout_ms must be >= 1".to_string());
        }
        if self.network.announce_interval == 0 {
            return Err("network.announce_interval must be >= 1".to_string());
        }
        Ok(())
    }
}
