//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.
//! Precedence is CLI flag, then environment, then file, then built-in default.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pirender_core::{AudioConfig, Config, DeviceConfig, NetworkConfig};
use serde::Deserialize;

/// Logging section of the configuration file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Identity published in the device description.
    /// Override: `PIRENDER_DEVICE_UUID` (uuid only)
    pub device: DeviceConfig,

    /// Addressing and discovery.
    /// Overrides: `PIRENDER_HTTP_PORT`, `PIRENDER_ADVERTISE_IP`, `PIRENDER_INTERFACE`
    pub network: NetworkConfig,

    /// Playback engine settings.
    /// Override: `PIRENDER_MPV_SOCKET`
    pub audio: AudioConfig,

    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    ///
    /// Also returns a warning for every override that was ignored. Loading
    /// happens before logging is set up, so the caller reports them.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<String>)> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        let warnings = config.apply_overrides(|key| std::env::var(key).ok());
        Ok((config, warnings))
    }

    /// Applies overrides from `lookup` (the process environment in production).
    ///
    /// Unparseable values are skipped; one warning per skipped value is returned.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(val) = lookup("PIRENDER_HTTP_PORT") {
            match val.parse() {
                Ok(port) => self.network.http_port = port,
                Err(_) => warnings.push(format!("Ignoring invalid PIRENDER_HTTP_PORT: {}", val)),
            }
        }

        if let Some(val) = lookup("PIRENDER_ADVERTISE_IP") {
            match val.parse::<IpAddr>() {
                Ok(ip) => self.network.advertise_ip = Some(ip),
                Err(_) => warnings.push(format!("Ignoring invalid PIRENDER_ADVERTISE_IP: {}", val)),
            }
        }

        if let Some(val) = lookup("PIRENDER_INTERFACE") {
            self.network.interface = val;
        }

        if let Some(val) = lookup("PIRENDER_DEVICE_UUID") {
            self.device.uuid = val;
        }

        if let Some(val) = lookup("PIRENDER_MPV_SOCKET") {
            self.audio.mpv_ipc_socket = PathBuf::from(val);
        }

        // Note: PIRENDER_LOG_LEVEL is handled by clap via #[arg(env = ...)] in main.rs
        warnings
    }

    /// Log level from the file, falling back to `info` when unparseable.
    pub fn log_level(&self) -> log::LevelFilter {
        self.logging.level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Converts to pirender-core's Config type.
    pub fn to_core_config(&self) -> Config {
        Config {
            device: self.device.clone(),
            network: self.network.clone(),
            audio: self.audio.clone(),
        }
    }
}
