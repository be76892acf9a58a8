//! Network configuration context for the renderer.
//!
//! This module provides [`NetworkContext`], which fixes the address control
//! points use to reach the HTTP server, and [`DeviceIdentity`], the immutable
//! identity stamped on every discovery message.
//!
//! The advertise address is resolved once at startup: an explicit override
//! wins, then the configured interface, then the system's default route.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use crate::protocol_constants::DESCRIPTION_PATH;

/// Network configuration shared across services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    port: u16,
    advertise_ip: IpAddr,
}

impl NetworkContext {
    /// Creates a `NetworkContext` with an explicitly configured address.
    #[must_use]
    pub fn explicit(port: u16, advertise_ip: IpAddr) -> Self {
        Self { port, advertise_ip }
    }

    /// Creates a `NetworkContext` from the first detector that succeeds.
    ///
    /// # Errors
    ///
    /// Returns the last detector's error if none of them finds an address.
    pub fn auto_detect(port: u16, detectors: &[Arc<dyn IpDetector>]) -> Result<Self, NetworkError> {
        let mut last_error = NetworkError::NoDetector;

        for detector in detectors {
            match detector.detect() {
                Ok(ip) => return Ok(Self::explicit(port, ip)),
                Err(e) => {
                    log::debug!("[Network] Address detection failed: {}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Creates a `NetworkContext` for testing with a fixed IP.
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::explicit(8000, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)))
    }

    /// Returns the HTTP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the address advertised to control points.
    #[must_use]
    pub fn advertise_ip(&self) -> IpAddr {
        self.advertise_ip
    }

    /// Returns a `UrlBuilder` for this network configuration.
    #[must_use]
    pub fn url_builder(&self) -> UrlBuilder {
        UrlBuilder::new(self.advertise_ip.to_string(), self.port)
    }
}

/// Trait for detecting the local IP address.
///
/// Different environments may need different detection strategies.
/// This trait allows injecting the appropriate detector.
pub trait IpDetector: Send + Sync {
    /// Detects the local IP address.
    fn detect(&self) -> Result<IpAddr, NetworkError>;
}

/// Detector using the system's default outbound interface.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Creates a new `LocalIpDetector` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self::new())
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<IpAddr, NetworkError> {
        local_ip_address::local_ip().map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

/// Detector returning the IPv4 address of a named interface (e.g. `eth0`).
#[derive(Debug, Clone)]
pub struct InterfaceIpDetector {
    interface: String,
}

impl InterfaceIpDetector {
    #[must_use]
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    /// Picks the first non-loopback IPv4 address of `interface` from a list of
    /// `(interface, address)` pairs.
    fn select(interface: &str, addresses: &[(String, IpAddr)]) -> Option<Ipv4Addr> {
        addresses.iter().find_map(|(name, addr)| match addr {
            IpAddr::V4(ipv4) if name == interface && !ipv4.is_loopback() => Some(*ipv4),
            _ => None,
        })
    }
}

impl IpDetector for InterfaceIpDetector {
    fn detect(&self) -> Result<IpAddr, NetworkError> {
        let addresses = local_ip_address::list_afinet_netifas()
            .map_err(|e| NetworkError::Interface(e.to_string()))?;

        Self::select(&self.interface, &addresses)
            .map(IpAddr::V4)
            .ok_or_else(|| {
                NetworkError::Interface(format!("no IPv4 address on {}", self.interface))
            })
    }
}

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not detect local IP address.
    #[error("Failed to detect local IP: {0}")]
    Detection(String),

    /// No IP detector configured.
    #[error("No IP detector configured")]
    NoDetector,

    /// Network interface error.
    #[error("Network interface error: {0}")]
    Interface(String),
}

/// Builder for URLs served by the renderer.
pub struct UrlBuilder {
    ip: String,
    port: u16,
}

impl UrlBuilder {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Returns the base URL for the server (e.g., `http://192.168.1.100:8000`).
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }

    /// Returns the device description URL advertised over SSDP.
    #[must_use]
    pub fn description_url(&self) -> String {
        format!("{}{}", self.base_url(), DESCRIPTION_PATH)
    }
}

/// Identity of this renderer on the network.
///
/// Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Device UUID without the `uuid:` prefix.
    pub uuid: String,
    /// URL of the device description document.
    pub location: String,
}

impl DeviceIdentity {
    pub fn new(uuid: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            location: location.into(),
        }
    }

    /// Builds the identity for a device served at `network`.
    #[must_use]
    pub fn for_network(uuid: impl Into<String>, network: &NetworkContext) -> Self {
        Self::new(uuid, network.url_builder().description_url())
    }

    /// Unique device name (`uuid:{uuid}`).
    #[must_use]
    pub fn udn(&self) -> String {
        format!("uuid:{}", self.uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockIpDetector {
        ip: Option<IpAddr>,
    }

    impl IpDetector for MockIpDetector {
        fn detect(&self) -> Result<IpAddr, NetworkError> {
            self.ip
                .ok_or_else(|| NetworkError::Detection("unplugged".to_string()))
        }
    }

    #[test]
    fn explicit_context_uses_provided_ip() {
        let ctx = NetworkContext::explicit(8000, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(ctx.advertise_ip().to_string(), "192.168.1.100");
        assert_eq!(ctx.port(), 8000);
    }

    #[test]
    fn auto_detect_falls_through_to_next_detector() {
        let detectors: Vec<Arc<dyn IpDetector>> = vec![
            Arc::new(MockIpDetector { ip: None }),
            Arc::new(MockIpDetector {
                ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
            }),
        ];
        let ctx = NetworkContext::auto_detect(8000, &detectors).unwrap();
        assert_eq!(ctx.advertise_ip().to_string(), "10.0.0.5");
    }

    #[test]
    fn auto_detect_reports_last_failure() {
        let detectors: Vec<Arc<dyn IpDetector>> = vec![Arc::new(MockIpDetector { ip: None })];
        assert!(matches!(
            NetworkContext::auto_detect(8000, &detectors),
            Err(NetworkError::Detection(_))
        ));
        assert!(matches!(
            NetworkContext::auto_detect(8000, &[]),
            Err(NetworkError::NoDetector)
        ));
    }

    #[test]
    fn interface_selection_skips_other_interfaces_and_ipv6() {
        let addresses = vec![
            ("lo".to_string(), IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ("eth0".to_string(), "fe80::1".parse().unwrap()),
            ("wlan0".to_string(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))),
            ("eth0".to_string(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
        ];
        assert_eq!(
            InterfaceIpDetector::select("eth0", &addresses),
            Some(Ipv4Addr::new(192, 168, 1, 20))
        );
        assert_eq!(InterfaceIpDetector::select("eth1", &addresses), None);
    }

    #[test]
    fn identity_location_points_at_description() {
        let identity = DeviceIdentity::for_network("abc", &NetworkContext::for_test());
        assert_eq!(identity.location, "http://192.168.1.50:8000/description.xml");
        assert_eq!(identity.udn(), "uuid:abc");
    }
}
