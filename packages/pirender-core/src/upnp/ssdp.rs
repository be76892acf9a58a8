//! SSDP presence for the renderer.
//!
//! Owns the multicast socket on 239.255.255.250:1900. A listener task answers
//! `M-SEARCH` requests whose search target names this device, and an announcer
//! task re-sends `ssdp:alive` for every advertised type on a fixed interval.
//! [`DiscoveryEngine::stop`] withdraws the device with `ssdp:byebye`.
//!
//! Message construction is kept free of I/O so it can be tested directly.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::DeviceIdentity;
use crate::protocol_constants::{
    MEDIA_RENDERER_DEVICE_TYPE, PRODUCT_NAME, SSDP_ALL, SSDP_ANNOUNCE_INTERVAL_SECS,
    SSDP_JOIN_TIMEOUT_MS, SSDP_MAX_AGE_SECS, SSDP_MULTICAST_ADDR, SSDP_PORT,
    SSDP_RECV_BACKOFF_MAX_MS, SSDP_RECV_BACKOFF_MS, SSDP_RECV_BUFFER_SIZE, UPNP_ROOT_DEVICE,
};
use crate::upnp::UpnpService;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while starting discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to create or bind the UDP socket.
    #[error("failed to bind SSDP socket: {0}")]
    SocketBind(#[source] io::Error),

    /// Failed to join the SSDP multicast group.
    #[error("failed to join multicast group {group}: {source}")]
    SocketJoin {
        group: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    /// The configured multicast group is not an IPv4 multicast address.
    #[error("invalid multicast group: {0}")]
    InvalidGroup(String),

    /// `start` was called while discovery is already running.
    #[error("discovery is already running")]
    AlreadyRunning,
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

// ─────────────────────────────────────────────────────────────────────────────
// ASCII Case-Insensitive Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Checks if `s` starts with `prefix` (ASCII case-insensitive, no allocation).
#[inline]
fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the discovery engine.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Multicast group to join and announce to.
    pub multicast_addr: Ipv4Addr,
    /// Discovery port.
    pub port: u16,
    /// Interval between `ssdp:alive` rounds.
    pub announce_interval: Duration,
    /// Advertised `max-age` (seconds).
    pub max_age: u32,
    /// Value of the `SERVER` header.
    pub server: String,
}

impl SsdpConfig {
    /// Builds a configuration from the textual group address.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidGroup`] if `group` is not an IPv4
    /// multicast address.
    pub fn new(group: &str, port: u16, announce_interval: Duration) -> DiscoveryResult<Self> {
        let multicast_addr: Ipv4Addr = group
            .parse()
            .map_err(|_| DiscoveryError::InvalidGroup(group.to_string()))?;
        if !multicast_addr.is_multicast() {
            return Err(DiscoveryError::InvalidGroup(group.to_string()));
        }

        Ok(Self {
            multicast_addr,
            port,
            announce_interval,
            ..Self::default()
        })
    }

    fn group_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.multicast_addr, self.port))
    }
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            multicast_addr: SSDP_MULTICAST_ADDR
                .parse()
                .unwrap_or(Ipv4Addr::new(239, 255, 255, 250)),
            port: SSDP_PORT,
            announce_interval: Duration::from_secs(SSDP_ANNOUNCE_INTERVAL_SECS),
            max_age: SSDP_MAX_AGE_SECS,
            server: server_header(),
        }
    }
}

/// `SERVER` header value: `{os}/{arch} UPnP/1.1 PiRender/{version}`.
#[must_use]
pub fn server_header() -> String {
    format!(
        "{}/{} UPnP/1.1 {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        PRODUCT_NAME,
        env!("CARGO_PKG_VERSION")
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Construction
// ─────────────────────────────────────────────────────────────────────────────

/// Notification sub-type of a `NOTIFY` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifySubtype {
    Alive,
    ByeBye,
}

impl NotifySubtype {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "ssdp:alive",
            Self::ByeBye => "ssdp:byebye",
        }
    }
}

/// Every notification type this device advertises, root device first.
#[must_use]
pub fn advertised_types(identity: &DeviceIdentity) -> Vec<String> {
    let mut types = vec![
        UPNP_ROOT_DEVICE.to_string(),
        identity.udn(),
        MEDIA_RENDERER_DEVICE_TYPE.to_string(),
    ];
    types.extend(UpnpService::ALL.iter().map(|service| service.urn().to_string()));
    types
}

/// Unique service name for a notification type or search target.
fn usn_for(identity: &DeviceIdentity, target: &str) -> String {
    if target.starts_with("uuid:") {
        identity.udn()
    } else {
        format!("{}::{}", identity.udn(), target)
    }
}

/// Builds a `NOTIFY` message for one notification type.
#[must_use]
pub fn build_notify(
    identity: &DeviceIdentity,
    config: &SsdpConfig,
    nt: &str,
    subtype: NotifySubtype,
) -> String {
    let usn = usn_for(identity, nt);
    match subtype {
        NotifySubtype::Alive => format!(
            "NOTIFY * HTTP/1.1\r\n\
             HOST: {}:{}\r\n\
             CACHE-CONTROL: max-age={}\r\n\
             LOCATION: {}\r\n\
             NT: {}\r\n\
             NTS: {}\r\n\
             SERVER: {}\r\n\
             USN: {}\r\n\r\n",
            config.multicast_addr,
            config.port,
            config.max_age,
            identity.location,
            nt,
            subtype.as_str(),
            config.server,
            usn
        ),
        NotifySubtype::ByeBye => format!(
            "NOTIFY * HTTP/1.1\r\n\
             HOST: {}:{}\r\n\
             NT: {}\r\n\
             NTS: {}\r\n\
             USN: {}\r\n\r\n",
            config.multicast_addr,
            config.port,
            nt,
            subtype.as_str(),
            usn
        ),
    }
}

/// Builds the unicast reply to an accepted search, echoing `st`.
#[must_use]
pub fn build_search_response(identity: &DeviceIdentity, config: &SsdpConfig, st: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: {}\r\n\
         ST: {}\r\n\
         USN: {}\r\n\r\n",
        config.max_age,
        identity.location,
        config.server,
        st,
        usn_for(identity, st)
    )
}

/// Whether a search target names this device or one of its services.
#[must_use]
pub fn matches_search_target(identity: &DeviceIdentity, st: &str) -> bool {
    st == SSDP_ALL || advertised_types(identity).iter().any(|nt| nt == st)
}

/// Extracts the `ST` header of an `M-SEARCH` request.
///
/// Returns `None` for any other message or when the header is missing.
fn extract_search_target(message: &str) -> Option<&str> {
    let mut lines = message.lines();
    let request_line = lines.next()?;
    if !starts_with_ignore_ascii_case(request_line.trim_start(), "M-SEARCH") {
        return None;
    }

    lines
        .take_while(|line| !line.trim().is_empty())
        .find(|line| starts_with_ignore_ascii_case(line, "st:"))
        .map(|line| line[3..].trim())
        .filter(|st| !st.is_empty())
}

/// Computes the reply to an incoming datagram, if it deserves one.
#[must_use]
pub fn search_reply(identity: &DeviceIdentity, config: &SsdpConfig, datagram: &str) -> Option<String> {
    let st = extract_search_target(datagram)?;
    if !matches_search_target(identity, st) {
        log::trace!("[SSDP] Ignoring M-SEARCH for {}", st);
        return None;
    }
    Some(build_search_response(identity, config, st))
}

// ─────────────────────────────────────────────────────────────────────────────
// Socket
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the discovery socket bound to the SSDP port and joined to the group.
///
/// Sets up socket options for SSDP:
/// - SO_REUSEADDR (and SO_REUSEPORT on Unix) so other UPnP stacks can share the port
/// - Multicast TTL of 4 per UPnP spec
fn bind_multicast_socket(config: &SsdpConfig) -> DiscoveryResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR: {}", e);
    }

    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEPORT: {}", e);
    }

    if let Err(e) = socket.set_multicast_ttl_v4(4) {
        log::warn!("[SSDP] Failed to set multicast TTL: {}", e);
    }

    let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));
    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    socket
        .join_multicast_v4(&config.multicast_addr, &Ipv4Addr::UNSPECIFIED)
        .map_err(|source| DiscoveryError::SocketJoin {
            group: config.multicast_addr,
            source,
        })?;

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Pause before the next receive after `consecutive` failed ones.
fn receive_backoff(consecutive: u32) -> Duration {
    let shift = consecutive.saturating_sub(1).min(16);
    let millis = SSDP_RECV_BACKOFF_MS.saturating_mul(1 << shift);
    Duration::from_millis(millis.min(SSDP_RECV_BACKOFF_MAX_MS))
}

/// Shared state of the listener and announcer tasks.
struct Advertiser {
    identity: DeviceIdentity,
    config: SsdpConfig,
    socket: UdpSocket,
    /// Where `NOTIFY` messages are sent; the multicast group in production.
    notify_addr: SocketAddr,
}

impl Advertiser {
    fn new(identity: DeviceIdentity, config: SsdpConfig, socket: UdpSocket) -> Self {
        let notify_addr = config.group_addr();
        Self {
            identity,
            config,
            socket,
            notify_addr,
        }
    }

    /// Sends one notification per advertised type. Failures are logged.
    async fn notify_all(&self, subtype: NotifySubtype) {
        for nt in advertised_types(&self.identity) {
            let message = build_notify(&self.identity, &self.config, &nt, subtype);
            match self.socket.send_to(message.as_bytes(), self.notify_addr).await {
                Ok(_) => log::trace!("[SSDP] NOTIFY {} for {}", subtype.as_str(), nt),
                Err(e) => log::warn!(
                    "[SSDP] Failed to send NOTIFY {} for {}: {}",
                    subtype.as_str(),
                    nt,
                    e
                ),
            }
        }
    }

    async fn listen(self: Arc<Self>, cancel: CancellationToken) {
        let mut buf = vec![0u8; SSDP_RECV_BUFFER_SIZE];
        let mut failures = 0u32;

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, src) = match received {
                Ok(received) => {
                    failures = 0;
                    received
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = receive_backoff(failures);
                    log::warn!("[SSDP] Receive error ({} in a row): {}", failures, e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(pause) => continue,
                    }
                }
            };

            let datagram = String::from_utf8_lossy(&buf[..len]);
            let Some(reply) = search_reply(&self.identity, &self.config, &datagram) else {
                continue;
            };

            match self.socket.send_to(reply.as_bytes(), src).await {
                Ok(_) => log::debug!("[SSDP] Answered M-SEARCH from {}", src),
                Err(e) => log::warn!("[SSDP] Failed to answer M-SEARCH from {}: {}", src, e),
            }
        }

        log::debug!("[SSDP] Listener stopped");
    }

    async fn announce(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.announce_interval);
        // The first tick completes immediately; start() already announced.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.notify_all(NotifySubtype::Alive).await,
            }
        }

        log::debug!("[SSDP] Announcer stopped");
    }
}

struct RunningTasks {
    advertiser: Arc<Advertiser>,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
    announcer: JoinHandle<()>,
}

/// Advertises the renderer over SSDP.
pub struct DiscoveryEngine {
    identity: DeviceIdentity,
    config: SsdpConfig,
    running: Mutex<Option<RunningTasks>>,
}

impl DiscoveryEngine {
    pub fn new(identity: DeviceIdentity, config: SsdpConfig) -> Self {
        Self {
            identity,
            config,
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Opens the socket, spawns the listener and announcer, and announces once.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be bound or joined to the multicast group.
    pub async fn start(&self) -> DiscoveryResult<()> {
        if self.is_running() {
            return Err(DiscoveryError::AlreadyRunning);
        }

        let socket = bind_multicast_socket(&self.config)?;
        let advertiser = Advertiser::new(self.identity.clone(), self.config.clone(), socket);
        self.run(advertiser).await;
        Ok(())
    }

    /// Spawns the tasks around a bound advertiser and sends the first alive round.
    async fn run(&self, advertiser: Advertiser) {
        let advertiser = Arc::new(advertiser);
        let cancel = CancellationToken::new();

        let listener = tokio::spawn(advertiser.clone().listen(cancel.clone()));
        let announcer = tokio::spawn(advertiser.clone().announce(cancel.clone()));

        *self.running.lock() = Some(RunningTasks {
            advertiser: advertiser.clone(),
            cancel,
            listener,
            announcer,
        });

        log::info!(
            "[SSDP] Advertising {} at {} on {}",
            self.identity.udn(),
            self.identity.location,
            self.config.group_addr()
        );

        advertiser.notify_all(NotifySubtype::Alive).await;
    }

    /// Withdraws the device and stops both tasks.
    ///
    /// Byebye delivery is best-effort. Each task gets a bounded time to finish
    /// before it is aborted. Calling `stop` when not running is a no-op.
    pub async fn stop(&self) {
        let Some(tasks) = self.running.lock().take() else {
            return;
        };

        tasks.advertiser.notify_all(NotifySubtype::ByeBye).await;
        tasks.cancel.cancel();

        let join_timeout = Duration::from_millis(SSDP_JOIN_TIMEOUT_MS);
        for (name, mut handle) in [("listener", tasks.listener), ("announcer", tasks.announcer)] {
            if tokio::time::timeout(join_timeout, &mut handle).await.is_err() {
                log::warn!("[SSDP] {} did not stop in time, aborting", name);
                handle.abort();
            }
        }

        log::info!("[SSDP] Discovery stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new(
            "12345678-1234-1234-1234-123456789012",
            "http://192.168.1.50:8000/description.xml",
        )
    }

    fn msearch(st: &str) -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: 239.255.255.250:1900\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 2\r\n\
             ST: {}\r\n\r\n",
            st
        )
    }

    #[test]
    fn advertises_six_types() {
        let types = advertised_types(&identity());
        assert_eq!(
            types,
            vec![
                "upnp:rootdevice",
                "uuid:12345678-1234-1234-1234-123456789012",
                "urn:schemas-upnp-org:device:MediaRenderer:1",
                "urn:schemas-upnp-org:service:AVTransport:1",
                "urn:schemas-upnp-org:service:RenderingControl:1",
                "urn:schemas-upnp-org:service:ConnectionManager:1",
            ]
        );
    }

    #[test]
    fn service_search_gets_one_reply_echoing_st() {
        let st = "urn:schemas-upnp-org:service:RenderingControl:1";
        let reply = search_reply(&identity(), &SsdpConfig::default(), &msearch(st)).unwrap();

        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(reply.matches("\r\nST: ").count(), 1);
        assert!(reply.contains(&format!("\r\nST: {}\r\n", st)));
        assert!(reply.contains(
            "USN: uuid:12345678-1234-1234-1234-123456789012::urn:schemas-upnp-org:service:RenderingControl:1"
        ));
        assert!(reply.contains("CACHE-CONTROL: max-age=1800"));
        assert!(reply.contains("LOCATION: http://192.168.1.50:8000/description.xml"));
        assert!(reply.contains("\r\nEXT:\r\n"));
        assert!(reply.ends_with("\r\n\r\n"));
    }

    #[test]
    fn unrecognized_target_gets_no_reply() {
        let config = SsdpConfig::default();
        assert!(search_reply(
            &identity(),
            &config,
            &msearch("urn:schemas-upnp-org:service:ContentDirectory:1")
        )
        .is_none());
        assert!(search_reply(&identity(), &config, &msearch("uuid:someone-else")).is_none());
    }

    #[test]
    fn accepts_every_advertised_target() {
        let config = SsdpConfig::default();
        for st in ["ssdp:all", "upnp:rootdevice", "urn:schemas-upnp-org:device:MediaRenderer:1"] {
            assert!(search_reply(&identity(), &config, &msearch(st)).is_some(), "{}", st);
        }
    }

    #[test]
    fn uuid_search_uses_bare_usn() {
        let st = "uuid:12345678-1234-1234-1234-123456789012";
        let reply = search_reply(&identity(), &SsdpConfig::default(), &msearch(st)).unwrap();
        assert!(reply.contains("USN: uuid:12345678-1234-1234-1234-123456789012\r\n"));
    }

    #[test]
    fn header_matching_is_case_insensitive() {
        let datagram = "m-search * HTTP/1.1\r\nst: upnp:rootdevice\r\n\r\n";
        let reply = search_reply(&identity(), &SsdpConfig::default(), datagram).unwrap();
        assert!(reply.contains("ST: upnp:rootdevice"));
    }

    #[test]
    fn non_search_and_malformed_datagrams_are_ignored() {
        let config = SsdpConfig::default();
        let notify = build_notify(&identity(), &config, "upnp:rootdevice", NotifySubtype::Alive);
        assert!(search_reply(&identity(), &config, &notify).is_none());
        assert!(search_reply(&identity(), &config, "").is_none());
        assert!(search_reply(&identity(), &config, "M-SEARCH * HTTP/1.1\r\nMX: 1\r\n\r\n").is_none());
        assert!(search_reply(&identity(), &config, "\u{fffd}\u{fffd}garbage").is_none());
    }

    #[test]
    fn alive_notify_has_required_headers() {
        let msg = build_notify(
            &identity(),
            &SsdpConfig::default(),
            "urn:schemas-upnp-org:device:MediaRenderer:1",
            NotifySubtype::Alive,
        );
        assert!(msg.starts_with("NOTIFY * HTTP/1.1\r\n"));
        assert!(msg.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(msg.contains("NTS: ssdp:alive\r\n"));
        assert!(msg.contains("CACHE-CONTROL: max-age=1800\r\n"));
        assert!(msg.contains("LOCATION: http://192.168.1.50:8000/description.xml\r\n"));
        assert!(msg.contains("SERVER: "));
        assert!(msg.contains("UPnP/1.1 PiRender/"));
    }

    #[test]
    fn byebye_notify_omits_location() {
        let msg = build_notify(
            &identity(),
            &SsdpConfig::default(),
            "upnp:rootdevice",
            NotifySubtype::ByeBye,
        );
        assert!(msg.contains("NTS: ssdp:byebye\r\n"));
        assert!(msg.contains("USN: uuid:12345678-1234-1234-1234-123456789012::upnp:rootdevice\r\n"));
        assert!(!msg.contains("LOCATION"));
    }

    #[test]
    fn config_rejects_non_multicast_group() {
        assert!(SsdpConfig::new("239.255.255.250", 1900, Duration::from_secs(30)).is_ok());
        assert!(matches!(
            SsdpConfig::new("192.168.1.1", 1900, Duration::from_secs(30)),
            Err(DiscoveryError::InvalidGroup(_))
        ));
        assert!(SsdpConfig::new("not-an-ip", 1900, Duration::from_secs(30)).is_err());
    }

    #[test]
    fn receive_backoff_doubles_up_to_a_ceiling() {
        assert_eq!(receive_backoff(1), Duration::from_millis(50));
        assert_eq!(receive_backoff(2), Duration::from_millis(100));
        assert_eq!(receive_backoff(4), Duration::from_millis(400));
        assert_eq!(receive_backoff(7), Duration::from_millis(2000));
        assert_eq!(receive_backoff(u32::MAX), Duration::from_millis(2000));
    }

    /// Loopback advertiser whose notifications land on the returned socket.
    async fn loopback_advertiser() -> (Advertiser, UdpSocket) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut advertiser = Advertiser::new(identity(), SsdpConfig::default(), socket);
        advertiser.notify_addr = collector.local_addr().unwrap();
        (advertiser, collector)
    }

    async fn recv_text(socket: &UdpSocket) -> String {
        let mut buf = vec![0u8; SSDP_RECV_BUFFER_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("datagram within timeout")
            .unwrap();
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    #[tokio::test]
    async fn running_engine_answers_search_and_says_byebye_on_stop() {
        let (advertiser, collector) = loopback_advertiser().await;
        let device_addr = advertiser.socket.local_addr().unwrap();
        let engine = DiscoveryEngine::new(identity(), SsdpConfig::default());

        engine.run(advertiser).await;
        assert!(engine.is_running());

        let mut announced = Vec::new();
        for _ in 0..6 {
            announced.push(recv_text(&collector).await);
        }
        assert!(announced.iter().all(|msg| msg.contains("NTS: ssdp:alive\r\n")));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(msearch("ssdp:all").as_bytes(), device_addr)
            .await
            .unwrap();
        let reply = recv_text(&client).await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.contains("\r\nST: ssdp:all\r\n"));
        assert!(reply.contains("USN: uuid:12345678-1234-1234-1234-123456789012::ssdp:all\r\n"));

        // Unrelated targets stay unanswered.
        client
            .send_to(msearch("urn:schemas-upnp-org:service:ContentDirectory:1").as_bytes(), device_addr)
            .await
            .unwrap();
        let mut buf = [0u8; 64];
        assert!(
            tokio::time::timeout(Duration::from_millis(100), client.recv_from(&mut buf))
                .await
                .is_err()
        );

        engine.stop().await;
        assert!(!engine.is_running());

        let mut withdrawn = Vec::new();
        for _ in 0..6 {
            let msg = recv_text(&collector).await;
            assert!(msg.contains("NTS: ssdp:byebye\r\n"), "{}", msg);
            let nt = msg
                .lines()
                .find_map(|line| line.strip_prefix("NT: "))
                .unwrap()
                .to_string();
            withdrawn.push(nt);
        }
        assert_eq!(withdrawn, advertised_types(&identity()));
    }

    #[tokio::test]
    async fn second_run_is_rejected_while_running() {
        let (advertiser, _collector) = loopback_advertiser().await;
        let engine = DiscoveryEngine::new(identity(), SsdpConfig::default());
        engine.run(advertiser).await;

        assert!(matches!(
            engine.start().await,
            Err(DiscoveryError::AlreadyRunning)
        ));

        engine.stop().await;
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let engine = DiscoveryEngine::new(identity(), SsdpConfig::default());
        assert!(!engine.is_running());
        engine.stop().await;
        assert!(!engine.is_running());
    }
}
