//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, SSDP, SOAP) and
//! by the mpv JSON IPC protocol. Changing them would break interoperability
//! with control points.

// ─────────────────────────────────────────────────────────────────────────────
// SSDP (Simple Service Discovery Protocol)
// ─────────────────────────────────────────────────────────────────────────────

/// SSDP multicast group address.
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// SSDP well-known port.
pub const SSDP_PORT: u16 = 1900;

/// Advertised cache lifetime for discovery messages (seconds).
pub const SSDP_MAX_AGE_SECS: u32 = 1800;

/// Default interval between presence announcements (seconds).
pub const SSDP_ANNOUNCE_INTERVAL_SECS: u64 = 30;

/// Maximum datagram size accepted by the discovery listener.
pub const SSDP_RECV_BUFFER_SIZE: usize = 2048;

/// Bounded wait for the discovery tasks to finish on shutdown (milliseconds).
pub const SSDP_JOIN_TIMEOUT_MS: u64 = 2000;

/// First pause after a failed discovery receive (milliseconds), doubled per
/// consecutive failure.
pub const SSDP_RECV_BACKOFF_MS: u64 = 50;

/// Upper bound on the discovery receive backoff (milliseconds).
pub const SSDP_RECV_BACKOFF_MAX_MS: u64 = 2000;

/// Search target matching every device and service.
pub const SSDP_ALL: &str = "ssdp:all";

/// Search/notification target for root devices.
pub const UPNP_ROOT_DEVICE: &str = "upnp:rootdevice";

// ─────────────────────────────────────────────────────────────────────────────
// UPnP Device
// ─────────────────────────────────────────────────────────────────────────────

/// Device type advertised by this renderer.
pub const MEDIA_RENDERER_DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

/// Namespace for UPnP device descriptions.
pub const UPNP_DEVICE_NAMESPACE: &str = "urn:schemas-upnp-org:device-1-0";

/// Namespace for UPnP service control protocol descriptions.
pub const UPNP_SERVICE_NAMESPACE: &str = "urn:schemas-upnp-org:service-1-0";

/// Path of the root device description document.
pub const DESCRIPTION_PATH: &str = "/description.xml";

/// Subscription lifetime reported for (no-op) event subscriptions.
pub const EVENT_SUBSCRIPTION_TIMEOUT: &str = "Second-1800";

// ─────────────────────────────────────────────────────────────────────────────
// SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.1 encoding style.
pub const SOAP_ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Namespace for the `UPnPError` fault detail.
pub const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";

/// Maximum accepted control request body (bytes).
///
/// Control envelopes are small; DIDL-Lite metadata is the largest argument.
pub const MAX_CONTROL_BODY_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// UPnP Error Codes
// ─────────────────────────────────────────────────────────────────────────────

/// The action name does not match any action of the addressed service.
pub const UPNP_INVALID_ACTION: u16 = 401;

/// Missing or malformed action argument.
pub const UPNP_INVALID_ARGS: u16 = 402;

/// The action was understood but could not be carried out.
pub const UPNP_ACTION_FAILED: u16 = 501;

// ─────────────────────────────────────────────────────────────────────────────
// Playback Engine IPC (mpv)
// ─────────────────────────────────────────────────────────────────────────────

/// Default timeout for a single engine request/response exchange (milliseconds).
pub const ENGINE_IPC_TIMEOUT_MS: u64 = 2000;

/// Interval between connection attempts while the engine starts (milliseconds).
pub const ENGINE_STARTUP_POLL_MS: u64 = 100;

/// Number of connection attempts before startup is declared failed.
///
/// 50 attempts at 100ms gives the engine five seconds to open its socket.
pub const ENGINE_STARTUP_POLL_ATTEMPTS: u32 = 50;

/// Grace period between SIGTERM and a forced kill on shutdown (seconds).
pub const ENGINE_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Value of the `error` field in a successful engine reply.
pub const ENGINE_SUCCESS: &str = "success";

// ─────────────────────────────────────────────────────────────────────────────
// Playback
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum volume accepted by the engine and the Rendering service.
pub const MAX_VOLUME: u8 = 100;

/// MIME types accepted for `http-get` playback.
pub const SINK_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/mp4",
    "audio/x-m4a",
    "audio/aac",
    "audio/flac",
    "audio/x-flac",
    "audio/ogg",
    "audio/vorbis",
    "audio/wav",
    "audio/x-wav",
    "audio/L16",
    "application/ogg",
];

/// Product token used in the SSDP `SERVER` header and the HTTP `Server` header.
pub const PRODUCT_NAME: &str = "PiRender";
