//! Centralized error types for the renderer core.
//!
//! This module provides:
//! - [`ControlError`]: the control-action taxonomy, mapped onto UPnP error codes
//! - [`RendererError`]: the umbrella error returned while bootstrapping, which
//!   also renders as a JSON error response on the status endpoints

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::protocol_constants::{UPNP_ACTION_FAILED, UPNP_INVALID_ACTION, UPNP_INVALID_ARGS};
use crate::services::playback_session::SessionError;
use crate::upnp::soap::SoapParseError;

pub use crate::api::ServerError;
pub use crate::context::NetworkError;
pub use crate::player::{BridgeError, BridgeResult};
pub use crate::upnp::ssdp::{DiscoveryError, DiscoveryResult};

// ─────────────────────────────────────────────────────────────────────────────
// Control Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure of a single control request, reported to the caller as a SOAP fault.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The request body was not a usable SOAP envelope.
    #[error("Invalid Action: {0}")]
    Parse(#[from] SoapParseError),

    /// The action is not part of the addressed service.
    #[error("Invalid Action")]
    UnknownAction(String),

    /// A required argument is missing or malformed.
    #[error("Invalid Args: {0}")]
    InvalidArgument(String),

    /// The action is not allowed in the current playback state.
    #[error("{0}")]
    PreconditionFailed(String),

    /// The playback engine failed or could not be reached.
    #[error("{0}")]
    Engine(#[from] BridgeError),

    /// The action handler did not run to completion.
    #[error("Action interrupted: {0}")]
    Interrupted(String),
}

impl ControlError {
    /// Returns the UPnP error code carried in the fault.
    #[must_use]
    pub fn upnp_code(&self) -> u16 {
        match self {
            Self::Parse(_) | Self::UnknownAction(_) => UPNP_INVALID_ACTION,
            Self::InvalidArgument(_) => UPNP_INVALID_ARGS,
            Self::PreconditionFailed(_) | Self::Engine(_) | Self::Interrupted(_) => {
                UPNP_ACTION_FAILED
            }
        }
    }

    /// Shorthand for a missing required argument.
    pub(crate) fn missing(name: &str) -> Self {
        Self::InvalidArgument(format!("missing {}", name))
    }
}

impl From<SessionError> for ControlError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Engine(e) => Self::Engine(e),
            other => Self::PreconditionFailed(other.to_string()),
        }
    }
}

/// Convenient Result alias for control actions.
pub type ControlResult<T> = Result<T, ControlError>;

// ─────────────────────────────────────────────────────────────────────────────
// Application Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Application-wide error type for the renderer.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum RendererError {
    /// The discovery socket could not be opened.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The playback engine could not be started or reached.
    #[error("Playback engine error: {0}")]
    Engine(#[from] BridgeError),

    /// The control HTTP server could not be started.
    #[error("HTTP server error: {0}")]
    Server(#[from] ServerError),

    /// Network address detection failed.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RendererError {
    /// Returns a machine-readable error code for logs and exit reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Engine(_) => "engine_unavailable",
            Self::Server(_) => "http_bind_failed",
            Self::Network(_) => "network_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type RendererResult<T> = Result<T, RendererError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for RendererError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
