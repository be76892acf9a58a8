//! Routes SOAP control requests to the addressed service.
//!
//! The gateway is transport-agnostic: it takes the request path and raw body
//! and produces a status code and XML body. Faults are always reported with
//! `500 Internal Server Error` and successes with `200 OK`.

use std::sync::Arc;

use axum::http::StatusCode;

use super::ControlService;
use crate::error::ControlError;
use crate::upnp::soap::{parse_envelope, serialize_fault, serialize_response};
use crate::upnp::UpnpService;

/// Outcome of one control request, ready to hand to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    pub status: StatusCode,
    pub body: String,
}

impl ControlReply {
    fn success(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Builds the fault reply for a failed action.
    #[must_use]
    pub fn fault(err: &ControlError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: serialize_fault(err.upnp_code(), &err.to_string()),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        }
    }

    /// Whether the reply carries a SOAP fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.status == StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Dispatches parsed control envelopes to the registered services.
#[derive(Clone)]
pub struct ControlGateway {
    services: Vec<Arc<dyn ControlService>>,
}

impl ControlGateway {
    pub fn new(services: Vec<Arc<dyn ControlService>>) -> Self {
        Self { services }
    }

    /// Finds the handler for a control URL path.
    pub fn service_for(&self, path: &str) -> Option<Arc<dyn ControlService>> {
        let service = UpnpService::from_control_path(path)?;
        self.services
            .iter()
            .find(|handler| handler.service() == service)
            .cloned()
    }

    /// Handles one control request.
    ///
    /// Returns `404` when `path` names no registered service.
    pub async fn handle(&self, path: &str, body: &str) -> ControlReply {
        let Some(handler) = self.service_for(path) else {
            log::warn!("[SOAP] No service for control path {}", path);
            return ControlReply::not_found();
        };
        let service = handler.service();

        let envelope = match parse_envelope(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("[SOAP] Unparseable {} request: {}", service, e);
                return ControlReply::fault(&ControlError::Parse(e));
            }
        };

        if !envelope.service_type.is_empty() && envelope.service_type != service.urn() {
            log::debug!(
                "[SOAP] {} addressed to {} but namespaced {}",
                envelope.action,
                service,
                envelope.service_type
            );
        }

        log::debug!(
            "[SOAP] {}#{} ({} args)",
            service,
            envelope.action,
            envelope.arguments.len()
        );

        match handler.dispatch(&envelope.action, &envelope.arguments).await {
            Ok(output) => ControlReply::success(serialize_response(
                &envelope.action,
                service.urn(),
                &output,
            )),
            Err(e) => {
                log::warn!(
                    "[SOAP] {}#{} failed ({}): {}",
                    service,
                    envelope.action,
                    e.upnp_code(),
                    e
                );
                ControlReply::fault(&e)
            }
        }
    }
}
