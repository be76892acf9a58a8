//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{any, get, post},
    Router,
};
use serde_json::json;

use crate::api::response::{api_error, api_success, xml_response};
use crate::api::AppState;
use crate::error::{ControlError, RendererError};
use crate::player::PlaybackEngine;
use crate::protocol_constants::{
    DESCRIPTION_PATH, EVENT_SUBSCRIPTION_TIMEOUT, MAX_CONTROL_BODY_SIZE, PRODUCT_NAME,
};
use crate::services::ControlReply;
use crate::upnp::description::{device_description, scpd};
use crate::upnp::UpnpService;

/// Creates the router with every renderer endpoint.
///
/// POSTs outside the registered control paths still reach the gateway, which
/// resolves prefixed control URLs and answers 404 for everything else.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(info_page))
        .route("/health", get(health_check))
        .route("/api/state", get(get_current_state))
        .route(DESCRIPTION_PATH, get(serve_description));

    for service in UpnpService::ALL {
        router = router
            .route(
                service.scpd_path(),
                get(move || async move { xml_response(StatusCode::OK, scpd(service)) }),
            )
            .route(service.control_path(), post(handle_control))
            .route(service.event_path(), any(handle_event_subscription));
    }

    router.fallback(handle_fallback).with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Description
// ─────────────────────────────────────────────────────────────────────────────

async fn serve_description(State(state): State<AppState>) -> Response {
    xml_response(StatusCode::OK, device_description(&state.device))
}

// ─────────────────────────────────────────────────────────────────────────────
// Control
// ─────────────────────────────────────────────────────────────────────────────

/// Runs one SOAP control request through the gateway.
///
/// The dispatch runs on its own task so a client that hangs up mid-request
/// cannot cancel an action halfway through.
async fn handle_control(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    let body_bytes = match axum::body::to_bytes(body, MAX_CONTROL_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("[SOAP] Failed to read control body for {}: {}", path, e);
            return api_error(StatusCode::BAD_REQUEST, "invalid_body", "Failed to read body")
                .into_response();
        }
    };
    let body = String::from_utf8_lossy(&body_bytes).into_owned();

    let gateway = Arc::clone(&state.gateway);
    let reply = match tokio::spawn(async move { gateway.handle(&path, &body).await }).await {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("[SOAP] Control task failed: {}", e);
            ControlReply::fault(&ControlError::Interrupted(e.to_string()))
        }
    };

    if reply.status == StatusCode::NOT_FOUND {
        return StatusCode::NOT_FOUND.into_response();
    }
    xml_response(reply.status, reply.body)
}

async fn handle_fallback(state: State<AppState>, req: Request<Body>) -> Response {
    if *req.method() == Method::POST {
        return handle_control(state, req).await;
    }
    StatusCode::NOT_FOUND.into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Eventing
// ─────────────────────────────────────────────────────────────────────────────

/// Acknowledges GENA subscriptions without ever delivering events.
///
/// Renewals (requests carrying a `SID`) keep their identifier.
async fn handle_event_subscription(method: Method, headers: HeaderMap) -> Response {
    match method.as_str() {
        "SUBSCRIBE" => {
            let sid = headers
                .get("SID")
                .and_then(|v| v.to_str().ok())
                .filter(|sid| !sid.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("uuid:{}", uuid::Uuid::new_v4()));

            log::debug!("[GENA] SUBSCRIBE acknowledged: {}", sid);

            let mut response = StatusCode::OK.into_response();
            let response_headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&sid) {
                response_headers.insert("SID", value);
            }
            response_headers.insert(
                "TIMEOUT",
                HeaderValue::from_static(EVENT_SUBSCRIPTION_TIMEOUT),
            );
            response
        }
        "UNSUBSCRIBE" => {
            log::debug!(
                "[GENA] UNSUBSCRIBE acknowledged: {}",
                headers
                    .get("SID")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("?")
            );
            StatusCode::OK.into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness check that also verifies the engine answers.
///
/// Returns 503 when the engine channel is down.
async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, RendererError> {
    let volume = state.engine.query_volume().await?;
    Ok(api_success(json!({
        "status": "ok",
        "service": PRODUCT_NAME,
        "engine": {
            "volume": volume
        }
    })))
}

async fn get_current_state(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.session.refresh().await)
}

async fn info_page(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.session.snapshot();
    let uri = if snapshot.current_uri.is_empty() {
        "(none)".to_string()
    } else {
        snapshot.current_uri
    };

    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{name}</title></head><body>\
         <h1>{name}</h1>\
         <p>UUID: {uuid}</p>\
         <p>State: {transport}</p>\
         <p>Current URI: {uri}</p>\
         <p>Volume: {volume}{muted}</p>\
         <p><a href=\"{description}\">Device description</a></p>\
         </body></html>",
        name = html_escape::encode_text(&state.device.name),
        uuid = html_escape::encode_text(&state.device.uuid),
        transport = snapshot.state,
        uri = html_escape::encode_text(&uri),
        volume = snapshot.volume,
        muted = if snapshot.muted { " (muted)" } else { "" },
        description = state.network.url_builder().description_url(),
    ))
}
