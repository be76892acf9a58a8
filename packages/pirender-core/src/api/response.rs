//! HTTP response helpers for the renderer's endpoints.
//!
//! JSON helpers serve the status endpoints; [`xml_response`] serves every
//! UPnP document and SOAP reply with the headers control points expect.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::upnp::ssdp::server_header;

/// Content type used for descriptions and SOAP envelopes.
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";

/// Standard API success response with JSON data.
pub fn api_success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

/// Standard API error response with code and message.
pub fn api_error(
    status: StatusCode,
    code: &str,
    message: impl std::fmt::Display,
) -> impl IntoResponse {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.to_string()
        })),
    )
}

/// XML body with the UPnP content type and `SERVER` header.
pub fn xml_response(status: StatusCode, body: String) -> Response {
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(XML_CONTENT_TYPE),
    );
    if let Ok(server) = HeaderValue::from_str(&server_header()) {
        headers.insert(header::SERVER, server);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_response_sets_upnp_headers() {
        let response = xml_response(StatusCode::OK, "<root/>".to_string());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/xml; charset=\"utf-8\""
        );
        let server = response.headers()[header::SERVER].to_str().unwrap();
        assert!(server.contains("UPnP/1.1"));
    }

    #[test]
    fn api_error_keeps_status() {
        let response = api_error(StatusCode::NOT_FOUND, "not_found", "nope").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
