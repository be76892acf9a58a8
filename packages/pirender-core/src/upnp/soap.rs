//! SOAP envelope codec for inbound UPnP control requests.
//!
//! Parsing turns a raw request body into a [`ControlEnvelope`]; serialization
//! produces the success envelope (`{Action}Response`) or the standard
//! `UPnPError` fault. Envelopes are emitted on a single line because some
//! control points reject whitespace before the root element.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::utils::{escape_xml, namespace_declarations, split_qname};
use crate::protocol_constants::{SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS, UPNP_CONTROL_NS};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Reasons an inbound control body could not be turned into an action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SoapParseError {
    /// The body is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Malformed(String),

    /// The root element is not a SOAP `Envelope`.
    #[error("Missing SOAP envelope")]
    MissingEnvelope,

    /// The envelope has no `Body` element.
    #[error("Missing SOAP body")]
    MissingBody,

    /// The `Body` element carries no action element.
    #[error("Empty SOAP body")]
    EmptyBody,
}

// ─────────────────────────────────────────────────────────────────────────────
// Control Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered action arguments, as they appeared in the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs(Vec<(String, String)>);

impl ActionArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument, keeping insertion order.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Returns the value of the first argument with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over `(name, value)` pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ActionArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Ordered result fields of a successful action.
pub type ActionOutput = Vec<(&'static str, String)>;

/// A parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEnvelope {
    /// Local name of the action element (e.g. `Play`).
    pub action: String,
    /// Namespace URI of the action element (the service type URN).
    ///
    /// Empty when the action element is not namespaced.
    pub service_type: String,
    /// Action arguments in request order.
    pub arguments: ActionArgs,
}

impl ControlEnvelope {
    fn from_action_element(elem: &BytesStart, scopes: &[Vec<(String, String)>]) -> Self {
        let (prefix, action) = split_qname(elem.name().as_ref());
        let own = namespace_declarations(elem);
        let service_type = own
            .iter()
            .chain(scopes.iter().rev().flatten())
            .find(|(declared, _)| *declared == prefix)
            .map(|(_, uri)| uri.clone())
            .unwrap_or_default();

        Self {
            action,
            service_type,
            arguments: ActionArgs::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Nesting depth of each structural element in a control request.
const ENVELOPE_DEPTH: usize = 1;
const BODY_DEPTH: usize = 2;
const ACTION_DEPTH: usize = 3;
const ARGUMENT_DEPTH: usize = 4;

fn malformed(err: impl std::fmt::Display) -> SoapParseError {
    SoapParseError::Malformed(err.to_string())
}

/// Reads an argument's character data up to its end tag.
///
/// Entity references are decoded and CDATA sections contribute their content
/// verbatim. Text inside nested child elements is skipped.
fn read_argument_value(reader: &mut Reader<&[u8]>) -> Result<String, SoapParseError> {
    let mut value = String::new();
    let mut nested = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Text(text) if nested == 0 => value.push_str(&text.decode().map_err(malformed)?),
            Event::CData(cdata) if nested == 0 => {
                value.push_str(&cdata.decode().map_err(malformed)?);
            }
            Event::GeneralRef(entity) if nested == 0 => {
                let reference = format!("&{};", entity.decode().map_err(malformed)?);
                value.push_str(&html_escape::decode_html_entities(&reference));
            }
            Event::Start(_) => nested += 1,
            Event::End(_) if nested == 0 => return Ok(value),
            Event::End(_) => nested -= 1,
            Event::Eof => return Err(malformed("unexpected end of document")),
            _ => {}
        }
        buf.clear();
    }
}

/// Parses a SOAP control request body.
///
/// The first child of `Body` is the action: its local name is the action name
/// and its namespace URI is the service type. Each child of the action element
/// becomes one argument (`local name -> decoded text`); empty elements yield an
/// empty string. Elements outside `Body` (e.g. `Header`) are ignored.
pub fn parse_envelope(body: &str) -> Result<ControlEnvelope, SoapParseError> {
    let mut reader = Reader::from_str(body);
    let mut buf = Vec::new();

    // Namespace declarations of every currently open element.
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut in_body = false;
    let mut envelope: Option<ControlEnvelope> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(err) => return Err(malformed(err)),
            Ok(Event::Start(ref e)) => {
                let depth = scopes.len() + 1;
                let local = e.local_name();
                let mut consumed = false;

                match depth {
                    ENVELOPE_DEPTH if local.as_ref() != b"Envelope" => {
                        return Err(SoapParseError::MissingEnvelope);
                    }
                    BODY_DEPTH if local.as_ref() == b"Body" => in_body = true,
                    ACTION_DEPTH if in_body && envelope.is_none() => {
                        envelope = Some(ControlEnvelope::from_action_element(e, &scopes));
                    }
                    ARGUMENT_DEPTH => {
                        if let Some(env) = envelope.as_mut() {
                            let name = String::from_utf8_lossy(local.as_ref()).to_string();
                            let value = read_argument_value(&mut reader)?;
                            env.arguments.push(name, value);
                            // The matching end tag has been consumed.
                            consumed = true;
                        }
                    }
                    _ => {}
                }

                if !consumed {
                    scopes.push(namespace_declarations(e));
                }
            }
            Ok(Event::Empty(ref e)) => {
                let depth = scopes.len() + 1;
                let local = e.local_name();

                match depth {
                    ENVELOPE_DEPTH if local.as_ref() == b"Envelope" => {
                        return Err(SoapParseError::MissingBody);
                    }
                    ENVELOPE_DEPTH => return Err(SoapParseError::MissingEnvelope),
                    BODY_DEPTH if local.as_ref() == b"Body" => {
                        return Err(SoapParseError::EmptyBody);
                    }
                    ACTION_DEPTH if in_body && envelope.is_none() => {
                        return Ok(ControlEnvelope::from_action_element(e, &scopes));
                    }
                    ARGUMENT_DEPTH => {
                        if let Some(env) = envelope.as_mut() {
                            let name = String::from_utf8_lossy(local.as_ref()).to_string();
                            env.arguments.push(name, String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                match scopes.len() {
                    ACTION_DEPTH if in_body => {
                        if let Some(env) = envelope.take() {
                            return Ok(env);
                        }
                    }
                    BODY_DEPTH if in_body => return Err(SoapParseError::EmptyBody),
                    ENVELOPE_DEPTH => return Err(SoapParseError::MissingBody),
                    _ => {}
                }
                scopes.pop();
            }
            Ok(Event::Eof) => {
                return Err(if scopes.is_empty() {
                    SoapParseError::MissingEnvelope
                } else {
                    SoapParseError::Malformed("unexpected end of document".to_string())
                });
            }
            _ => {}
        }

        buf.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialization
// ─────────────────────────────────────────────────────────────────────────────

fn envelope_open() -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="{}" s:encodingStyle="{}"><s:Body>"#,
        SOAP_ENVELOPE_NS, SOAP_ENCODING_STYLE
    )
}

const ENVELOPE_CLOSE: &str = "</s:Body></s:Envelope>";

/// Serializes a successful action result.
///
/// Result values are XML-escaped; field order follows `fields`.
#[must_use]
pub fn serialize_response(action: &str, service_type: &str, fields: &[(&str, String)]) -> String {
    let mut body = envelope_open();
    body.push_str(&format!(
        r#"<u:{}Response xmlns:u="{}">"#,
        action,
        escape_xml(service_type)
    ));

    for (name, value) in fields {
        body.push_str(&format!("<{name}>{}</{name}>", escape_xml(value)));
    }

    body.push_str(&format!("</u:{}Response>", action));
    body.push_str(ENVELOPE_CLOSE);
    body
}

/// Serializes a SOAP fault carrying a UPnP error code and description.
#[must_use]
pub fn serialize_fault(code: u16, description: &str) -> String {
    let mut body = envelope_open();
    body.push_str(&format!(
        concat!(
            "<s:Fault>",
            "<faultcode>s:Client</faultcode>",
            "<faultstring>UPnPError</faultstring>",
            "<detail>",
            r#"<UPnPError xmlns="{}">"#,
            "<errorCode>{}</errorCode>",
            "<errorDescription>{}</errorDescription>",
            "</UPnPError>",
            "</detail>",
            "</s:Fault>"
        ),
        UPNP_CONTROL_NS,
        code,
        escape_xml(description)
    ));
    body.push_str(ENVELOPE_CLOSE);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVT: &str = "urn:schemas-upnp-org:service:AVTransport:1";

    fn request(action_xml: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>{}</s:Body></s:Envelope>"#,
            action_xml
        )
    }

    #[test]
    fn parses_action_namespace_and_ordered_arguments() {
        let body = request(&format!(
            r#"<u:SetAVTransportURI xmlns:u="{AVT}"><InstanceID>0</InstanceID><CurrentURI>http://x/y.mp3?a=1&amp;b=2</CurrentURI><CurrentURIMetaData></CurrentURIMetaData></u:SetAVTransportURI>"#
        ));

        let env = parse_envelope(&body).unwrap();
        assert_eq!(env.action, "SetAVTransportURI");
        assert_eq!(env.service_type, AVT);

        let args: Vec<_> = env.arguments.iter().collect();
        assert_eq!(
            args,
            vec![
                ("InstanceID", "0"),
                ("CurrentURI", "http://x/y.mp3?a=1&b=2"),
                ("CurrentURIMetaData", ""),
            ]
        );
    }

    #[test]
    fn escaped_didl_metadata_is_decoded() {
        let body = request(&format!(
            r#"<u:SetAVTransportURI xmlns:u="{AVT}"><CurrentURIMetaData>&lt;DIDL-Lite&gt;&lt;dc:title&gt;Song&lt;/dc:title&gt;&lt;/DIDL-Lite&gt;</CurrentURIMetaData></u:SetAVTransportURI>"#
        ));

        let env = parse_envelope(&body).unwrap();
        assert_eq!(
            env.arguments.get("CurrentURIMetaData"),
            Some("<DIDL-Lite><dc:title>Song</dc:title></DIDL-Lite>")
        );
    }

    #[test]
    fn cdata_metadata_is_unwrapped() {
        let body = request(&format!(
            r#"<u:SetAVTransportURI xmlns:u="{AVT}"><InstanceID>0</InstanceID><CurrentURI>http://x/y.flac</CurrentURI><CurrentURIMetaData><![CDATA[<DIDL-Lite><item><dc:title>A &amp; B</dc:title></item></DIDL-Lite>]]></CurrentURIMetaData></u:SetAVTransportURI>"#
        ));

        let env = parse_envelope(&body).unwrap();
        assert_eq!(
            env.arguments.get("CurrentURIMetaData"),
            Some("<DIDL-Lite><item><dc:title>A &amp; B</dc:title></item></DIDL-Lite>")
        );
        assert_eq!(env.arguments.get("CurrentURI"), Some("http://x/y.flac"));
    }

    #[test]
    fn mixed_text_references_and_cdata_are_joined() {
        let body = request(&format!(
            r#"<u:SetAVTransportURI xmlns:u="{AVT}"><CurrentURI>http://h/a&#63;x=1&amp;y=<![CDATA[<2>]]></CurrentURI></u:SetAVTransportURI>"#
        ));

        let env = parse_envelope(&body).unwrap();
        assert_eq!(env.arguments.get("CurrentURI"), Some("http://h/a?x=1&y=<2>"));
    }

    #[test]
    fn self_closing_action_and_arguments_are_accepted() {
        let env = parse_envelope(&request(&format!(r#"<u:Stop xmlns:u="{AVT}"/>"#))).unwrap();
        assert_eq!(env.action, "Stop");
        assert!(env.arguments.is_empty());

        let env = parse_envelope(&request(&format!(
            r#"<u:Stop xmlns:u="{AVT}"><InstanceID/></u:Stop>"#
        )))
        .unwrap();
        assert_eq!(env.arguments.get("InstanceID"), Some(""));
    }

    #[test]
    fn namespace_declared_on_envelope_is_resolved() {
        let body = format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" xmlns:u="{AVT}"><s:Header/><s:Body><u:Play><Speed>1</Speed></u:Play></s:Body></s:Envelope>"#
        );
        let env = parse_envelope(&body).unwrap();
        assert_eq!(env.action, "Play");
        assert_eq!(env.service_type, AVT);
        assert_eq!(env.arguments.get("Speed"), Some("1"));
    }

    #[test]
    fn structural_errors_are_reported() {
        assert_eq!(
            parse_envelope("not xml at all"),
            Err(SoapParseError::MissingEnvelope)
        );
        assert_eq!(
            parse_envelope("<root><child/></root>"),
            Err(SoapParseError::MissingEnvelope)
        );
        assert_eq!(
            parse_envelope(r#"<s:Envelope xmlns:s="x"><s:Header/></s:Envelope>"#),
            Err(SoapParseError::MissingBody)
        );
        assert_eq!(
            parse_envelope(&request("")),
            Err(SoapParseError::EmptyBody)
        );
        assert_eq!(
            parse_envelope(r#"<s:Envelope xmlns:s="x"><s:Body/></s:Envelope>"#),
            Err(SoapParseError::EmptyBody)
        );
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let truncated = r#"<s:Envelope xmlns:s="x"><s:Body><u:Play xmlns:u="y">"#;
        assert!(matches!(
            parse_envelope(truncated),
            Err(SoapParseError::Malformed(_))
        ));

        let mismatched = r#"<s:Envelope xmlns:s="x"><s:Body><u:Play xmlns:u="y"></u:Stop></s:Body></s:Envelope>"#;
        assert!(matches!(
            parse_envelope(mismatched),
            Err(SoapParseError::Malformed(_))
        ));
    }

    #[test]
    fn response_wraps_fields_in_order() {
        let xml = serialize_response(
            "GetVolume",
            "urn:schemas-upnp-org:service:RenderingControl:1",
            &[("CurrentVolume", "42".to_string())],
        );

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains(
            r#"<u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1"><CurrentVolume>42</CurrentVolume></u:GetVolumeResponse>"#
        ));
        assert!(xml.ends_with("</s:Body></s:Envelope>"));
    }

    #[test]
    fn response_escapes_values_and_parses_back() {
        let xml = serialize_response(
            "GetMediaInfo",
            AVT,
            &[
                ("CurrentURI", "http://x/y?a=1&b=2".to_string()),
                ("CurrentURIMetaData", "<DIDL-Lite/>".to_string()),
            ],
        );
        assert!(xml.contains("<CurrentURI>http://x/y?a=1&amp;b=2</CurrentURI>"));

        let parsed = parse_envelope(&xml).unwrap();
        assert_eq!(parsed.action, "GetMediaInfoResponse");
        assert_eq!(parsed.arguments.get("CurrentURIMetaData"), Some("<DIDL-Lite/>"));
    }

    #[test]
    fn fault_carries_upnp_error() {
        let xml = serialize_fault(401, "Invalid Action");
        assert!(xml.contains("<faultcode>s:Client</faultcode>"));
        assert!(xml.contains("<faultstring>UPnPError</faultstring>"));
        assert!(xml.contains(r#"<UPnPError xmlns="urn:schemas-upnp-org:control-1-0">"#));
        assert!(xml.contains("<errorCode>401</errorCode>"));
        assert!(xml.contains("<errorDescription>Invalid Action</errorDescription>"));
    }
}
