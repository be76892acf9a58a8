//! mpv JSON IPC message types.
//!
//! Each request is one JSON object per line:
//!
//! ```text
//! {"command":["set_property","volume",40],"request_id":7}
//! ```
//!
//! and mpv answers with `{"request_id":7,"error":"success","data":null}`.
//! Unsolicited events (`{"event":"end-file",...}`) share the same stream and
//! carry no `request_id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol_constants::ENGINE_SUCCESS;

/// A command sent to the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpcRequest {
    /// Verb followed by positional arguments.
    pub command: Vec<Value>,
    /// Correlation id echoed back by the engine.
    pub request_id: u64,
}

impl IpcRequest {
    /// Builds a request from a verb and its positional arguments.
    pub fn new(verb: &str, args: &[Value], request_id: u64) -> Self {
        let mut command = Vec::with_capacity(args.len() + 1);
        command.push(Value::String(verb.to_string()));
        command.extend(args.iter().cloned());
        Self {
            command,
            request_id,
        }
    }

    /// Serializes the request as a single line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A line read back from the engine: either a reply or an event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IpcResponse {
    /// Correlation id; absent on unsolicited events.
    #[serde(default)]
    pub request_id: Option<u64>,
    /// `"success"` or an engine error string; absent on events.
    #[serde(default)]
    pub error: Option<String>,
    /// Command result, if any.
    #[serde(default)]
    pub data: Option<Value>,
    /// Event name for unsolicited notifications.
    #[serde(default)]
    pub event: Option<String>,
}

impl IpcResponse {
    /// Parses one line received from the engine.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Whether this line answers the request with the given id.
    #[must_use]
    pub fn answers(&self, request_id: u64) -> bool {
        self.event.is_none() && self.request_id == Some(request_id)
    }

    /// Whether the engine reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.as_deref() == Some(ENGINE_SUCCESS)
    }

    /// Returns `data` as a float, accepting integer encodings.
    #[must_use]
    pub fn data_f64(&self) -> Option<f64> {
        self.data.as_ref().and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_verb_first() {
        let req = IpcRequest::new("loadfile", &[json!("http://x/y.mp3"), json!("replace")], 3);
        assert_eq!(
            req.to_line().unwrap(),
            r#"{"command":["loadfile","http://x/y.mp3","replace"],"request_id":3}"#
        );
    }

    #[test]
    fn reply_is_correlated_by_id() {
        let reply = IpcResponse::from_line(r#"{"request_id":5,"error":"success","data":42.5}"#)
            .unwrap();
        assert!(reply.answers(5));
        assert!(!reply.answers(4));
        assert!(reply.is_success());
        assert_eq!(reply.data_f64(), Some(42.5));
    }

    #[test]
    fn events_never_answer_requests() {
        let event = IpcResponse::from_line(r#"{"event":"playback-restart"}"#).unwrap();
        assert!(!event.answers(0));
        assert_eq!(event.event.as_deref(), Some("playback-restart"));
    }

    #[test]
    fn engine_errors_are_not_success() {
        let reply =
            IpcResponse::from_line(r#"{"request_id":1,"error":"property unavailable"}"#).unwrap();
        assert!(reply.answers(1));
        assert!(!reply.is_success());
        assert_eq!(reply.data, None);
    }
}
