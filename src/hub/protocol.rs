//! SignalR JSON hub protocol framing
//!
//! Every frame is a JSON object terminated by the ASCII record separator.
//! Only the subset used by the market hub is modelled.

use serde::Deserialize;
use serde_json::{json, Value};

/// Frame terminator
pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const COMPLETION: u8 = 3;
const PING: u8 = 6;
const CLOSE: u8 = 7;

/// A decoded hub frame
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Reply to the protocol handshake
    Handshake { error: Option<String> },
    /// Server-to-client method call
    Invocation { target: String, arguments: Vec<Value> },
    /// Result of a client invocation that carried an id
    Completion { error: Option<String> },
    Ping,
    /// Server is closing the connection
    Close { error: Option<String> },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<u8>,
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    error: Option<String>,
}

/// Handshake request, sent once after every connect
pub fn handshake_request() -> String {
    frame(&json!({ "protocol": "json", "version": 1 }))
}

/// Fire-and-forget invocation of a hub method
pub fn invocation(target: &str, arguments: Vec<Value>) -> String {
    frame(&json!({ "type": INVOCATION, "target": target, "arguments": arguments }))
}

/// Protocol keepalive
pub fn ping() -> String {
    frame(&json!({ "type": PING }))
}

fn frame(value: &Value) -> String {
    let mut text = value.to_string();
    text.push(RECORD_SEPARATOR);
    text
}

/// Split a text payload into frames and decode each
///
/// A payload may carry several frames. Frames that are not valid JSON or
/// have an unknown type are skipped. A frame with no `type` field is the
/// handshake response.
pub fn parse_frames(payload: &str) -> Vec<HubMessage> {
    payload
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| match serde_json::from_str::<RawFrame>(chunk) {
            Ok(raw) => decode(raw),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed hub frame");
                None
            }
        })
        .collect()
}

fn decode(raw: RawFrame) -> Option<HubMessage> {
    match raw.kind {
        None => Some(HubMessage::Handshake { error: raw.error }),
        Some(INVOCATION) => Some(HubMessage::Invocation {
            target: raw.target?,
            arguments: raw.arguments,
        }),
        Some(COMPLETION) => Some(HubMessage::Completion { error: raw.error }),
        Some(PING) => Some(HubMessage::Ping),
        Some(CLOSE) => Some(HubMessage::Close { error: raw.error }),
        Some(other) => {
            tracing::trace!(kind = other, "Ignoring hub frame type");
            None
        }
    }
}
