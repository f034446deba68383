//! WebSocket transport
//!
//! Reconnecting client with keepalive pings and an optional outbound
//! channel. Protocol framing lives in the callers (see `hub`).

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
