//! Webhook signal inbox
//!
//! An external receiver writes TradingView alerts to a JSON file; the
//! signal bot polls it and remembers which alerts it has handled.

mod signal;
mod store;

pub use signal::{signal_id, SignalError, WebhookSignal};
pub use store::{read_inbox, ProcessedStore};
