//! Market hub client
//!
//! Speaks the SignalR JSON protocol over the reconnecting WebSocket
//! transport and turns gateway invocations into [`MarketEvent`]s.

use super::protocol::{self, HubMessage};
use super::types::MarketEvent;
use crate::telemetry::{self, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use reqwest::Url;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Time allowed for queued frames to flush when shutting down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Market hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),
    #[error("hub connection closed")]
    Closed,
}

/// Market hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub endpoint without query string
    pub hub_url: String,
    pub access_token: String,
    pub contract_id: String,
    pub quotes: bool,
    pub trades: bool,
    pub depth: bool,
    /// Interval for protocol pings
    pub keepalive: Duration,
    /// Reconnect attempts (0 = infinite)
    pub max_reconnects: u32,
    pub reconnect_delay: Duration,
}

impl HubConfig {
    pub fn new(
        hub_url: impl Into<String>,
        access_token: impl Into<String>,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            hub_url: hub_url.into(),
            access_token: access_token.into(),
            contract_id: contract_id.into(),
            quotes: true,
            trades: true,
            depth: true,
            keepalive: Duration::from_secs(10),
            max_reconnects: 5,
            reconnect_delay: Duration::from_secs(5),
        }
    }

    /// Hub URL with the URL-encoded access token
    pub fn connect_url(&self) -> Result<String, HubError> {
        let mut url =
            Url::parse(&self.hub_url).map_err(|e| HubError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token);
        Ok(url.into())
    }

    /// Subscribe invocations for the enabled streams
    fn subscribe_messages(&self) -> Vec<String> {
        self.stream_methods("Subscribe")
    }

    fn unsubscribe_messages(&self) -> Vec<String> {
        self.stream_methods("Unsubscribe")
    }

    fn stream_methods(&self, verb: &str) -> Vec<String> {
        [
            (self.quotes, "ContractQuotes"),
            (self.trades, "ContractTrades"),
            (self.depth, "ContractMarketDepth"),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, stream)| {
            protocol::invocation(&format!("{verb}{stream}"), vec![json!(self.contract_id)])
        })
        .collect()
    }
}

/// Handle for an active hub subscription
pub struct HubHandle {
    config: HubConfig,
    send_tx: mpsc::Sender<String>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HubHandle {
    /// Send the unsubscribe invocations
    pub async fn unsubscribe_all(&self) -> Result<(), HubError> {
        tracing::info!(contract_id = %self.config.contract_id, "Unsubscribing from market data");
        for msg in self.config.unsubscribe_messages() {
            self.send_tx.send(msg).await.map_err(|_| HubError::Closed)?;
        }
        Ok(())
    }

    /// Unsubscribe, then wait for the socket to flush and close
    pub async fn shutdown(self) {
        if let Err(e) = self.unsubscribe_all().await {
            tracing::debug!(error = %e, "Hub already closed");
        }

        let Self {
            send_tx,
            stop_tx,
            task,
            ..
        } = self;
        drop(send_tx);
        let _ = stop_tx.send(());

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => tracing::info!("Market hub closed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Market hub task failed"),
            Err(_) => tracing::warn!("Market hub did not close in time"),
        }
    }
}

/// Market data client for a single contract
pub struct MarketHub {
    config: HubConfig,
}

impl MarketHub {
    pub fn new(config: HubConfig) -> Self {
        Self { config }
    }

    /// Connect and subscribe
    ///
    /// Subscriptions are re-sent after every reconnect. Events for other
    /// contracts are dropped.
    pub fn subscribe(&self) -> Result<(mpsc::Receiver<MarketEvent>, HubHandle), HubError> {
        let url = self.config.connect_url()?;
        let ws_config = WsConfig::new(url)
            .max_reconnects(self.config.max_reconnects)
            .initial_delay(self.config.reconnect_delay)
            .max_delay(self.config.reconnect_delay * 4);

        let (ws_rx, send_tx) = WsClient::new(ws_config).connect_bidirectional();
        let (event_tx, event_rx) = mpsc::channel(1024);

        let (stop_tx, stop_rx) = oneshot::channel();

        let config = self.config.clone();
        let loop_tx = send_tx.clone();
        let task = tokio::spawn(async move {
            run_hub_loop(config, ws_rx, loop_tx, event_tx, stop_rx).await;
        });

        tracing::info!(contract_id = %self.config.contract_id, "Market hub subscription started");

        Ok((
            event_rx,
            HubHandle {
                config: self.config.clone(),
                send_tx,
                stop_tx,
                task,
            },
        ))
    }
}

/// Drive handshake, keepalive and dispatch for one hub connection
///
/// On stop the loop releases its sender and waits for the transport to
/// report the close, so frames queued before the stop reach the socket.
async fn run_hub_loop(
    config: HubConfig,
    mut ws_rx: mpsc::Receiver<WsMessage>,
    send_tx: mpsc::Sender<String>,
    event_tx: mpsc::Sender<MarketEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut keepalive = tokio::time::interval(config.keepalive);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut handshaken = false;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,

            msg = ws_rx.recv() => {
                match msg {
                    Some(WsMessage::Connected) => {
                        handshaken = false;
                        if send_tx.send(protocol::handshake_request()).await.is_err() {
                            return;
                        }
                    }
                    Some(WsMessage::Text(text)) => {
                        for frame in protocol::parse_frames(&text) {
                            match handle_frame(&config, frame, &mut handshaken, &send_tx, &event_tx).await {
                                Ok(()) => {}
                                Err(HubError::Closed) => return,
                                Err(e) => tracing::warn!(error = %e, "Hub frame handling failed"),
                            }
                        }
                    }
                    Some(WsMessage::Reconnecting { attempt }) => {
                        handshaken = false;
                        telemetry::increment(CounterMetric::HubReconnects);
                        tracing::warn!(attempt, "Market hub reconnecting...");
                    }
                    Some(WsMessage::Disconnected) | None => {
                        tracing::warn!(contract_id = %config.contract_id, "Market hub disconnected");
                        return;
                    }
                    Some(WsMessage::Binary(_)) => {}
                }
            }

            _ = keepalive.tick() => {
                if handshaken && send_tx.send(protocol::ping()).await.is_err() {
                    return;
                }
            }
        }
    }

    drop(send_tx);
    while let Some(msg) = ws_rx.recv().await {
        if matches!(msg, WsMessage::Disconnected) {
            break;
        }
    }
}

async fn handle_frame(
    config: &HubConfig,
    frame: HubMessage,
    handshaken: &mut bool,
    send_tx: &mpsc::Sender<String>,
    event_tx: &mpsc::Sender<MarketEvent>,
) -> Result<(), HubError> {
    match frame {
        HubMessage::Handshake { error: Some(error) } => {
            tracing::error!(%error, "Hub handshake rejected");
        }
        HubMessage::Handshake { error: None } => {
            *handshaken = true;
            tracing::info!(contract_id = %config.contract_id, "Hub handshake complete, subscribing");
            for msg in config.subscribe_messages() {
                send_tx.send(msg).await.map_err(|_| HubError::Closed)?;
            }
        }
        HubMessage::Invocation { target, arguments } => {
            match MarketEvent::from_invocation(&target, &arguments) {
                Some(event) if event.contract_id() == config.contract_id => {
                    event_tx.send(event).await.map_err(|_| HubError::Closed)?;
                }
                Some(event) => {
                    tracing::trace!(contract_id = %event.contract_id(), "Dropping event for other contract");
                }
                None => {
                    tracing::debug!(%target, "Unhandled hub invocation");
                }
            }
        }
        HubMessage::Completion { error: Some(error) } => {
            tracing::warn!(%error, "Hub invocation failed");
        }
        HubMessage::Close { error } => {
            tracing::warn!(?error, "Hub sent close");
        }
        HubMessage::Completion { error: None } | HubMessage::Ping => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::protocol::RECORD_SEPARATOR;

    fn config() -> HubConfig {
        HubConfig::new(
            "wss://rtc.example.com/hubs/market",
            "abc/def+ghi=",
            "CON.F.US.MNQ.M25",
        )
    }

    #[test]
    fn test_connect_url_encodes_token() {
        let url = config().connect_url().unwrap();
        assert_eq!(
            url,
            "wss://rtc.example.com/hubs/market?access_token=abc%2Fdef%2Bghi%3D"
        );
    }

    #[test]
    fn test_connect_url_invalid() {
        let mut cfg = config();
        cfg.hub_url = "not a url".to_string();
        assert!(matches!(cfg.connect_url(), Err(HubError::InvalidUrl(_))));
    }

    #[test]
    fn test_subscribe_messages_respect_toggles() {
        let mut cfg = config();
        cfg.depth = false;
        let msgs = cfg.subscribe_messages();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].contains("SubscribeContractQuotes"));
        assert!(msgs[1].contains("SubscribeContractTrades"));

        let unsub = cfg.unsubscribe_messages();
        assert!(unsub[0].contains("UnsubscribeContractQuotes"));
    }

    #[tokio::test]
    async fn test_handshake_then_subscribe_then_dispatch() {
        let (ws_tx, ws_rx) = mpsc::channel(16);
        let (send_tx, mut send_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(run_hub_loop(config(), ws_rx, send_tx, event_tx, stop_rx));

        ws_tx.send(WsMessage::Connected).await.unwrap();
        let handshake = send_rx.recv().await.unwrap();
        assert!(handshake.contains("\"protocol\":\"json\""));

        ws_tx
            .send(WsMessage::Text(format!("{{}}{}", RECORD_SEPARATOR)))
            .await
            .unwrap();
        for expected in ["SubscribeContractQuotes", "SubscribeContractTrades", "SubscribeContractMarketDepth"] {
            let msg = send_rx.recv().await.unwrap();
            assert!(msg.contains(expected), "{msg} should contain {expected}");
        }

        // Other contract is dropped, ours is delivered
        let other = format!(
            r#"{{"type":1,"target":"GatewayTrade","arguments":["CON.F.US.ES.M25",[{{"price":5300}}]]}}{}"#,
            RECORD_SEPARATOR
        );
        let ours = format!(
            r#"{{"type":1,"target":"GatewayTrade","arguments":["CON.F.US.MNQ.M25",[{{"price":21250.25}}]]}}{}"#,
            RECORD_SEPARATOR
        );
        ws_tx.send(WsMessage::Text(other + &ours)).await.unwrap();

        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.contract_id(), "CON.F.US.MNQ.M25");

        ws_tx.send(WsMessage::Disconnected).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_releases_sender_and_waits_for_close() {
        let (ws_tx, ws_rx) = mpsc::channel(16);
        let (send_tx, mut send_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = oneshot::channel();

        let outside_tx = send_tx.clone();
        let handle = tokio::spawn(run_hub_loop(config(), ws_rx, send_tx, event_tx, stop_rx));

        // Queued before the stop, as `shutdown` does with the unsubscribes
        outside_tx.send("unsubscribe".to_string()).await.unwrap();
        drop(outside_tx);
        stop_tx.send(()).unwrap();

        // Queued frame is still delivered, then the channel closes
        assert_eq!(send_rx.recv().await.as_deref(), Some("unsubscribe"));
        assert!(send_rx.recv().await.is_none());

        // Loop waits for the transport to report the close
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        ws_tx.send(WsMessage::Disconnected).await.unwrap();
        handle.await.unwrap();
    }
}
