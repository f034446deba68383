//! WebSocket client with automatic reconnection

use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Reusable WebSocket client with automatic reconnection and ping/pong handling
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Connect and return a receiver for messages
    ///
    /// Spawns a background task that owns the socket. The receiver sees
    /// payloads plus connection status events; `Connected` is emitted after
    /// every successful (re)connect so callers can redo their handshake.
    pub fn connect(&self) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(1024);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = run_connection_loop(config, tx, None).await {
                tracing::error!(error = %e, "WebSocket connection loop failed");
            }
        });

        rx
    }

    /// Connect and return both a receiver and a sender for bidirectional communication
    ///
    /// Dropping the sender closes the connection.
    pub fn connect_bidirectional(&self) -> (mpsc::Receiver<WsMessage>, mpsc::Sender<String>) {
        let (msg_tx, msg_rx) = mpsc::channel(1024);
        let (send_tx, send_rx) = mpsc::channel(256);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = run_connection_loop(config, msg_tx, Some(send_rx)).await {
                tracing::error!(error = %e, "WebSocket bidirectional loop failed");
            }
        });

        (msg_rx, send_tx)
    }
}

/// Run the connection loop with automatic reconnection
async fn run_connection_loop(
    config: WsConfig,
    tx: mpsc::Sender<WsMessage>,
    mut send_rx: Option<mpsc::Receiver<String>>,
) -> Result<(), WsError> {
    let mut reconnect_attempts = 0;
    let mut reconnect_delay = config.initial_reconnect_delay;

    loop {
        match connect_and_stream(&config, &tx, send_rx.as_mut()).await {
            Ok(()) => {
                tracing::info!("WebSocket connection closed cleanly");
                let _ = tx.send(WsMessage::Disconnected).await;
                break;
            }
            Err(e) => {
                reconnect_attempts += 1;
                tracing::warn!(
                    error = %e,
                    attempt = reconnect_attempts,
                    "WebSocket connection error, reconnecting..."
                );

                // 0 = retry forever
                if config.max_reconnect_attempts > 0
                    && reconnect_attempts >= config.max_reconnect_attempts
                {
                    tracing::error!("Max reconnection attempts reached");
                    let _ = tx.send(WsMessage::Disconnected).await;
                    return Err(WsError::MaxReconnectsExceeded);
                }

                if tx.is_closed() {
                    tracing::info!("Receiver dropped, stopping reconnection");
                    break;
                }

                let _ = tx
                    .send(WsMessage::Reconnecting {
                        attempt: reconnect_attempts,
                    })
                    .await;

                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
            }
        }
    }

    Ok(())
}

/// Connect to WebSocket and stream messages until close or error
async fn connect_and_stream(
    config: &WsConfig,
    tx: &mpsc::Sender<WsMessage>,
    mut send_rx: Option<&mut mpsc::Receiver<String>>,
) -> Result<(), WsError> {
    // The URL may carry an access token, so only the host is logged
    let host = config
        .url
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string();
    tracing::info!(url = %host, "Connecting to WebSocket");

    let (ws_stream, _response) = connect_async(config.url.as_str())
        .await
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    tracing::info!("WebSocket connected");

    if tx.send(WsMessage::Connected).await.is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(config.ping_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick completes immediately
    ping_interval.tick().await;

    let mut waiting_for_pong = false;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if tx.send(WsMessage::Text(text)).await.is_err() {
                            tracing::debug!("Receiver dropped, closing connection");
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if tx.send(WsMessage::Binary(data)).await.is_err() {
                            tracing::debug!("Receiver dropped, closing connection");
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        waiting_for_pong = false;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Received close frame");
                        return Err(WsError::ConnectionFailed("Server closed connection".into()));
                    }
                    Some(Err(e)) => {
                        return Err(WsError::ConnectionFailed(e.to_string()));
                    }
                    None => {
                        return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                    }
                    _ => {}
                }
            }

            msg = async {
                match &mut send_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match msg {
                    Some(text) => {
                        write.send(Message::Text(text)).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    }
                    None => {
                        // Sender dropped: caller is done with the connection
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }

            _ = ping_interval.tick() => {
                if waiting_for_pong {
                    return Err(WsError::ConnectionFailed("Pong timeout".into()));
                }
                write.send(Message::Ping(vec![])).await
                    .map_err(|e| WsError::SendFailed(e.to_string()))?;
                waiting_for_pong = true;
            }
        }
    }
}
