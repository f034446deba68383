//! Webhook signal bot
//!
//! Polls the trades file written by the webhook receiver and opens one
//! bracket per new signal, using the signal's own TP/SL prices.

use super::session::{EntryBlock, Session};
use crate::analysis::SignalAdvisor;
use crate::execution::{BracketError, BracketOutcome, BracketRequest};
use crate::hub::{HubHandle, MarketEvent};
use crate::risk::cap_size;
use crate::telemetry::{self, CounterMetric};
use crate::webhook::{read_inbox, signal_id, ProcessedStore, WebhookSignal};
use rust_decimal::Decimal;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// What one poll did
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// Nothing new in the inbox
    Idle,
    /// A bracket is working
    BracketOpen,
    BracketClosed(BracketOutcome),
    Placed(String),
    /// Dropped by the advisor or risk limits
    Skipped(String),
    /// Failed validation, or the bracket failed after the entry traded
    Rejected(String),
    /// Left in the inbox for a later poll
    Deferred(String),
}

/// Signal bot settings
#[derive(Debug, Clone)]
pub struct SignalBotConfig {
    pub trades_file: PathBuf,
    pub poll_interval: Duration,
    pub tick_size: Decimal,
    pub max_position_size: u32,
}

/// Places brackets for TradingView webhook signals
pub struct SignalBot {
    session: Session,
    store: ProcessedStore,
    advisor: Option<SignalAdvisor>,
    config: SignalBotConfig,
}

impl SignalBot {
    pub fn new(
        session: Session,
        store: ProcessedStore,
        advisor: Option<SignalAdvisor>,
        config: SignalBotConfig,
    ) -> Self {
        Self {
            session,
            store,
            advisor,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &ProcessedStore {
        &self.store
    }

    /// Poll the working bracket, or handle at most one new signal
    pub async fn poll_once(&mut self) -> PollResult {
        if self.session.active_bracket().is_some() {
            return match self.session.poll_bracket().await {
                Ok(Some(outcome)) => PollResult::BracketClosed(outcome),
                Ok(None) => PollResult::BracketOpen,
                Err(e) => {
                    tracing::warn!(error = %e, "Bracket poll failed");
                    PollResult::BracketOpen
                }
            };
        }

        // A position without a bracket blocks entries until the broker agrees
        if !self.session.position().is_flat() {
            if let Err(e) = self.session.reconcile().await {
                tracing::warn!(error = %e, "Position reconcile failed");
            }
        }

        let inbox = read_inbox(&self.config.trades_file).await;
        let Some(raw) = inbox
            .into_iter()
            .find(|raw| !self.store.contains(&signal_id(raw)))
        else {
            return PollResult::Idle;
        };

        let result = self.process(&raw).await;
        match &result {
            PollResult::Placed(_) | PollResult::Skipped(_) | PollResult::Rejected(_) => {
                self.save().await
            }
            _ => {}
        }
        result
    }

    async fn process(&mut self, raw: &Value) -> PollResult {
        let id = signal_id(raw);

        let signal = match WebhookSignal::from_value(raw) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(signal = %id, error = %e, "Invalid signal");
                self.store.insert(id.clone());
                return PollResult::Rejected(id);
            }
        };

        match self.session.entry_allowed() {
            Ok(()) => {}
            Err(EntryBlock::Busy) => {
                tracing::info!(signal = %id, "Position open, deferring signal");
                return PollResult::Deferred(id);
            }
            Err(EntryBlock::Halted(reason)) => {
                tracing::warn!(signal = %id, ?reason, "Signal skipped by risk limits");
                telemetry::increment(CounterMetric::SignalsSkipped);
                self.store.insert(id.clone());
                return PollResult::Skipped(id);
            }
        }

        let (quantity, levels) = match &self.advisor {
            Some(advisor) => {
                let advice = advisor.advise(&signal).await;
                if advice.is_skip() {
                    tracing::info!(
                        signal = %id,
                        confidence = advice.confidence.overall,
                        "Signal skipped by advisor"
                    );
                    telemetry::increment(CounterMetric::SignalsSkipped);
                    self.store.insert(id.clone());
                    return PollResult::Skipped(id);
                }
                advice.apply(&signal, self.config.tick_size)
            }
            None => (signal.quantity, signal.levels()),
        };

        let request = BracketRequest {
            action: signal.action,
            size: cap_size(quantity, self.config.max_position_size),
            reference_price: signal.price,
            levels,
        };

        if self.session.last_price().is_none() {
            self.session.observe_price(signal.price).await;
        }

        match self.session.enter(request).await {
            Ok(bracket) => {
                telemetry::increment(CounterMetric::SignalsExecuted);
                tracing::info!(
                    signal = %id,
                    action = %bracket.action,
                    size = bracket.size,
                    take_profit = %bracket.levels.take_profit,
                    stop_loss = %bracket.levels.stop_loss,
                    "Signal executed"
                );
                self.store.insert(id.clone());
                PollResult::Placed(id)
            }
            Err(BracketError::InvalidLevels(reason)) => {
                tracing::warn!(signal = %id, %reason, "Signal levels rejected");
                self.store.insert(id.clone());
                PollResult::Rejected(id)
            }
            Err(e @ BracketError::Protection { .. }) => {
                // The entry already traded; retrying would open it again
                tracing::error!(signal = %id, error = %e, "Signal bracket failed after entry");
                self.store.insert(id.clone());
                if let BracketError::Protection { flattened: false, .. } = e {
                    if let Err(e) = self.session.reconcile().await {
                        tracing::error!(error = %e, "Failed to sync unprotected position");
                    }
                }
                PollResult::Rejected(id)
            }
            Err(e) => {
                tracing::error!(
                    signal = %id,
                    error = %e,
                    "Failed to place signal bracket, will retry"
                );
                PollResult::Deferred(id)
            }
        }
    }

    async fn save(&self) {
        if let Err(e) = self.store.save().await {
            tracing::error!(error = %e, "Failed to save processed trades");
        }
    }

    /// Run until Ctrl-C; market data is optional and only feeds prices
    pub async fn run(
        self,
        market: Option<(mpsc::Receiver<MarketEvent>, HubHandle)>,
    ) -> anyhow::Result<()> {
        let (events, hub) = match market {
            Some((events, hub)) => (Some(events), Some(hub)),
            None => (None, None),
        };
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(events, shutdown).await;

        if let Some(hub) = hub {
            hub.shutdown().await;
        }
        Ok(())
    }

    /// Event loop; returns the session after `shutdown` completes
    pub async fn run_until(
        mut self,
        mut events: Option<mpsc::Receiver<MarketEvent>>,
        shutdown: impl Future<Output = ()>,
    ) -> Session {
        let period = self.config.poll_interval.max(Duration::from_millis(10));
        let mut poll = tokio::time::interval(period);
        tokio::pin!(shutdown);

        tracing::info!(
            trades_file = %self.config.trades_file.display(),
            processed = self.store.len(),
            advisor = self.advisor.is_some(),
            "Signal bot running"
        );

        loop {
            tokio::select! {
                event = next_event(&mut events) => {
                    match event {
                        Some(event) => {
                            if let Some(price) = event.last_trade_price() {
                                self.session.observe_price(price).await;
                            }
                        }
                        None => {
                            tracing::warn!("Market data stream ended, continuing without prices");
                            events = None;
                        }
                    }
                }
                _ = poll.tick() => {
                    let result = self.poll_once().await;
                    tracing::debug!(?result, "Signal poll");
                }
                _ = &mut shutdown => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.save().await;
        self.session.shutdown().await;
        tracing::info!(
            processed = self.store.len(),
            realized = %self.session.realized(),
            "Signal bot stopped"
        );
        self.session
    }
}

/// Next market event, or never when there is no stream
async fn next_event(events: &mut Option<mpsc::Receiver<MarketEvent>>) -> Option<MarketEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
