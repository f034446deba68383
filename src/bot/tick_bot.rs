//! Strategy-driven bot fed by the market hub trade stream

use super::session::{EntryBlock, Session};
use crate::config::BracketConfig;
use crate::execution::{BracketLevels, BracketRequest, TradeAction};
use crate::hub::{HubHandle, MarketEvent};
use crate::risk::cap_size;
use crate::strategy::{Strategy, StrategySignal};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Runs one strategy against live trades with bracket exits
pub struct TickBot {
    session: Session,
    strategy: Box<dyn Strategy>,
    bracket: BracketConfig,
    tick_size: Decimal,
    max_position_size: u32,
}

impl TickBot {
    pub fn new(
        session: Session,
        strategy: Box<dyn Strategy>,
        bracket: BracketConfig,
        tick_size: Decimal,
        max_position_size: u32,
    ) -> Self {
        Self {
            session,
            strategy,
            bracket,
            tick_size,
            max_position_size,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handle one trade batch: update price, ask the strategy, act
    pub async fn on_trade_price(&mut self, price: Decimal) {
        let start = Instant::now();
        self.session.observe_price(price).await;

        let position = self.session.position().size;
        let Some(signal) = self.strategy.on_price(price, position) else {
            return;
        };
        telemetry::record_latency(LatencyMetric::SignalEvaluation, start.elapsed());
        tracing::info!(
            strategy = self.strategy.name(),
            ?signal,
            %price,
            position,
            "Strategy signal"
        );

        match signal {
            StrategySignal::Enter(action) => self.enter(action, price).await,
            StrategySignal::Exit => {
                if let Err(e) = self.session.exit_position().await {
                    tracing::error!(error = %e, "Failed to exit position");
                }
            }
        }
    }

    /// Periodic bracket poll and position reconciliation
    pub async fn on_poll(&mut self) {
        if let Err(e) = self.session.poll_bracket().await {
            tracing::warn!(error = %e, "Bracket poll failed");
        }
        if let Err(e) = self.session.reconcile().await {
            tracing::warn!(error = %e, "Position reconciliation failed");
        }
    }

    async fn enter(&mut self, action: TradeAction, price: Decimal) {
        match self.session.entry_allowed() {
            Ok(()) => {}
            Err(EntryBlock::Busy) => {
                tracing::debug!(%action, "Entry ignored, position or bracket open");
                return;
            }
            Err(EntryBlock::Halted(reason)) => {
                telemetry::increment(CounterMetric::SignalsSkipped);
                tracing::warn!(?reason, %action, "Entry blocked by risk limits");
                return;
            }
        }

        let request = BracketRequest {
            action,
            size: cap_size(self.bracket.position_size, self.max_position_size),
            reference_price: price,
            levels: BracketLevels::from_points(
                action,
                price,
                self.bracket.tp_points,
                self.bracket.sl_points,
                self.tick_size,
            ),
        };

        match self.session.enter(request).await {
            Ok(bracket) => {
                telemetry::increment(CounterMetric::SignalsExecuted);
                tracing::info!(
                    strategy = self.strategy.name(),
                    %action,
                    size = bracket.size,
                    take_profit = %bracket.levels.take_profit,
                    stop_loss = %bracket.levels.stop_loss,
                    "Bracket opened"
                );
            }
            Err(e) => tracing::error!(error = %e, %action, "Failed to open bracket"),
        }
    }

    /// Run until Ctrl-C, then cancel the bracket and leave the hub
    pub async fn run(
        self,
        events: mpsc::Receiver<MarketEvent>,
        hub: HubHandle,
    ) -> anyhow::Result<()> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(events, shutdown).await;
        hub.shutdown().await;
        Ok(())
    }

    /// Event loop; returns after `shutdown` completes or the stream ends
    pub async fn run_until(
        mut self,
        mut events: mpsc::Receiver<MarketEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Session {
        let period = Duration::from_secs(self.bracket.poll_interval_secs.max(1));
        let mut poll = tokio::time::interval(period);
        tokio::pin!(shutdown);

        tracing::info!(
            strategy = self.strategy.name(),
            contract = self.session.contract_id(),
            "Tick bot running"
        );

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            if let Some(price) = event.last_trade_price() {
                                self.on_trade_price(price).await;
                            }
                        }
                        None => {
                            tracing::warn!("Market data stream ended");
                            break;
                        }
                    }
                }
                _ = poll.tick() => {
                    self.on_poll().await;
                }
                _ = &mut shutdown => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.session.shutdown().await;
        tracing::info!(realized = %self.session.realized(), "Tick bot stopped");
        self.session
    }
}
