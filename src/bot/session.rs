//! Account, position and bracket state shared by the bots

use crate::api::{resolve_account, Account, Broker};
use crate::config::Config;
use crate::execution::{
    Bracket, BracketError, BracketManager, BracketOutcome, BracketRequest, TradeAction,
};
use crate::journal::TradeJournal;
use crate::risk::{realized_pnl, DailyLossGuard, HaltReason, RiskError, TradingHours};
use crate::telemetry::{self, GaugeMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Upper bound for the configured reconcile grace
const MAX_RECONCILE_GRACE_SECS: u64 = 86_400;

/// Net position as the bot understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionState {
    /// Positive long, negative short
    pub size: i64,
    pub average_price: Option<Decimal>,
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        self.size == 0
    }

    pub fn action(&self) -> Option<TradeAction> {
        TradeAction::from_position(self.size)
    }

    pub fn contracts(&self) -> u32 {
        u32::try_from(self.size.unsigned_abs()).unwrap_or(u32::MAX)
    }
}

/// Why a new entry was not attempted
#[derive(Debug, Clone, PartialEq)]
pub enum EntryBlock {
    /// A position or bracket is already open
    Busy,
    Halted(HaltReason),
}

impl From<RiskError> for EntryBlock {
    fn from(e: RiskError) -> Self {
        match e {
            RiskError::TradingHalted(reason) => EntryBlock::Halted(reason),
        }
    }
}

/// One bot's trading session on one account and contract
pub struct Session {
    broker: Arc<dyn Broker>,
    account: Account,
    contract_id: String,
    point_value: Decimal,
    brackets: BracketManager,
    journal: TradeJournal,
    guard: DailyLossGuard,
    hours: Option<TradingHours>,
    reconcile_grace: chrono::Duration,
    position: PositionState,
    last_price: Option<Decimal>,
    realized: Decimal,
}

impl Session {
    /// Pick the account, adopt any open position and clear stale orders
    pub async fn open(broker: Arc<dyn Broker>, config: &Config) -> anyhow::Result<Self> {
        let account = resolve_account(broker.as_ref(), config.broker.account_id).await?;
        tracing::info!(
            account_id = account.id,
            name = %account.name,
            balance = %account.balance,
            "Trading account selected"
        );

        let contract_id = config.contract.contract_id.clone();
        let brackets = BracketManager::new(
            broker.clone(),
            account.id,
            &contract_id,
            config.contract.tick_size,
        );

        let mut session = Self {
            broker,
            account,
            contract_id,
            point_value: config.contract.point_value,
            brackets,
            journal: TradeJournal::new(&config.journal.path),
            guard: DailyLossGuard::from_config(&config.risk),
            hours: config.risk.trading_hours.as_ref().map(TradingHours::from_config),
            reconcile_grace: chrono::Duration::seconds(
                config
                    .execution
                    .reconcile_grace_secs
                    .min(MAX_RECONCILE_GRACE_SECS) as i64,
            ),
            position: PositionState::default(),
            last_price: None,
            realized: Decimal::ZERO,
        };

        session.position = session.fetch_position().await?;
        if !session.position.is_flat() {
            tracing::warn!(
                size = session.position.size,
                average_price = ?session.position.average_price,
                "Adopted existing position"
            );
        }

        let cancelled = session.brackets.cancel_open_orders().await?;
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled stale open orders");
        }
        session.publish_position();
        Ok(session)
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.last_price
    }

    pub fn realized(&self) -> Decimal {
        self.realized
    }

    pub fn active_bracket(&self) -> Option<&Bracket> {
        self.brackets.active()
    }

    /// Record a trade price and pass it to the broker
    pub async fn observe_price(&mut self, price: Decimal) {
        self.last_price = Some(price);
        telemetry::set_gauge(GaugeMetric::LastPrice, price.to_f64().unwrap_or_default());
        self.broker.on_market_price(&self.contract_id, price).await;
    }

    /// Whether a new bracket may be opened now
    pub fn entry_allowed(&mut self) -> Result<(), EntryBlock> {
        self.entry_allowed_at(Utc::now())
    }

    /// Whether a new bracket may be opened at `now`
    pub fn entry_allowed_at(&mut self, now: DateTime<Utc>) -> Result<(), EntryBlock> {
        if !self.position.is_flat() || self.brackets.is_active() {
            return Err(EntryBlock::Busy);
        }
        self.guard.check(now)?;
        if let Some(hours) = &self.hours {
            hours.check(now)?;
        }
        Ok(())
    }

    /// Open a bracketed position and journal the entry
    pub async fn enter(&mut self, request: BracketRequest) -> Result<Bracket, BracketError> {
        let bracket = self.brackets.place(request).await?;

        // The broker's average price beats the reference when it is available
        let average_price = match self.fetch_position().await {
            Ok(position) if !position.is_flat() => position.average_price,
            _ => None,
        };
        self.position = PositionState {
            size: bracket.action.sign() * i64::from(bracket.size),
            average_price: average_price.or(Some(bracket.reference_price)),
        };
        self.publish_position();

        let entry_price = self.position.average_price.unwrap_or(bracket.reference_price);
        if let Err(e) = self
            .journal
            .record_entry(bracket.action, bracket.size, entry_price)
            .await
        {
            tracing::error!(error = %e, "Failed to journal entry");
        }
        Ok(bracket)
    }

    /// Check the active bracket and settle the position when it resolves
    pub async fn poll_bracket(&mut self) -> Result<Option<BracketOutcome>, BracketError> {
        let Some(outcome) = self.brackets.poll().await? else {
            return Ok(None);
        };

        match outcome.exit_price() {
            Some(exit_price) => self.record_exit(exit_price).await,
            None => {
                // Legs are gone but the entry may still be open
                if let Some(action) = self.position.action() {
                    match self.brackets.flatten(action, self.position.contracts()).await {
                        Ok(_) => {
                            let exit = self.exit_reference();
                            self.record_exit(exit).await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to flatten unprotected position")
                        }
                    }
                }
            }
        }
        Ok(Some(outcome))
    }

    /// Close the position at market and drop its bracket
    pub async fn exit_position(&mut self) -> Result<(), BracketError> {
        self.brackets.cancel_all().await;
        let Some(action) = self.position.action() else {
            return Ok(());
        };
        self.brackets.flatten(action, self.position.contracts()).await?;
        let exit = self.exit_reference();
        self.record_exit(exit).await;
        Ok(())
    }

    /// Compare with broker positions and record exits the bot missed
    pub async fn reconcile(&mut self) -> anyhow::Result<()> {
        if let Some(bracket) = self.brackets.active() {
            let age = Utc::now() - bracket.placed_at;
            if age < self.reconcile_grace {
                return Ok(());
            }
        }

        let broker_position = self.fetch_position().await?;
        if broker_position.is_flat() && !self.position.is_flat() {
            tracing::warn!(size = self.position.size, "Broker reports flat, recording exit");
            self.brackets.cancel_all().await;
            let exit = self.exit_reference();
            self.record_exit(exit).await;
        } else if broker_position.size != self.position.size {
            tracing::warn!(
                ours = self.position.size,
                broker = broker_position.size,
                "Position mismatch, adopting broker position"
            );
            self.position = broker_position;
            self.publish_position();
        }
        Ok(())
    }

    /// Cancel working bracket legs
    pub async fn shutdown(&mut self) {
        self.brackets.cancel_all().await;
    }

    async fn fetch_position(&self) -> anyhow::Result<PositionState> {
        let positions = self.broker.search_open_positions(self.account.id).await?;
        Ok(positions
            .iter()
            .find(|p| p.contract_id == self.contract_id)
            .map(|p| PositionState {
                size: p.signed_size(),
                average_price: Some(p.average_price),
            })
            .unwrap_or_default())
    }

    /// Last trade price, else the entry price
    fn exit_reference(&self) -> Decimal {
        self.last_price
            .or(self.position.average_price)
            .unwrap_or(Decimal::ZERO)
    }

    async fn record_exit(&mut self, exit_price: Decimal) {
        let Some(action) = self.position.action() else {
            return;
        };
        let entry = self.position.average_price.unwrap_or(exit_price);
        let change = realized_pnl(
            action,
            entry,
            exit_price,
            self.position.contracts(),
            self.point_value,
        );

        self.realized += change;
        self.guard.record(change, Utc::now());
        self.position = PositionState::default();
        self.publish_position();

        telemetry::set_gauge(GaugeMetric::RealizedPnl, self.realized.to_f64().unwrap_or_default());
        telemetry::set_gauge(
            GaugeMetric::DailyPnl,
            self.guard.daily_pnl().to_f64().unwrap_or_default(),
        );
        tracing::info!(
            %action,
            %entry,
            exit = %exit_price,
            pnl = %change,
            realized = %self.realized,
            "Position closed"
        );

        if let Err(e) = self
            .journal
            .record_exit(exit_price, self.realized, change)
            .await
        {
            tracing::error!(error = %e, "Failed to journal exit");
        }
    }

    fn publish_position(&self) {
        telemetry::set_gauge(GaugeMetric::Position, self.position.size as f64);
    }
}
