//! Daily loss limit and trading hours

use super::types::RiskError;
use crate::config::{RiskConfig, TradingHoursConfig};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reason for trading halt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Realized loss for the day reached the limit
    MaxDailyLossReached(Decimal),
    /// Outside the configured entry window
    OutsideTradingHours,
}

/// Tracks realized PnL per UTC trading day and halts new entries past the limit
#[derive(Debug, Clone)]
pub struct DailyLossGuard {
    /// Positive USD amount; zero disables the guard
    pub max_daily_loss: Decimal,
    day: NaiveDate,
    daily_pnl: Decimal,
}

impl DailyLossGuard {
    pub fn new(max_daily_loss: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            max_daily_loss: max_daily_loss.abs(),
            day: now.date_naive(),
            daily_pnl: Decimal::ZERO,
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.max_daily_loss, Utc::now())
    }

    /// Realized PnL of the current day
    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    /// Add a realized PnL change
    pub fn record(&mut self, pnl: Decimal, now: DateTime<Utc>) {
        self.roll(now);
        self.daily_pnl += pnl;
    }

    /// Check whether trading should be halted
    pub fn should_halt(&mut self, now: DateTime<Utc>) -> Option<HaltReason> {
        self.roll(now);
        if self.max_daily_loss > Decimal::ZERO && self.daily_pnl <= -self.max_daily_loss {
            return Some(HaltReason::MaxDailyLossReached(self.daily_pnl));
        }
        None
    }

    /// Error when a new entry is not allowed
    pub fn check(&mut self, now: DateTime<Utc>) -> Result<(), RiskError> {
        match self.should_halt(now) {
            Some(reason) => Err(RiskError::TradingHalted(reason)),
            None => Ok(()),
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            tracing::info!(
                previous = %self.day,
                pnl = %self.daily_pnl,
                "New trading day, resetting daily PnL"
            );
            self.day = today;
            self.daily_pnl = Decimal::ZERO;
        }
    }
}

/// UTC entry window, whole hours with both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub weekdays_only: bool,
}

impl TradingHours {
    pub fn from_config(config: &TradingHoursConfig) -> Self {
        Self {
            start_hour: config.start_hour,
            end_hour: config.end_hour,
            weekdays_only: config.weekdays_only,
        }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
        if self.weekdays_only && weekend {
            return false;
        }
        (self.start_hour..=self.end_hour).contains(&now.hour())
    }

    /// Error when `now` is outside the window
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), RiskError> {
        if self.is_open(now) {
            Ok(())
        } else {
            Err(RiskError::TradingHalted(HaltReason::OutsideTradingHours))
        }
    }
}
