//! Moving-average crossover
//!
//! Flat: fast above slow buys, fast below slow sells. An open position is
//! closed when the averages cross against it.

use super::{Strategy, StrategySignal};
use crate::config::MaCrossoverConfig;
use crate::execution::TradeAction;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Fixed-length rolling mean
#[derive(Debug, Clone)]
struct RollingMean {
    period: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
}

impl RollingMean {
    fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: Decimal::ZERO,
        }
    }

    fn push(&mut self, value: Decimal) {
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
    }

    fn mean(&self) -> Option<Decimal> {
        if self.values.len() < self.period || self.period == 0 {
            return None;
        }
        Some(self.sum / Decimal::from(self.period as u64))
    }
}

/// Fast/slow simple moving-average crossover
pub struct MaCrossover {
    fast: RollingMean,
    slow: RollingMean,
}

impl MaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast: RollingMean::new(fast_period),
            slow: RollingMean::new(slow_period),
        }
    }

    pub fn from_config(config: &MaCrossoverConfig) -> Self {
        Self::new(config.fast_period, config.slow_period)
    }

    /// Current (fast, slow) averages once both windows are full
    pub fn averages(&self) -> Option<(Decimal, Decimal)> {
        Some((self.fast.mean()?, self.slow.mean()?))
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn on_price(&mut self, price: Decimal, position: i64) -> Option<StrategySignal> {
        self.fast.push(price);
        self.slow.push(price);

        let (fast, slow) = self.averages()?;

        match position.signum() {
            0 if fast > slow => Some(StrategySignal::Enter(TradeAction::Buy)),
            0 if fast < slow => Some(StrategySignal::Enter(TradeAction::Sell)),
            1 if fast < slow => Some(StrategySignal::Exit),
            -1 if fast > slow => Some(StrategySignal::Exit),
            _ => None,
        }
    }
}
