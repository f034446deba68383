//! Fixed-window momentum fade
//!
//! Watches the last `window` trade prices and fades any move larger than
//! the threshold. Only trades while flat; exits are left to the bracket.

use super::{Strategy, StrategySignal};
use crate::config::MicroScalperConfig;
use crate::execution::TradeAction;
use rust_decimal::Decimal;
use std::collections::VecDeque;

pub struct MicroScalper {
    window_size: usize,
    threshold: Decimal,
    prices: VecDeque<Decimal>,
}

impl MicroScalper {
    pub fn new(window_size: usize, threshold: Decimal) -> Self {
        Self {
            window_size,
            threshold,
            prices: VecDeque::with_capacity(window_size + 1),
        }
    }

    pub fn from_config(config: &MicroScalperConfig) -> Self {
        Self::new(config.window_size, config.threshold)
    }

    /// Move across the current window, last minus first
    pub fn delta(&self) -> Option<Decimal> {
        Some(*self.prices.back()? - *self.prices.front()?)
    }
}

impl Strategy for MicroScalper {
    fn name(&self) -> &'static str {
        "micro_scalper"
    }

    fn on_price(&mut self, price: Decimal, position: i64) -> Option<StrategySignal> {
        self.prices.push_back(price);

        // Evaluated only on the updates that evict
        if self.prices.len() <= self.window_size {
            return None;
        }
        self.prices.pop_front();

        if position != 0 {
            return None;
        }

        let delta = self.delta()?;
        if delta > self.threshold {
            Some(StrategySignal::Enter(TradeAction::Sell))
        } else if delta < -self.threshold {
            Some(StrategySignal::Enter(TradeAction::Buy))
        } else {
            None
        }
    }
}
