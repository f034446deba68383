//! Tick-driven entry/exit strategies
//!
//! A strategy sees every trade price together with the bot's signed
//! position and answers with at most one signal.

mod ma_crossover;
mod micro_scalper;
mod volume_profile;

pub use ma_crossover::MaCrossover;
pub use micro_scalper::MicroScalper;
pub use volume_profile::{ProfileLevels, VolumeProfileBreakout};

use crate::execution::TradeAction;
use rust_decimal::Decimal;

/// Strategy decision for one price update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategySignal {
    /// Open a position in this direction
    Enter(TradeAction),
    /// Close the current position
    Exit,
}

/// Trait for tick-driven strategies
pub trait Strategy: Send {
    /// Short name used in logs and the journal
    fn name(&self) -> &'static str;

    /// Feed a trade price; `position` is positive long, negative short, zero flat
    fn on_price(&mut self, price: Decimal, position: i64) -> Option<StrategySignal>;
}
