//! Prior-day volume profile breakout
//!
//! Trades breaks of the value area and of the point of control, with a
//! small buffer around the POC.

use super::{Strategy, StrategySignal};
use crate::config::VolumeProfileConfig;
use crate::execution::TradeAction;
use rust_decimal::Decimal;

/// Prior-day profile levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileLevels {
    /// Point of control
    pub poc: Decimal,
    /// Value area high
    pub vah: Decimal,
    /// Value area low
    pub val: Decimal,
}

pub struct VolumeProfileBreakout {
    levels: ProfileLevels,
    buffer: Decimal,
}

impl VolumeProfileBreakout {
    pub fn new(levels: ProfileLevels, buffer: Decimal) -> Self {
        Self { levels, buffer }
    }

    pub fn from_config(config: &VolumeProfileConfig) -> Self {
        Self::new(
            ProfileLevels {
                poc: config.poc,
                vah: config.vah,
                val: config.val,
            },
            config.retest_buffer,
        )
    }

    pub fn levels(&self) -> ProfileLevels {
        self.levels
    }
}

impl Strategy for VolumeProfileBreakout {
    fn name(&self) -> &'static str {
        "volume_profile"
    }

    fn on_price(&mut self, price: Decimal, position: i64) -> Option<StrategySignal> {
        let ProfileLevels { poc, vah, val } = self.levels;
        let buffer = self.buffer;

        match position.signum() {
            0 => {
                // Value area breaks take precedence over POC breaks
                if price > vah {
                    Some(StrategySignal::Enter(TradeAction::Buy))
                } else if price < val {
                    Some(StrategySignal::Enter(TradeAction::Sell))
                } else if price > poc + buffer {
                    Some(StrategySignal::Enter(TradeAction::Buy))
                } else if price < poc - buffer {
                    Some(StrategySignal::Enter(TradeAction::Sell))
                } else {
                    None
                }
            }
            1 if price < vah - buffer || price < poc - buffer => Some(StrategySignal::Exit),
            -1 if price > val + buffer || price > poc + buffer => Some(StrategySignal::Exit),
            _ => None,
        }
    }
}
