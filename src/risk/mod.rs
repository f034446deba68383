//! Risk management module
//!
//! Daily loss halt, trading hours, contract caps and PnL math

mod limits;
mod sizing;
mod types;

pub use limits::{DailyLossGuard, HaltReason, TradingHours};
pub use sizing::{cap_size, realized_pnl};
pub use types::RiskError;
